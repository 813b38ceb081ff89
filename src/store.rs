//! Conversation store with file-based JSON persistence
//!
//! Directory layout:
//! ```text
//! ~/.shieldchat/
//! └── conversations/
//!     ├── conv-<uuid>.json
//!     └── ...
//! ```
//!
//! Messages are append-only: once a turn is persisted it is never mutated.
//! Deletion is soft — a `deleted_at` timestamp hides the conversation from
//! listings while retaining the audit trail.

use crate::error::{Error, Result};
use crate::guardrail::GuardrailDecision;
use crate::scanner::Finding;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

const DEFAULT_TITLE: &str = "New chat";
const TITLE_MAX_CHARS: usize = 60;

/// Message role within a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// Guardrail decisions recorded for a complete turn.
///
/// Attached to the assistant message so every persisted assistant reply
/// carries the decision made on its triggering input as well as on its own
/// output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnAudit {
    /// Decision applied to the user input that triggered this reply
    pub input_decision: GuardrailDecision,
    /// Decision applied to the reply itself (None when the provider was
    /// never called)
    pub output_decision: Option<GuardrailDecision>,
}

/// A single persisted message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,

    /// Text as received. For an assistant message whose reply was blocked
    /// this holds the refusal — the raw reply is discarded upstream and
    /// never reaches the store.
    pub raw_text: String,

    /// Text after sanitization (equals `raw_text` when nothing was redacted)
    pub processed_text: String,

    /// Findings from scanning this message's text
    pub findings: Vec<Finding>,

    /// Decision applied to this message's text
    pub decision: Option<GuardrailDecision>,

    /// Whether this message's side of the turn was blocked
    pub blocked: bool,

    /// Turn-level audit trail (assistant messages only)
    pub audit: Option<TurnAudit>,

    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Build a user message for a turn.
    pub fn user(
        conversation_id: Uuid,
        raw_text: impl Into<String>,
        processed_text: impl Into<String>,
        findings: Vec<Finding>,
        decision: GuardrailDecision,
        blocked: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            role: MessageRole::User,
            raw_text: raw_text.into(),
            processed_text: processed_text.into(),
            findings,
            decision: Some(decision),
            blocked,
            audit: None,
            created_at: Utc::now(),
        }
    }

    /// Build an assistant message for a turn.
    pub fn assistant(
        conversation_id: Uuid,
        text: impl Into<String>,
        findings: Vec<Finding>,
        blocked: bool,
        audit: TurnAudit,
    ) -> Self {
        let text = text.into();
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            role: MessageRole::Assistant,
            raw_text: text.clone(),
            processed_text: text,
            findings,
            decision: audit.output_decision,
            blocked,
            audit: Some(audit),
            created_at: Utc::now(),
        }
    }
}

/// A conversation thread owned by one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub owner: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Conversation {
    fn new(owner: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Listing form without the message bodies.
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id,
            title: self.title.clone(),
            message_count: self.messages.len(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Conversation metadata for list endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub title: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// In-memory conversation store backed by JSON files
pub struct ConversationStore {
    conversations_dir: PathBuf,
    conversations: Arc<RwLock<Vec<Conversation>>>,
}

impl ConversationStore {
    /// Create a store at the given base directory, loading existing
    /// conversations from disk.
    pub async fn new(base_dir: &Path) -> Result<Self> {
        let conversations_dir = base_dir.join("conversations");
        tokio::fs::create_dir_all(&conversations_dir).await?;

        let store = Self {
            conversations_dir,
            conversations: Arc::new(RwLock::new(Vec::new())),
        };
        store.load_from_disk().await;
        Ok(store)
    }

    async fn load_from_disk(&self) {
        let mut loaded = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.conversations_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("failed to read conversations dir: {}", e);
                return;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => match serde_json::from_str::<Conversation>(&content) {
                    Ok(conv) => loaded.push(conv),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), "skipping malformed conversation file: {}", e);
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), "failed to read conversation file: {}", e);
                }
            }
        }

        loaded.sort_by_key(|c| c.created_at);
        tracing::info!(count = loaded.len(), "loaded conversations from disk");
        *self.conversations.write().await = loaded;
    }

    /// Create a new conversation for the given owner.
    pub async fn create(&self, owner: &str) -> Result<Conversation> {
        let conversation = Conversation::new(owner);
        {
            let mut conversations = self.conversations.write().await;
            conversations.push(conversation.clone());
        }
        self.persist(&conversation).await?;
        Ok(conversation)
    }

    /// List the owner's active conversations, newest-updated first.
    pub async fn list(&self, owner: &str) -> Vec<ConversationSummary> {
        let conversations = self.conversations.read().await;
        let mut summaries: Vec<ConversationSummary> = conversations
            .iter()
            .filter(|c| c.owner == owner && c.deleted_at.is_none())
            .map(|c| c.summary())
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    /// Fetch one of the owner's active conversations.
    pub async fn get(&self, owner: &str, id: Uuid) -> Option<Conversation> {
        let conversations = self.conversations.read().await;
        conversations
            .iter()
            .find(|c| c.id == id && c.owner == owner && c.deleted_at.is_none())
            .cloned()
    }

    /// Append one turn (user + assistant message pair) to a conversation.
    ///
    /// Sets the conversation title from the first user message's sanitized
    /// text so raw sensitive values never end up in titles.
    pub async fn append_turn(
        &self,
        owner: &str,
        id: Uuid,
        user_message: Message,
        assistant_message: Message,
    ) -> Result<Conversation> {
        let updated = {
            let mut conversations = self.conversations.write().await;
            let conversation = conversations
                .iter_mut()
                .find(|c| c.id == id && c.owner == owner && c.deleted_at.is_none())
                .ok_or_else(|| Error::NotFound(format!("conversation {}", id)))?;

            if conversation.title == DEFAULT_TITLE {
                conversation.title = derive_title(&user_message.processed_text);
            }
            conversation.messages.push(user_message);
            conversation.messages.push(assistant_message);
            conversation.updated_at = Utc::now();
            conversation.clone()
        };

        self.persist(&updated).await?;
        Ok(updated)
    }

    /// Soft-delete one of the owner's conversations.
    pub async fn soft_delete(&self, owner: &str, id: Uuid) -> Result<()> {
        let updated = {
            let mut conversations = self.conversations.write().await;
            let conversation = conversations
                .iter_mut()
                .find(|c| c.id == id && c.owner == owner && c.deleted_at.is_none())
                .ok_or_else(|| Error::NotFound(format!("conversation {}", id)))?;
            conversation.deleted_at = Some(Utc::now());
            conversation.clone()
        };

        self.persist(&updated).await?;
        Ok(())
    }

    /// Number of active conversations across all owners.
    pub async fn count(&self) -> usize {
        let conversations = self.conversations.read().await;
        conversations.iter().filter(|c| c.deleted_at.is_none()).count()
    }

    async fn persist(&self, conversation: &Conversation) -> Result<()> {
        let path = self
            .conversations_dir
            .join(format!("conv-{}.json", conversation.id));
        let json = serde_json::to_vec_pretty(conversation)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| Error::Store(format!("failed to persist conversation: {}", e)))
    }
}

/// Derive a conversation title from the first message's sanitized text.
fn derive_title(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return DEFAULT_TITLE.to_string();
    }
    let title: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
    if trimmed.chars().count() > TITLE_MAX_CHARS {
        format!("{}…", title)
    } else {
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_turn(conversation_id: Uuid, text: &str) -> (Message, Message) {
        let user = Message::user(
            conversation_id,
            text,
            text,
            Vec::new(),
            GuardrailDecision::Allow,
            false,
        );
        let assistant = Message::assistant(
            conversation_id,
            "reply",
            Vec::new(),
            false,
            TurnAudit {
                input_decision: GuardrailDecision::Allow,
                output_decision: Some(GuardrailDecision::Allow),
            },
        );
        (user, assistant)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path()).await.unwrap();

        let conv = store.create("alice").await.unwrap();
        let fetched = store.get("alice", conv.id).await.unwrap();
        assert_eq!(fetched.id, conv.id);
        assert_eq!(fetched.title, DEFAULT_TITLE);
    }

    #[tokio::test]
    async fn test_owner_scoping() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path()).await.unwrap();

        let conv = store.create("alice").await.unwrap();
        assert!(store.get("bob", conv.id).await.is_none());
        assert!(store.list("bob").await.is_empty());
    }

    #[tokio::test]
    async fn test_append_turn_sets_title() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path()).await.unwrap();

        let conv = store.create("alice").await.unwrap();
        let (user, assistant) = sample_turn(conv.id, "What is the refund policy?");
        let updated = store
            .append_turn("alice", conv.id, user, assistant)
            .await
            .unwrap();

        assert_eq!(updated.title, "What is the refund policy?");
        assert_eq!(updated.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_title_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path()).await.unwrap();

        let conv = store.create("alice").await.unwrap();
        let long = "a".repeat(100);
        let (user, assistant) = sample_turn(conv.id, &long);
        let updated = store
            .append_turn("alice", conv.id, user, assistant)
            .await
            .unwrap();

        assert!(updated.title.chars().count() <= TITLE_MAX_CHARS + 1);
        assert!(updated.title.ends_with('…'));
    }

    #[tokio::test]
    async fn test_list_orders_by_updated_at() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path()).await.unwrap();

        let first = store.create("alice").await.unwrap();
        let second = store.create("alice").await.unwrap();

        // Appending to the first conversation makes it most recent
        let (user, assistant) = sample_turn(first.id, "bump");
        store
            .append_turn("alice", first.id, user, assistant)
            .await
            .unwrap();

        let summaries = store.list("alice").await;
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].id, first.id);
        assert_eq!(summaries[1].id, second.id);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_conversation() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path()).await.unwrap();

        let conv = store.create("alice").await.unwrap();
        store.soft_delete("alice", conv.id).await.unwrap();

        assert!(store.get("alice", conv.id).await.is_none());
        assert!(store.list("alice").await.is_empty());
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path()).await.unwrap();

        let err = store.soft_delete("alice", Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_reload_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = ConversationStore::new(dir.path()).await.unwrap();
            let conv = store.create("alice").await.unwrap();
            let (user, assistant) = sample_turn(conv.id, "persisted?");
            store
                .append_turn("alice", conv.id, user, assistant)
                .await
                .unwrap();
            conv.id
        };

        let reloaded = ConversationStore::new(dir.path()).await.unwrap();
        let conv = reloaded.get("alice", id).await.unwrap();
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.title, "persisted?");
    }

    #[test]
    fn test_derive_title_empty_falls_back() {
        assert_eq!(derive_title("   "), DEFAULT_TITLE);
    }
}
