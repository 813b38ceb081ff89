//! Session authentication and role-based access control
//!
//! Roles form a closed enumeration with an explicit permission table, so a
//! missing mapping is a compile error rather than a runtime surprise.
//! Authenticated state travels as an explicit [`SessionContext`] handed to
//! each handler — there is no ambient global session. A context is created
//! at login and invalidated at logout or TTL expiry.

use crate::config::AuthConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Access tier of a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access, including operational status
    Admin,
    /// Chat and own-conversation management only
    Standard,
}

/// Individual capabilities gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Send chat messages through the pipeline
    Chat,
    /// List, read, and delete own conversations
    ManageConversations,
    /// Read server operational status
    ViewStatus,
}

impl Role {
    /// Explicit role → permission lookup table.
    pub fn permissions(self) -> &'static [Permission] {
        match self {
            Role::Admin => &[
                Permission::Chat,
                Permission::ManageConversations,
                Permission::ViewStatus,
            ],
            Role::Standard => &[Permission::Chat, Permission::ManageConversations],
        }
    }

    /// Whether this role grants the given permission.
    pub fn allows(self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

/// A resolved user account
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub username: String,
    password: String,
    pub role: Role,
}

impl UserAccount {
    pub fn new(username: impl Into<String>, password: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            role,
        }
    }
}

/// Authenticated session state passed explicitly to handlers
#[derive(Debug, Clone, Serialize)]
pub struct SessionContext {
    pub token: String,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionContext {
    /// Whether the session has passed its expiry time.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Issues, validates, and revokes bearer-token sessions
pub struct SessionManager {
    users: Vec<UserAccount>,
    sessions: RwLock<HashMap<String, SessionContext>>,
    ttl: Duration,
}

impl SessionManager {
    /// Create a manager with the given accounts and session TTL.
    pub fn new(users: Vec<UserAccount>, ttl_secs: i64) -> Self {
        Self {
            users,
            sessions: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Build a manager from configuration, resolving passwords from the
    /// environment. Accounts without a resolvable password are skipped.
    pub fn from_config(config: &AuthConfig) -> Self {
        let users = config
            .users
            .iter()
            .filter_map(|user| match user.resolve_password() {
                Some(password) => Some(UserAccount {
                    username: user.username.clone(),
                    password,
                    role: user.role,
                }),
                None => {
                    tracing::warn!(
                        username = %user.username,
                        "skipping user with no resolvable password"
                    );
                    None
                }
            })
            .collect();

        Self::new(users, config.session_ttl_secs as i64)
    }

    /// Verify credentials and issue a new session.
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionContext> {
        let account = self
            .users
            .iter()
            .find(|u| u.username == username && u.password == password)
            .ok_or_else(|| Error::Auth("invalid username or password".to_string()))?;

        let now = Utc::now();
        let context = SessionContext {
            token: Uuid::new_v4().to_string(),
            username: account.username.clone(),
            role: account.role,
            created_at: now,
            expires_at: now + self.ttl,
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(context.token.clone(), context.clone());

        tracing::info!(username = %context.username, role = ?context.role, "session created");
        Ok(context)
    }

    /// Invalidate a session. Returns false when the token was unknown.
    pub async fn logout(&self, token: &str) -> bool {
        let removed = self.sessions.write().await.remove(token).is_some();
        if removed {
            tracing::info!("session invalidated");
        }
        removed
    }

    /// Look up a session by token, pruning it if expired.
    pub async fn authenticate(&self, token: &str) -> Option<SessionContext> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(token) {
            Some(context) if !context.is_expired() => Some(context.clone()),
            Some(_) => {
                sessions.remove(token);
                None
            }
            None => None,
        }
    }

    /// Number of live (non-expired) sessions.
    pub async fn active_sessions(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.values().filter(|s| !s.is_expired()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SessionManager {
        SessionManager::new(
            vec![
                UserAccount {
                    username: "alice".into(),
                    password: "secret".into(),
                    role: Role::Admin,
                },
                UserAccount {
                    username: "bob".into(),
                    password: "hunter2".into(),
                    role: Role::Standard,
                },
            ],
            3600,
        )
    }

    #[tokio::test]
    async fn test_login_and_authenticate() {
        let manager = manager();
        let session = manager.login("alice", "secret").await.unwrap();
        assert_eq!(session.role, Role::Admin);

        let resolved = manager.authenticate(&session.token).await.unwrap();
        assert_eq!(resolved.username, "alice");
    }

    #[tokio::test]
    async fn test_login_bad_password() {
        let manager = manager();
        let err = manager.login("alice", "wrong").await.unwrap_err();
        assert_eq!(err.code(), "AUTH_ERROR");
    }

    #[tokio::test]
    async fn test_login_unknown_user() {
        let manager = manager();
        assert!(manager.login("mallory", "x").await.is_err());
    }

    #[tokio::test]
    async fn test_logout_invalidates() {
        let manager = manager();
        let session = manager.login("bob", "hunter2").await.unwrap();
        assert!(manager.logout(&session.token).await);
        assert!(manager.authenticate(&session.token).await.is_none());
        assert!(!manager.logout(&session.token).await);
    }

    #[tokio::test]
    async fn test_expired_session_pruned() {
        let manager = SessionManager::new(
            vec![UserAccount {
                username: "alice".into(),
                password: "secret".into(),
                role: Role::Admin,
            }],
            0,
        );
        let session = manager.login("alice", "secret").await.unwrap();
        assert!(manager.authenticate(&session.token).await.is_none());
        assert_eq!(manager.active_sessions().await, 0);
    }

    #[test]
    fn test_permission_table() {
        assert!(Role::Admin.allows(Permission::ViewStatus));
        assert!(Role::Admin.allows(Permission::Chat));
        assert!(Role::Standard.allows(Permission::Chat));
        assert!(Role::Standard.allows(Permission::ManageConversations));
        assert!(!Role::Standard.allows(Permission::ViewStatus));
    }

    #[test]
    fn test_role_serde() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        let role: Role = serde_json::from_str("\"standard\"").unwrap();
        assert_eq!(role, Role::Standard);
    }
}
