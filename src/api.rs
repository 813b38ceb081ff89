//! HTTP API
//!
//! Thin boundary over the pipeline, store, and session manager:
//! validation and auth happen here, protection decisions happen in the
//! pipeline (its single owner), and persistence of each completed turn is
//! this module's responsibility.
//!
//! Endpoints:
//! - `GET  /health`
//! - `POST /api/v1/auth/login` / `POST /api/v1/auth/logout` / `GET /api/v1/auth/me`
//! - `GET  /api/v1/conversations` / `GET|DELETE /api/v1/conversations/:id`
//! - `POST /api/v1/chat`
//! - `GET  /api/v1/status` (admin only)

use crate::auth::{Permission, Role, SessionContext, SessionManager};
use crate::error::Error;
use crate::pipeline::{ProtectionMode, TurnPipeline};
use crate::provider::{ChatMessage, ChatRole};
use crate::store::{
    Conversation, ConversationStore, ConversationSummary, Message, MessageRole, TurnAudit,
};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Shared state for all API handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<TurnPipeline>,
    pub store: Arc<ConversationStore>,
    pub sessions: Arc<SessionManager>,
    /// Default protections when a request does not override them
    pub protection: ProtectionMode,
    pub provider_name: String,
    pub scanner_name: String,
}

/// Create the API router
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/auth/me", get(me))
        .route("/api/v1/conversations", get(list_conversations))
        .route(
            "/api/v1/conversations/:id",
            get(get_conversation).delete(delete_conversation),
        )
        .route("/api/v1/chat", post(chat))
        .route("/api/v1/status", get(status))
        .with_state(state)
}

// =============================================================================
// Error body + mapping
// =============================================================================

/// Structured error body returned on failures
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
            code: code.to_string(),
        }),
    )
        .into_response()
}

/// Map a pipeline/store error to an HTTP response.
///
/// Scanner and provider failures get generic user-facing text; the detail
/// goes to the log, not the client.
fn map_error(err: &Error) -> Response {
    match err {
        Error::Scanner(detail) => {
            tracing::error!("scanner failure: {}", detail);
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                err.code(),
                "Message processing is unavailable. Please try again later.",
            )
        }
        Error::Provider(detail) => {
            tracing::error!("provider failure: {}", detail);
            error_response(
                StatusCode::BAD_GATEWAY,
                err.code(),
                "The model provider failed to respond. Please try again.",
            )
        }
        Error::Validation(msg) => error_response(StatusCode::BAD_REQUEST, err.code(), msg),
        Error::Auth(msg) => error_response(StatusCode::UNAUTHORIZED, err.code(), msg),
        Error::Forbidden(msg) => error_response(StatusCode::FORBIDDEN, err.code(), msg),
        Error::NotFound(msg) => error_response(StatusCode::NOT_FOUND, err.code(), msg),
        other => {
            tracing::error!("internal error: {}", other);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "Internal server error",
            )
        }
    }
}

// =============================================================================
// Auth plumbing
// =============================================================================

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

async fn require_session(
    state: &AppState,
    headers: &HeaderMap,
) -> std::result::Result<SessionContext, Response> {
    let token = bearer_token(headers).ok_or_else(|| {
        error_response(
            StatusCode::UNAUTHORIZED,
            "AUTH_ERROR",
            "missing bearer token",
        )
    })?;

    state.sessions.authenticate(token).await.ok_or_else(|| {
        error_response(
            StatusCode::UNAUTHORIZED,
            "AUTH_ERROR",
            "invalid or expired session",
        )
    })
}

// =============================================================================
// Health + status
// =============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    version: String,
    provider: String,
    scanner: String,
    protection: ProtectionMode,
    conversation_count: usize,
    active_sessions: usize,
}

async fn status(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = match require_session(&state, &headers).await {
        Ok(session) => session,
        Err(resp) => return resp,
    };
    if !session.role.allows(Permission::ViewStatus) {
        return error_response(
            StatusCode::FORBIDDEN,
            "FORBIDDEN",
            "status requires the admin role",
        );
    }

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        provider: state.provider_name.clone(),
        scanner: state.scanner_name.clone(),
        protection: state.protection,
        conversation_count: state.store.count().await,
        active_sessions: state.sessions.active_sessions().await,
    })
    .into_response()
}

// =============================================================================
// Auth endpoints
// =============================================================================

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
    username: String,
    role: Role,
    expires_at: DateTime<Utc>,
}

async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Response {
    match state
        .sessions
        .login(&request.username, &request.password)
        .await
    {
        Ok(session) => Json(LoginResponse {
            token: session.token,
            username: session.username,
            role: session.role,
            expires_at: session.expires_at,
        })
        .into_response(),
        Err(err) => map_error(&err),
    }
}

#[derive(Debug, Serialize)]
struct OkResponse {
    ok: bool,
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = match require_session(&state, &headers).await {
        Ok(session) => session,
        Err(resp) => return resp,
    };
    state.sessions.logout(&session.token).await;
    Json(OkResponse { ok: true }).into_response()
}

#[derive(Debug, Serialize)]
struct MeResponse {
    username: String,
    role: Role,
    expires_at: DateTime<Utc>,
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = match require_session(&state, &headers).await {
        Ok(session) => session,
        Err(resp) => return resp,
    };
    Json(MeResponse {
        username: session.username,
        role: session.role,
        expires_at: session.expires_at,
    })
    .into_response()
}

// =============================================================================
// Conversation endpoints
// =============================================================================

async fn list_conversations(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = match require_session(&state, &headers).await {
        Ok(session) => session,
        Err(resp) => return resp,
    };
    let summaries = state.store.list(&session.username).await;
    Json(summaries).into_response()
}

async fn get_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    let session = match require_session(&state, &headers).await {
        Ok(session) => session,
        Err(resp) => return resp,
    };
    match state.store.get(&session.username, id).await {
        Some(conversation) => Json(conversation).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "NOT_FOUND", "conversation not found"),
    }
}

async fn delete_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    let session = match require_session(&state, &headers).await {
        Ok(session) => session,
        Err(resp) => return resp,
    };
    match state.store.soft_delete(&session.username, id).await {
        Ok(()) => Json(OkResponse { ok: true }).into_response(),
        Err(err) => map_error(&err),
    }
}

// =============================================================================
// Chat endpoint
// =============================================================================

#[derive(Debug, Deserialize)]
struct ChatRequest {
    /// Existing conversation to continue; a new one is created when absent
    conversation_id: Option<Uuid>,
    content: String,
    /// Per-request protection override
    mode: Option<ProtectionMode>,
}

/// Success envelope for a chat turn
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: Message,
    pub conversation: ConversationSummary,
}

async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Response {
    let session = match require_session(&state, &headers).await {
        Ok(session) => session,
        Err(resp) => return resp,
    };

    if request.content.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "message content must not be empty",
        );
    }

    // Resolve the conversation. Creation of a new one is deferred until
    // the turn succeeds so a failed turn leaves nothing behind.
    let existing = match request.conversation_id {
        Some(id) => match state.store.get(&session.username, id).await {
            Some(conversation) => Some(conversation),
            None => {
                return error_response(
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    "conversation not found",
                )
            }
        },
        None => None,
    };

    let history = existing.as_ref().map(provider_history).unwrap_or_default();
    let mode = request.mode.unwrap_or(state.protection);

    tracing::info!(
        user = %session.username,
        input_scan = mode.input_scan,
        output_scan = mode.output_scan,
        "processing chat turn"
    );

    // Run the pipeline. On failure nothing is persisted for this turn.
    let result = match state
        .pipeline
        .process_turn(&history, &request.content, mode)
        .await
    {
        Ok(result) => result,
        Err(err) => return map_error(&err),
    };

    let conversation = match existing {
        Some(conversation) => conversation,
        None => match state.store.create(&session.username).await {
            Ok(conversation) => conversation,
            Err(err) => return map_error(&err),
        },
    };

    let input_blocked = result.output_decision.is_none() && result.blocked;
    let processed_input = result
        .processed_input
        .clone()
        .unwrap_or_else(|| request.content.clone());

    let user_message = Message::user(
        conversation.id,
        request.content.clone(),
        processed_input,
        result.input_findings.clone(),
        result.input_decision,
        input_blocked,
    );
    let assistant_message = Message::assistant(
        conversation.id,
        result.final_text.clone(),
        result.output_findings.clone(),
        result.blocked,
        TurnAudit {
            input_decision: result.input_decision,
            output_decision: result.output_decision,
        },
    );
    let assistant_for_response = assistant_message.clone();

    let updated = match state
        .store
        .append_turn(
            &session.username,
            conversation.id,
            user_message,
            assistant_message,
        )
        .await
    {
        Ok(updated) => updated,
        Err(err) => return map_error(&err),
    };

    Json(ChatResponse {
        message: assistant_for_response,
        conversation: updated.summary(),
    })
    .into_response()
}

/// Convert persisted messages to provider form, using the sanitized text.
fn provider_history(conversation: &Conversation) -> Vec<ChatMessage> {
    conversation
        .messages
        .iter()
        .map(|message| ChatMessage {
            role: match message.role {
                MessageRole::User => ChatRole::User,
                MessageRole::Assistant => ChatRole::Assistant,
                MessageRole::System => ChatRole::System,
            },
            content: message.processed_text.clone(),
        })
        .collect()
}
