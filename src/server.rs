//! Server wiring and lifecycle
//!
//! Builds the scanner, guardrail policy, provider, store, and session
//! manager from configuration, composes them into the HTTP router, and
//! manages the listen task's start/stop state machine.

use crate::api::{api_router, AppState};
use crate::auth::SessionManager;
use crate::config::{resolve_api_keys_from_env, ScannerBackend, ShieldChatConfig};
use crate::error::{Error, Result};
use crate::pipeline::TurnPipeline;
use crate::provider::provider_from_config;
use crate::scanner::{RemoteScanner, RuleScanner, SensitivityScanner};
use crate::store::ConversationStore;
use axum::http::HeaderValue;
use axum::Router;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Server lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Not started
    Stopped,
    /// Starting up
    Starting,
    /// Accepting requests
    Running,
    /// Shutting down
    ShuttingDown,
}

/// ShieldChat HTTP server
pub struct ChatServer {
    config: ShieldChatConfig,
    state: Arc<RwLock<ServerState>>,
    app_state: AppState,
    serve_handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

impl ChatServer {
    /// Wire all components from configuration.
    pub async fn new(config: ShieldChatConfig) -> Result<Self> {
        let scanner: Arc<dyn SensitivityScanner> = match config.scanner.backend {
            ScannerBackend::Rules => Arc::new(RuleScanner::new(
                &config.scanner.rules,
                config.scanner.score_threshold,
            )?),
            ScannerBackend::Remote => Arc::new(RemoteScanner::new(&config.scanner)?),
        };

        let resolved_keys = resolve_api_keys_from_env(&config.models);
        let provider = provider_from_config(
            &config.models,
            &resolved_keys,
            &config.models.default_provider,
        )?;

        let store = Arc::new(ConversationStore::new(&config.storage.base_dir).await?);
        let sessions = Arc::new(SessionManager::from_config(&config.auth));

        let scanner_name = scanner.name().to_string();
        let provider_name = provider.name().to_string();
        let pipeline = Arc::new(TurnPipeline::new(
            scanner,
            config.guardrail.clone(),
            provider,
        ));

        let app_state = AppState {
            pipeline,
            store,
            sessions,
            protection: config.protection,
            provider_name,
            scanner_name,
        };

        Ok(Self {
            config,
            state: Arc::new(RwLock::new(ServerState::Stopped)),
            app_state,
            serve_handle: Arc::new(RwLock::new(None)),
        })
    }

    /// Current lifecycle state
    pub async fn state(&self) -> ServerState {
        *self.state.read().await
    }

    /// Configuration in use
    pub fn config(&self) -> &ShieldChatConfig {
        &self.config
    }

    /// Shared handler state (useful in tests)
    pub fn app_state(&self) -> &AppState {
        &self.app_state
    }

    /// Build the full router with CORS and request tracing.
    pub fn router(&self) -> Router {
        api_router(self.app_state.clone())
            .layer(cors_layer(&self.config.server.allowed_origins))
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the listener and start serving in a background task.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != ServerState::Stopped {
            return Err(Error::Internal("server already running".to_string()));
        }
        *state = ServerState::Starting;
        drop(state);

        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        let router = self.router();

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("server task failed: {}", e);
            }
        });
        *self.serve_handle.write().await = Some(handle);

        *self.state.write().await = ServerState::Running;
        tracing::info!(
            addr = %local_addr,
            provider = %self.app_state.provider_name,
            scanner = %self.app_state.scanner_name,
            "shieldchat listening"
        );

        Ok(())
    }

    /// Stop serving. In-flight requests are dropped with the listen task;
    /// pending external calls run to their own client timeouts.
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != ServerState::Running {
            return Ok(());
        }
        *state = ServerState::ShuttingDown;
        drop(state);

        if let Some(handle) = self.serve_handle.write().await.take() {
            handle.abort();
        }

        *self.state.write().await = ServerState::Stopped;
        tracing::info!("shieldchat stopped");
        Ok(())
    }
}

/// CORS layer from the configured origin list ("*" allows any origin).
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Builder for [`ChatServer`]
pub struct ChatServerBuilder {
    config: ShieldChatConfig,
}

impl ChatServerBuilder {
    /// Create a builder with default config
    pub fn new() -> Self {
        Self {
            config: ShieldChatConfig::default(),
        }
    }

    /// Set the full configuration
    pub fn config(mut self, config: ShieldChatConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the bind host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    /// Set the bind port
    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    /// Set the storage base directory
    pub fn storage_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.config.storage.base_dir = dir.into();
        self
    }

    /// Build the server
    pub async fn build(self) -> Result<ChatServer> {
        ChatServer::new(self.config).await
    }
}

impl Default for ChatServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_server() -> (ChatServer, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let server = ChatServerBuilder::new()
            .host("127.0.0.1")
            .port(0)
            .storage_dir(dir.path())
            .build()
            .await
            .unwrap();
        (server, dir)
    }

    #[tokio::test]
    async fn test_server_creation() {
        let (server, _dir) = test_server().await;
        assert_eq!(server.state().await, ServerState::Stopped);
        assert_eq!(server.app_state().provider_name, "echo");
        assert_eq!(server.app_state().scanner_name, "rules");
    }

    #[tokio::test]
    async fn test_server_lifecycle() {
        let (server, _dir) = test_server().await;

        server.start().await.unwrap();
        assert_eq!(server.state().await, ServerState::Running);

        // Starting twice is an error
        assert!(server.start().await.is_err());

        server.stop().await.unwrap();
        assert_eq!(server.state().await, ServerState::Stopped);

        // Stopping an already stopped server is a no-op
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_cors_layer_with_explicit_origins() {
        // Just exercise both branches of the builder
        let _ = cors_layer(&["http://localhost:3000".to_string()]);
        let _ = cors_layer(&["*".to_string()]);
        let _ = cors_layer(&["not a header value\n".to_string()]);
    }
}
