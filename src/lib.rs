//! ShieldChat - Privacy-protected LLM chat service
//!
//! ShieldChat is a chat backend that wraps every model turn in a
//! data-protection pipeline: user input is scanned for sensitive data and
//! policy risk before it reaches the model, and the model's reply is
//! scanned again before it reaches the user or the store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP API (axum)                         │
//! │   auth · conversations CRUD · chat · status                     │
//! └───────────────────────────────┬─────────────────────────────────┘
//!                                 │
//! ┌───────────────────────────────▼─────────────────────────────────┐
//! │                        Turn Pipeline                            │
//! │                                                                 │
//! │  input scan ──► guardrail ──► provider ──► output scan ──► gate │
//! │  (findings)    (allow/block/  (one call,   (findings)   (safe   │
//! │                 sanitize)      no retry)                 text)  │
//! └──────┬──────────────┬───────────────┬───────────────────────────┘
//!        │              │               │
//! ┌──────▼──────┐ ┌─────▼──────┐ ┌──────▼────────┐
//! │  Scanner    │ │ Guardrail  │ │ Model         │
//! │  rules /    │ │ policy     │ │ provider      │
//! │  remote     │ │ thresholds │ │ openai / echo │
//! └─────────────┘ └────────────┘ └───────────────┘
//!
//! Persistence: the API appends each completed turn (user + assistant
//! message pair with findings and decisions) to the conversation store.
//! ```
//!
//! ## Modules
//!
//! - [`api`]: HTTP API and turn persistence
//! - [`auth`]: bearer-token sessions and role permissions
//! - [`config`]: configuration management
//! - [`guardrail`]: allow/block/sanitize policy engine
//! - [`pipeline`]: the protected message-processing pipeline
//! - [`provider`]: model provider backends
//! - [`scanner`]: sensitive-data scanner backends
//! - [`server`]: component wiring and lifecycle
//! - [`store`]: conversation persistence

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod guardrail;
pub mod pipeline;
pub mod provider;
pub mod scanner;
pub mod server;
pub mod store;

pub use config::ShieldChatConfig;
pub use error::{Error, Result};
