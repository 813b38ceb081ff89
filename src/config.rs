//! ShieldChat configuration management

use crate::auth::Role;
use crate::guardrail::GuardrailPolicy;
use crate::pipeline::ProtectionMode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Main ShieldChat configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShieldChatConfig {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Sensitivity scanner configuration
    pub scanner: ScannerConfig,

    /// Guardrail policy thresholds
    #[serde(default)]
    pub guardrail: GuardrailPolicy,

    /// Default protections applied to each turn
    #[serde(default)]
    pub protection: ProtectionMode,

    /// Model provider configuration
    pub models: ModelsConfig,

    /// Conversation storage configuration
    pub storage: StorageConfig,

    /// Authentication configuration
    pub auth: AuthConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed origins for CORS ("*" allows any origin)
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Which scanner backend performs sensitive-data detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScannerBackend {
    /// Local rule-based detection (no external service required)
    #[default]
    Rules,

    /// Remote data-discovery + semantic-guardrail REST services
    Remote,
}

/// Sensitivity scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Backend selection
    pub backend: ScannerBackend,

    /// Data-discovery classification endpoint
    pub classify_url: String,

    /// Semantic-guardrail scan endpoint
    pub guardrail_url: String,

    /// Minimum confidence for a detection to be reported
    pub score_threshold: f64,

    /// Request timeout for scanner calls in seconds
    pub timeout_secs: u64,

    /// Detection rules for the local rule-based backend
    pub rules: Vec<DetectionRule>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            backend: ScannerBackend::Rules,
            classify_url: "http://localhost:8580/pty/data-discovery/v1.1/classify".to_string(),
            guardrail_url:
                "http://localhost:8581/pty/semantic-guardrail/v1.1/conversations/messages/scan"
                    .to_string(),
            score_threshold: 0.6,
            timeout_secs: 10,
            rules: default_detection_rules(),
        }
    }
}

/// A single detection rule for the rule-based scanner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRule {
    /// Rule name
    pub name: String,

    /// Regex pattern
    pub pattern: String,

    /// Entity category reported on findings (e.g. "SSN", "EMAIL")
    pub category: String,

    /// Confidence assigned to matches of this rule
    pub confidence: f64,
}

/// Built-in detection rules covering the common sensitive-data entities
pub fn default_detection_rules() -> Vec<DetectionRule> {
    vec![
        DetectionRule {
            name: "ssn".to_string(),
            pattern: r"\b\d{3}-\d{2}-\d{4}\b".to_string(),
            category: "SSN".to_string(),
            confidence: 0.95,
        },
        DetectionRule {
            name: "credit_card".to_string(),
            pattern: r"\b\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}\b".to_string(),
            category: "CREDIT_CARD".to_string(),
            confidence: 0.90,
        },
        DetectionRule {
            name: "email".to_string(),
            pattern: r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b".to_string(),
            category: "EMAIL".to_string(),
            confidence: 0.95,
        },
        DetectionRule {
            name: "phone".to_string(),
            pattern: r"\b(?:\+?1[-. ]?)?\(?\d{3}\)?[-. ]\d{3}[-. ]\d{4}\b".to_string(),
            category: "PHONE".to_string(),
            confidence: 0.70,
        },
        DetectionRule {
            name: "api_key".to_string(),
            pattern: r"\b(?:sk|pk|api)[-_][A-Za-z0-9]{16,}\b".to_string(),
            category: "API_KEY".to_string(),
            confidence: 0.85,
        },
        DetectionRule {
            name: "ip_address".to_string(),
            pattern: r"\b(?:\d{1,3}\.){3}\d{1,3}\b".to_string(),
            category: "IP_ADDRESS".to_string(),
            confidence: 0.80,
        },
    ]
}

/// Model provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Default model provider ("echo" needs no credentials)
    pub default_provider: String,

    /// Provider configurations by name
    pub providers: HashMap<String, ModelProviderConfig>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert(
            "openai".to_string(),
            ModelProviderConfig {
                api_key_ref: "openai_api_key".to_string(),
                base_url: None,
                default_model: "gpt-4o-mini".to_string(),
                request_timeout_secs: 60,
            },
        );
        providers.insert(
            "echo".to_string(),
            ModelProviderConfig {
                api_key_ref: String::new(),
                base_url: None,
                default_model: "echo-1".to_string(),
                request_timeout_secs: 60,
            },
        );

        Self {
            default_provider: "echo".to_string(),
            providers,
        }
    }
}

/// Configuration for a single model provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelProviderConfig {
    /// Environment variable holding the API key (empty = no key required)
    pub api_key_ref: String,

    /// Custom base URL (OpenAI-compatible endpoints)
    pub base_url: Option<String>,

    /// Model identifier sent with each request
    pub default_model: String,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

/// Conversation storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory for conversation persistence
    pub base_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: default_data_dir(),
        }
    }
}

/// Default data directory (~/.shieldchat)
pub fn default_data_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".shieldchat")
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Session lifetime in seconds
    pub session_ttl_secs: u64,

    /// Known user accounts
    pub users: Vec<UserConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 86_400,
            users: vec![
                UserConfig {
                    username: "admin".to_string(),
                    password: Some("admin".to_string()),
                    password_env: Some("SHIELDCHAT_ADMIN_PASSWORD".to_string()),
                    role: Role::Admin,
                },
                UserConfig {
                    username: "demo".to_string(),
                    password: Some("demo".to_string()),
                    password_env: None,
                    role: Role::Standard,
                },
            ],
        }
    }
}

/// A single user account entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    /// Login name
    pub username: String,

    /// Inline password (development only)
    pub password: Option<String>,

    /// Environment variable to read the password from (takes precedence)
    pub password_env: Option<String>,

    /// Access role
    pub role: Role,
}

impl UserConfig {
    /// Resolve the effective password: env var first, inline fallback.
    pub fn resolve_password(&self) -> Option<String> {
        if let Some(var) = &self.password_env {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }
        self.password.clone()
    }
}

/// Resolve API keys from environment variables.
///
/// For each provider, the `api_key_ref` field names an environment variable
/// (e.g. `"openai_api_key"` → reads `$OPENAI_API_KEY`).  We try both the
/// original casing and the UPPER_CASE form.
pub fn resolve_api_keys_from_env(models: &ModelsConfig) -> HashMap<String, String> {
    let mut keys = HashMap::new();
    for (provider_name, cfg) in &models.providers {
        if cfg.api_key_ref.is_empty() {
            continue;
        }
        let val = std::env::var(&cfg.api_key_ref)
            .or_else(|_| std::env::var(cfg.api_key_ref.to_uppercase()));
        if let Ok(key) = val {
            keys.insert(provider_name.clone(), key);
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_roundtrip() {
        let config = ShieldChatConfig::default();
        let toml = toml::to_string(&config).unwrap();
        let parsed: ShieldChatConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.server.port, 8787);
        assert_eq!(parsed.scanner.backend, ScannerBackend::Rules);
        assert_eq!(parsed.models.default_provider, "echo");
    }

    #[test]
    fn test_default_rules_compile() {
        for rule in default_detection_rules() {
            assert!(
                regex::Regex::new(&rule.pattern).is_ok(),
                "rule '{}' must compile",
                rule.name
            );
        }
    }

    #[test]
    fn test_resolve_password_prefers_env() {
        std::env::set_var("SHIELDCHAT_TEST_PW", "from-env");
        let user = UserConfig {
            username: "u".into(),
            password: Some("inline".into()),
            password_env: Some("SHIELDCHAT_TEST_PW".into()),
            role: Role::Standard,
        };
        assert_eq!(user.resolve_password().as_deref(), Some("from-env"));
        std::env::remove_var("SHIELDCHAT_TEST_PW");
    }

    #[test]
    fn test_resolve_api_keys_skips_missing() {
        let models = ModelsConfig::default();
        std::env::remove_var("OPENAI_API_KEY");
        std::env::remove_var("openai_api_key");
        let keys = resolve_api_keys_from_env(&models);
        assert!(!keys.contains_key("echo"));
    }
}
