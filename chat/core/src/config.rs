//! TOML Configuration File Support
//!
//! Client configuration lives in `~/.config/medchat/client.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! - `$XDG_CONFIG_HOME/medchat/client.toml` (typically `~/.config/medchat/client.toml`)
//!
//! # Example Configuration
//!
//! ```toml
//! [endpoint]
//! base_url = "http://localhost:3000"
//! chat_path = "/api/chat"
//! end_path = "/api/chat/end"
//! connect_timeout_ms = 10000
//! end_timeout_ms = 15000
//!
//! [conversation]
//! greeting = "Hi, how can I help you today?"
//! reset_greeting = "Hello. How are you feeling today?"
//! error_message = "I'm sorry, but I encountered an error. Please try again later."
//! sentinel = "###CONVERSATION_ID###"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversation::ConversationSettings;
use crate::stream::CONVERSATION_ID_SENTINEL;

/// Environment variable overriding the server base URL
pub const ENV_BASE_URL: &str = "MEDCHAT_BASE_URL";
/// Environment variable overriding the connect timeout (milliseconds)
pub const ENV_CONNECT_TIMEOUT_MS: &str = "MEDCHAT_CONNECT_TIMEOUT_MS";
/// Environment variable overriding the end-conversation timeout (milliseconds)
pub const ENV_END_TIMEOUT_MS: &str = "MEDCHAT_END_TIMEOUT_MS";
/// Environment variable overriding the conversation-id sentinel
pub const ENV_SENTINEL: &str = "MEDCHAT_SENTINEL";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Endpoint section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointToml {
    /// Server base URL
    pub base_url: Option<String>,

    /// Path of the streaming chat endpoint
    pub chat_path: Option<String>,

    /// Path of the end-conversation endpoint
    pub end_path: Option<String>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// Whole-request timeout for ending a conversation, in milliseconds
    pub end_timeout_ms: Option<u64>,
}

/// Conversation section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationToml {
    /// Greeting shown on startup
    pub greeting: Option<String>,

    /// Greeting shown after a conversation ends
    pub reset_greeting: Option<String>,

    /// Message appended when a response fails
    pub error_message: Option<String>,

    /// Marker separating reply text from the conversation id
    pub sentinel: Option<String>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientToml {
    /// Endpoint configuration section
    pub endpoint: EndpointToml,

    /// Conversation configuration section
    pub conversation: ConversationToml,
}

// =============================================================================
// Main Configuration Structs
// =============================================================================

/// Where the assistant server lives and how long to wait for it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Server base URL
    pub base_url: String,

    /// Path of the streaming chat endpoint
    pub chat_path: String,

    /// Path of the end-conversation endpoint
    pub end_path: String,

    /// Connection timeout for every request
    pub connect_timeout: Duration,

    /// Whole-request timeout for ending a conversation
    pub end_timeout: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            chat_path: "/api/chat".to_string(),
            end_path: "/api/chat/end".to_string(),
            connect_timeout: Duration::from_secs(10),
            end_timeout: Duration::from_secs(15),
        }
    }
}

impl EndpointConfig {
    /// Endpoint config pointing at `base_url` with default paths
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Full URL of the streaming chat endpoint
    #[must_use]
    pub fn chat_url(&self) -> String {
        join_url(&self.base_url, &self.chat_path)
    }

    /// Full URL of the end-conversation endpoint
    #[must_use]
    pub fn end_url(&self) -> String {
        join_url(&self.base_url, &self.end_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Centralized configuration for the chat client
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Endpoint configuration
    pub endpoint: EndpointConfig,

    /// Fixed conversation texts
    pub conversation: ConversationSettings,

    /// Marker separating reply text from the conversation id
    pub sentinel: String,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            conversation: ConversationSettings::default(),
            sentinel: CONVERSATION_ID_SENTINEL.to_string(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check values that would only fail later, mid-request
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for a base URL without an
    /// HTTP scheme or an empty sentinel.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = &self.endpoint.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "base_url must start with http:// or https://, got {base_url:?}"
            )));
        }
        if self.sentinel.is_empty() {
            return Err(ConfigError::ValidationError(
                "sentinel must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/medchat/client.toml` or
/// `~/.config/medchat/client.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("medchat").join("client.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ClientConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

fn load_config_with_env(
    path: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ClientToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ClientConfig, toml: &ClientToml) {
    // Endpoint settings
    if let Some(ref url) = toml.endpoint.base_url {
        config.endpoint.base_url.clone_from(url);
    }
    if let Some(ref path) = toml.endpoint.chat_path {
        config.endpoint.chat_path.clone_from(path);
    }
    if let Some(ref path) = toml.endpoint.end_path {
        config.endpoint.end_path.clone_from(path);
    }
    if let Some(ms) = toml.endpoint.connect_timeout_ms {
        config.endpoint.connect_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.endpoint.end_timeout_ms {
        config.endpoint.end_timeout = Duration::from_millis(ms);
    }

    // Conversation settings
    if let Some(ref greeting) = toml.conversation.greeting {
        config.conversation.greeting.clone_from(greeting);
    }
    if let Some(ref greeting) = toml.conversation.reset_greeting {
        config.conversation.reset_greeting.clone_from(greeting);
    }
    if let Some(ref message) = toml.conversation.error_message {
        config.conversation.error_message.clone_from(message);
    }
    if let Some(ref sentinel) = toml.conversation.sentinel {
        config.sentinel.clone_from(sentinel);
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut ClientConfig, env: impl Fn(&str) -> Option<String>) {
    if let Some(url) = env(ENV_BASE_URL) {
        config.endpoint.base_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(timeout) = env(ENV_CONNECT_TIMEOUT_MS) {
        match timeout.parse::<u64>() {
            Ok(ms) => {
                config.endpoint.connect_timeout = Duration::from_millis(ms);
                config.source = ConfigSource::Env;
            }
            Err(_) => tracing::warn!(value = %timeout, "Ignoring invalid {ENV_CONNECT_TIMEOUT_MS}"),
        }
    }
    if let Some(timeout) = env(ENV_END_TIMEOUT_MS) {
        match timeout.parse::<u64>() {
            Ok(ms) => {
                config.endpoint.end_timeout = Duration::from_millis(ms);
                config.source = ConfigSource::Env;
            }
            Err(_) => tracing::warn!(value = %timeout, "Ignoring invalid {ENV_END_TIMEOUT_MS}"),
        }
    }
    if let Some(sentinel) = env(ENV_SENTINEL) {
        config.sentinel = sentinel;
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Base URL override
    pub base_url: Option<String>,

    /// Connect timeout override (milliseconds)
    pub connect_timeout_ms: Option<u64>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Set connect timeout override
    #[must_use]
    pub fn with_connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = Some(ms);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ClientConfig) {
        if self.base_url.is_some() || self.connect_timeout_ms.is_some() {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.base_url {
            config.endpoint.base_url.clone_from(url);
        }

        if let Some(ms) = self.connect_timeout_ms {
            config.endpoint.connect_timeout = Duration::from_millis(ms);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    // =========================================================================
    // Default Configuration Tests
    // =========================================================================

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();

        assert_eq!(config.endpoint.base_url, "http://localhost:3000");
        assert_eq!(config.endpoint.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.endpoint.end_timeout, Duration::from_secs(15));
        assert_eq!(config.sentinel, "###CONVERSATION_ID###");
        assert_eq!(config.conversation, ConversationSettings::default());
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint_urls() {
        let endpoint = EndpointConfig::default();
        assert_eq!(endpoint.chat_url(), "http://localhost:3000/api/chat");
        assert_eq!(endpoint.end_url(), "http://localhost:3000/api/chat/end");

        let endpoint = EndpointConfig::with_base_url("https://health.example/");
        assert_eq!(endpoint.chat_url(), "https://health.example/api/chat");
    }

    #[test]
    fn test_config_source_display() {
        assert_eq!(ConfigSource::Cli.to_string(), "CLI");
        assert_eq!(ConfigSource::Env.to_string(), "environment");
        assert_eq!(ConfigSource::File.to_string(), "config file");
        assert_eq!(ConfigSource::Default.to_string(), "default");
    }

    // =========================================================================
    // File Loading Tests
    // =========================================================================

    #[test]
    fn test_missing_file_uses_defaults() {
        let config =
            load_config_with_env(Some(PathBuf::from("/nonexistent/client.toml")), no_env).unwrap();
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.config_file_path.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(
            r#"
[endpoint]
base_url = "https://health.example"
end_timeout_ms = 2500

[conversation]
reset_greeting = "Welcome back."
sentinel = "<<ID>>"
"#,
        );

        let config = load_config_with_env(Some(file.path().to_path_buf()), no_env).unwrap();

        assert_eq!(config.endpoint.base_url, "https://health.example");
        assert_eq!(config.endpoint.chat_path, "/api/chat");
        assert_eq!(config.endpoint.end_timeout, Duration::from_millis(2500));
        assert_eq!(config.conversation.reset_greeting, "Welcome back.");
        assert_eq!(
            config.conversation.greeting,
            ConversationSettings::default().greeting
        );
        assert_eq!(config.sentinel, "<<ID>>");
        assert_eq!(config.source(), ConfigSource::File);
        assert_eq!(config.config_file_path.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let file = write_config("[endpoint\nbase_url = ");
        let result = load_config_with_env(Some(file.path().to_path_buf()), no_env);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    // =========================================================================
    // Priority Tests
    // =========================================================================

    #[test]
    fn test_env_overrides_file() {
        let file = write_config("[endpoint]\nbase_url = \"http://file:1\"\nconnect_timeout_ms = 100\n");
        let env = env_from(&[
            (ENV_BASE_URL, "http://env:2"),
            (ENV_CONNECT_TIMEOUT_MS, "not-a-number"),
            (ENV_END_TIMEOUT_MS, "900"),
        ]);

        let config = load_config_with_env(Some(file.path().to_path_buf()), env).unwrap();

        assert_eq!(config.endpoint.base_url, "http://env:2");
        assert_eq!(config.endpoint.connect_timeout, Duration::from_millis(100));
        assert_eq!(config.endpoint.end_timeout, Duration::from_millis(900));
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_cli_overrides_env() {
        let mut config =
            load_config_with_env(None, env_from(&[(ENV_BASE_URL, "http://env:2")])).unwrap();

        ConfigOverrides::new()
            .with_base_url("http://cli:3".to_string())
            .with_connect_timeout_ms(50)
            .apply(&mut config);

        assert_eq!(config.endpoint.base_url, "http://cli:3");
        assert_eq!(config.endpoint.connect_timeout, Duration::from_millis(50));
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    #[test]
    fn test_empty_overrides_keep_source() {
        let mut config = ClientConfig::default();
        ConfigOverrides::new().apply(&mut config);
        assert_eq!(config.source(), ConfigSource::Default);
    }

    // =========================================================================
    // Validation Tests
    // =========================================================================

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = ClientConfig::default();
        config.endpoint.base_url = "localhost:3000".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = ClientConfig::default();
        config.sentinel = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_default_config_path() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("medchat/client.toml"));
        }
    }
}
