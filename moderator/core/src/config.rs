//! Configuration
//!
//! Two layers live here:
//!
//! - [`DiscussionConfig`]: the validated, immutable description of one
//!   discussion (topic, participants, style, rounds).
//! - [`Settings`]: ambient settings loaded from a TOML file at
//!   `~/.config/duologue/duologue.toml`, environment variables, and CLI
//!   overrides.
//!
//! # Configuration Priority
//!
//! Settings values are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! scheme = "http"
//! host = "localhost"
//! port = 11434
//!
//! [reveal]
//! content_interval_ms = 15
//! thought_interval_ms = 5
//!
//! [discussion]
//! style = "debate"
//! rounds = 6
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use crate::error::ConfigError;
use crate::prompt::DEFAULT_STYLE;
use crate::reveal::RevealSettings;

/// Default number of turns in a discussion
pub const DEFAULT_ROUNDS: u32 = 10;

// =============================================================================
// Discussion Configuration
// =============================================================================

/// Validated description of one discussion
///
/// Construct through [`DiscussionConfig::new`]; the fields cannot change
/// afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiscussionConfig {
    topic: String,
    model1: String,
    model2: String,
    conversation_style: String,
    rounds: u32,
}

impl DiscussionConfig {
    /// Validate and build a discussion configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the models are equal, when the
    /// topic or a model is blank, or when `rounds` is zero.
    pub fn new(
        topic: impl Into<String>,
        model1: impl Into<String>,
        model2: impl Into<String>,
        conversation_style: impl Into<String>,
        rounds: u32,
    ) -> Result<Self, ConfigError> {
        let topic = topic.into();
        let model1 = model1.into();
        let model2 = model2.into();

        if !model1.trim().is_empty() && model1 == model2 {
            return Err(ConfigError::Invalid(
                "Please select two different models.".to_string(),
            ));
        }
        if topic.trim().is_empty() || model1.trim().is_empty() || model2.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "Please fill out all fields and ensure the server is connected."
                    .to_string(),
            ));
        }
        if rounds == 0 {
            return Err(ConfigError::Invalid(
                "The discussion needs at least one round.".to_string(),
            ));
        }

        Ok(Self {
            topic,
            model1,
            model2,
            conversation_style: conversation_style.into(),
            rounds,
        })
    }

    /// Discussion topic
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Participant that opens the discussion
    #[must_use]
    pub fn model1(&self) -> &str {
        &self.model1
    }

    /// Participant that answers first
    #[must_use]
    pub fn model2(&self) -> &str {
        &self.model2
    }

    /// Style key, resolved against the style table at prompt time
    #[must_use]
    pub fn conversation_style(&self) -> &str {
        &self.conversation_style
    }

    /// Total number of turns
    #[must_use]
    pub fn rounds(&self) -> u32 {
        self.rounds
    }
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

/// Server section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToml {
    /// `http` or `https`
    pub scheme: Option<String>,
    /// Inference server host, optionally with a scheme and port
    pub host: Option<String>,
    /// Inference server port
    pub port: Option<u16>,
}

/// Reveal section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealToml {
    /// Delay between revealed answer characters
    pub content_interval_ms: Option<u64>,
    /// Delay between revealed thought characters
    pub thought_interval_ms: Option<u64>,
}

/// Discussion defaults section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscussionToml {
    /// Default conversation style key
    pub style: Option<String>,
    /// Default number of rounds
    pub rounds: Option<u32>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsToml {
    /// Server configuration section
    pub server: ServerToml,
    /// Reveal animation section
    pub reveal: RevealToml,
    /// Discussion defaults section
    pub discussion: DiscussionToml,
}

// =============================================================================
// Settings
// =============================================================================

/// Location of the inference server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerSettings {
    /// URL scheme, `http` unless configured otherwise
    pub scheme: String,
    /// Host name or address
    pub host: String,
    /// Port number
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
        }
    }
}

impl ServerSettings {
    /// Defaults overlaid with `OLLAMA_HOST` / `OLLAMA_PORT`
    #[must_use]
    pub fn from_env() -> Self {
        let mut settings = Settings::default();
        apply_env_with(&mut settings, |key| std::env::var(key).ok());
        settings.server
    }

    /// Base URL of the server, e.g. `http://localhost:11434`
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// Apply a `[scheme://]host[:port]` value; returns false if it names no host
    fn apply_host(&mut self, value: &str) -> bool {
        let spec = parse_host(value);
        if spec.host.is_empty() {
            return false;
        }
        if let Some(scheme) = spec.scheme {
            self.scheme = scheme;
        }
        self.host = spec.host;
        if let Some(port) = spec.port {
            self.port = port;
        }
        true
    }
}

/// Ambient settings for the moderator and its surfaces
#[derive(Clone, Debug)]
pub struct Settings {
    /// Inference server location
    pub server: ServerSettings,
    /// Reveal animation timing
    pub reveal: RevealSettings,
    /// Style used when none is given
    pub default_style: String,
    /// Rounds used when none are given
    pub default_rounds: u32,
    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,
    /// Source of configuration values
    source: ConfigSource,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            reveal: RevealSettings::default(),
            default_style: DEFAULT_STYLE.to_string(),
            default_rounds: DEFAULT_ROUNDS,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl Settings {
    /// Create settings with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of these settings
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/duologue/duologue.toml` or
/// `~/.config/duologue/duologue.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("duologue").join("duologue.toml"))
}

/// Load settings from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load settings from a specific path
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<Settings, ConfigError> {
    let mut settings = Settings::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: SettingsToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut settings, &toml_config);
            settings.config_file_path = Some(config_path.clone());
            settings.source = ConfigSource::File;

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

    apply_env_with(&mut settings, |key| std::env::var(key).ok());

    Ok(settings)
}

/// Apply TOML configuration values to the settings
fn apply_toml_config(settings: &mut Settings, toml: &SettingsToml) {
    if let Some(ref host) = toml.server.host {
        settings.server.apply_host(host);
    }
    if let Some(ref scheme) = toml.server.scheme {
        settings.server.scheme = scheme.clone();
    }
    if let Some(port) = toml.server.port {
        settings.server.port = port;
    }

    if let Some(ms) = toml.reveal.content_interval_ms {
        settings.reveal.content_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.reveal.thought_interval_ms {
        settings.reveal.thought_interval = Duration::from_millis(ms);
    }

    if let Some(ref style) = toml.discussion.style {
        settings.default_style = style.clone();
    }
    if let Some(rounds) = toml.discussion.rounds {
        settings.default_rounds = rounds;
    }
}

/// Apply environment overrides through a lookup function
fn apply_env_with<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("OLLAMA_HOST") {
        if settings.server.apply_host(&value) {
            settings.source = ConfigSource::Env;
        }
    }
    if let Some(port) = lookup("OLLAMA_PORT").and_then(|v| v.parse::<u16>().ok()) {
        settings.server.port = port;
        settings.source = ConfigSource::Env;
    }

    if let Some(ms) = lookup("DUOLOGUE_CONTENT_INTERVAL_MS").and_then(|v| v.parse::<u64>().ok()) {
        settings.reveal.content_interval = Duration::from_millis(ms);
        settings.source = ConfigSource::Env;
    }
    if let Some(ms) = lookup("DUOLOGUE_THOUGHT_INTERVAL_MS").and_then(|v| v.parse::<u64>().ok()) {
        settings.reveal.thought_interval = Duration::from_millis(ms);
        settings.source = ConfigSource::Env;
    }

    if let Some(style) = lookup("DUOLOGUE_STYLE") {
        settings.default_style = style;
        settings.source = ConfigSource::Env;
    }
    if let Some(rounds) = lookup("DUOLOGUE_ROUNDS").and_then(|v| v.parse::<u32>().ok()) {
        settings.default_rounds = rounds;
        settings.source = ConfigSource::Env;
    }
}

/// Parts of a `[scheme://]host[:port]` value
#[derive(Debug, PartialEq, Eq)]
struct HostSpec {
    scheme: Option<String>,
    host: String,
    port: Option<u16>,
}

/// Split an `OLLAMA_HOST` style value into its parts
///
/// Accepts `host` and `host:port`, either form optionally prefixed with
/// `http://` or `https://`. The scheme is kept so TLS endpoints stay on TLS.
fn parse_host(value: &str) -> HostSpec {
    let value = value.trim();
    let (scheme, rest) = ["http", "https"]
        .into_iter()
        .find_map(|scheme| {
            let rest = value.strip_prefix(scheme)?.strip_prefix("://")?;
            Some((Some(scheme.to_string()), rest))
        })
        .unwrap_or((None, value));
    let rest = rest.trim_end_matches('/');

    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => match port.parse::<u16>() {
            Ok(port) => (host, Some(port)),
            Err(_) => (rest, None),
        },
        None => (rest, None),
    };
    HostSpec {
        scheme,
        host: host.to_string(),
        port,
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to settings
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Server host override
    pub host: Option<String>,
    /// Server port override
    pub port: Option<u16>,
    /// Disable the reveal animation
    pub instant_reveal: bool,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set host override
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set port override
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Reveal text immediately instead of animating it
    #[must_use]
    pub fn with_instant_reveal(mut self, instant: bool) -> Self {
        self.instant_reveal = instant;
        self
    }

    /// Apply overrides to settings
    pub fn apply(&self, settings: &mut Settings) {
        if self.host.is_some() || self.port.is_some() || self.instant_reveal {
            settings.source = ConfigSource::Cli;
        }

        if let Some(ref host) = self.host {
            settings.server.apply_host(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if self.instant_reveal {
            settings.reveal = RevealSettings::instant();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
