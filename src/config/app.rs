//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! stranger-room service, including environment variable loading, TOML file
//! loading and validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub matchmaking: MatchmakingSettings,
    pub relay: RelaySettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Host the HTTP listeners bind to
    pub host: String,
    /// Port for the WebSocket endpoint
    pub http_port: u16,
    /// Port for health check and metrics endpoints
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Which scoring policy the matchmaker uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicyKind {
    /// Plain first-come first-served pairing
    Fifo,
    /// Prefer candidates sharing interest tags
    Interest,
}

impl FromStr for MatchPolicyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fifo" => Ok(MatchPolicyKind::Fifo),
            "interest" => Ok(MatchPolicyKind::Interest),
            other => Err(anyhow!("Unknown match policy: {}", other)),
        }
    }
}

impl std::fmt::Display for MatchPolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchPolicyKind::Fifo => write!(f, "fifo"),
            MatchPolicyKind::Interest => write!(f, "interest"),
        }
    }
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Scoring policy for the best-match search
    pub match_policy: MatchPolicyKind,
    /// Score at which the best-match scan stops early
    pub good_match_score: usize,
    /// Reports against one connection before a cooldown is applied
    pub report_threshold: u32,
    /// Cooldown length in seconds
    pub cooldown_seconds: u64,
    /// Put the partner back in the queue when a session ends on the other side
    pub auto_requeue_partner: bool,
    /// Maximum display name length
    pub max_name_chars: usize,
    /// Maximum gender tag length
    pub max_gender_chars: usize,
    /// Maximum number of interest tags kept per profile
    pub max_interests: usize,
}

/// Relay validation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Maximum relayed text length in characters
    pub max_message_chars: usize,
    /// Maximum relayed media URL length in characters
    pub max_media_url_chars: usize,
    /// Maximum logged report reason length
    pub max_report_reason_chars: usize,
    /// Minimum spacing between relayed typing events per sender
    pub typing_min_interval_ms: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "stranger-room".to_string(),
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            http_port: 3000,
            health_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            match_policy: MatchPolicyKind::Interest,
            good_match_score: 2,
            report_threshold: 3,
            cooldown_seconds: 600, // 10 minutes
            auto_requeue_partner: true,
            max_name_chars: 40,
            max_gender_chars: 20,
            max_interests: 5,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            max_message_chars: 1000,
            max_media_url_chars: 2048,
            max_report_reason_chars: 80,
            typing_min_interval_ms: 500,
        }
    }
}

/// Parse an environment variable into `target` if it is set
fn override_from_env<T>(key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
{
    if let Ok(value) = env::var(key) {
        *target = value
            .parse()
            .map_err(|_| anyhow!("Invalid {} value: {}", key, value))?;
    }
    Ok(())
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let mut config = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env_overrides()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Parse configuration from TOML text without env overrides
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Apply environment variable overrides on top of the current values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(host) = env::var("HOST") {
            self.service.host = host;
        }
        override_from_env("HTTP_PORT", &mut self.service.http_port)?;
        override_from_env("HEALTH_PORT", &mut self.service.health_port)?;
        override_from_env(
            "SHUTDOWN_TIMEOUT_SECONDS",
            &mut self.service.shutdown_timeout_seconds,
        )?;

        // Matchmaking settings
        override_from_env("MATCH_POLICY", &mut self.matchmaking.match_policy)?;
        override_from_env("GOOD_MATCH_SCORE", &mut self.matchmaking.good_match_score)?;
        override_from_env("REPORT_THRESHOLD", &mut self.matchmaking.report_threshold)?;
        override_from_env("COOLDOWN_SECONDS", &mut self.matchmaking.cooldown_seconds)?;
        override_from_env(
            "AUTO_REQUEUE_PARTNER",
            &mut self.matchmaking.auto_requeue_partner,
        )?;

        // Relay settings
        override_from_env("MAX_MESSAGE_CHARS", &mut self.relay.max_message_chars)?;
        override_from_env("MAX_MEDIA_URL_CHARS", &mut self.relay.max_media_url_chars)?;
        override_from_env(
            "TYPING_MIN_INTERVAL_MS",
            &mut self.relay.typing_min_interval_ms,
        )?;

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get cooldown length as a chrono Duration
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.matchmaking.cooldown_seconds as i64)
    }

    /// Get minimum typing interval as Duration
    pub fn typing_min_interval(&self) -> Duration {
        Duration::from_millis(self.relay.typing_min_interval_ms)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }
    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.http_port == config.service.health_port {
        return Err(anyhow!("HTTP port and health port must differ"));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate matchmaking settings
    if config.matchmaking.good_match_score == 0 {
        return Err(anyhow!("Good match score must be greater than 0"));
    }
    if config.matchmaking.report_threshold == 0 {
        return Err(anyhow!("Report threshold must be greater than 0"));
    }
    if config.matchmaking.cooldown_seconds == 0 {
        return Err(anyhow!("Cooldown must be greater than 0"));
    }
    if config.matchmaking.max_name_chars == 0 || config.matchmaking.max_interests == 0 {
        return Err(anyhow!("Profile limits must be greater than 0"));
    }

    // Validate relay settings
    if !(800..=1200).contains(&config.relay.max_message_chars) {
        return Err(anyhow!(
            "Max message length must be between 800 and 1200, got {}",
            config.relay.max_message_chars
        ));
    }
    if config.relay.max_media_url_chars == 0 {
        return Err(anyhow!("Max media URL length must be greater than 0"));
    }

    Ok(())
}
