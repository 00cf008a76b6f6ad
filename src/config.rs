//! Engine configuration for the match approval flow.

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Which participant must respond when a match is submitted by a third
/// party who played in it neither as winner nor loser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponderPolicy {
    /// The reported winner must respond.
    Winner,
    /// The reported loser must respond.
    Loser,
}

/// Tunable parameters of the submission and approval flow.
///
/// Protocol constants (the winning score, the display name limit, the tier
/// thresholds) are not configurable; they live next to the logic they bind.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds an approval session stays open before expiring.
    #[serde(default = "default_approval_timeout_secs")]
    approval_timeout_secs: u64,

    /// Seconds a submitter must wait between submissions.
    #[serde(default = "default_submit_cooldown_secs")]
    submit_cooldown_secs: u64,

    /// Responder choice for third-party submissions.
    #[serde(default = "default_third_party_responder")]
    third_party_responder: ResponderPolicy,
}

#[instrument]
fn default_approval_timeout_secs() -> u64 {
    60
}

#[instrument]
fn default_submit_cooldown_secs() -> u64 {
    30
}

#[instrument]
fn default_third_party_responder() -> ResponderPolicy {
    ResponderPolicy::Winner
}

impl EngineConfig {
    /// Loads configuration from TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        info!(
            approval_timeout_secs = config.approval_timeout_secs,
            submit_cooldown_secs = config.submit_cooldown_secs,
            "Config loaded successfully"
        );
        Ok(config)
    }

    /// Approval window as a [`Duration`].
    pub fn approval_timeout(&self) -> Duration {
        Duration::from_secs(self.approval_timeout_secs)
    }

    /// Submission cooldown as a [`Duration`].
    pub fn submit_cooldown(&self) -> Duration {
        Duration::from_secs(self.submit_cooldown_secs)
    }

    /// Replaces the approval window, for tests that need a short one.
    pub fn with_approval_timeout_secs(mut self, secs: u64) -> Self {
        self.approval_timeout_secs = secs;
        self
    }

    /// Replaces the submission cooldown.
    pub fn with_submit_cooldown_secs(mut self, secs: u64) -> Self {
        self.submit_cooldown_secs = secs;
        self
    }

    /// Replaces the third-party responder policy.
    pub fn with_third_party_responder(mut self, policy: ResponderPolicy) -> Self {
        self.third_party_responder = policy;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            approval_timeout_secs: default_approval_timeout_secs(),
            submit_cooldown_secs: default_submit_cooldown_secs(),
            third_party_responder: default_third_party_responder(),
        }
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
