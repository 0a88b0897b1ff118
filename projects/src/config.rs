use crate::duration::parse_duration;
use crate::errors::ConfigError;
use crate::types::LeaderKind;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

fn default_synchronization_interval() -> String {
    "0".into()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_applies() -> usize {
    8
}

fn default_max_apply_attempts() -> u32 {
    5
}

/// Settings for the external projects leader.
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct ProjectsLeaderConfig {
    /// Which leader implementation to talk to
    pub kind: LeaderKind,
    /// Base URL of the leader's API, e.g. `http://leader.internal/api`
    #[serde(default)]
    pub address: Option<Url>,
    /// Go-style duration between synchronization cycles. `"0"` disables synchronization.
    #[serde(default = "default_synchronization_interval")]
    pub synchronization_interval: String,
    /// Session cookie the synchronizer uses for its own reads from the leader
    #[serde(default)]
    pub session_cookie: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Upper bound on concurrent internal store writes within one cycle
    #[serde(default = "default_max_concurrent_applies")]
    pub max_concurrent_applies: usize,
    /// Attempts at applying a project whose store write keeps failing before
    /// the synchronizer stops retrying it
    #[serde(default = "default_max_apply_attempts")]
    pub max_apply_attempts: u32,
}

impl ProjectsLeaderConfig {
    pub fn new(kind: LeaderKind) -> Self {
        ProjectsLeaderConfig {
            kind,
            address: None,
            synchronization_interval: default_synchronization_interval(),
            session_cookie: None,
            request_timeout_secs: default_request_timeout_secs(),
            max_concurrent_applies: default_max_concurrent_applies(),
            max_apply_attempts: default_max_apply_attempts(),
        }
    }

    /// `None` when synchronization is disabled.
    pub fn synchronization_interval(&self) -> Result<Option<Duration>, ConfigError> {
        let interval = parse_duration(&self.synchronization_interval).map_err(|source| {
            ConfigError::InvalidInterval {
                value: self.synchronization_interval.clone(),
                source,
            }
        })?;

        Ok((!interval.is_zero()).then_some(interval))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.synchronization_interval()?;

        if self.kind == LeaderKind::Iguazio && self.address.is_none() {
            return Err(ConfigError::MissingAddress(self.kind));
        }

        if self.max_concurrent_applies == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }

        if self.max_apply_attempts == 0 {
            return Err(ConfigError::InvalidApplyAttempts);
        }

        Ok(())
    }
}
