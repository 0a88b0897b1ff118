use projects::ProjectsLeaderConfig;
use serde::Deserialize;
use std::fs::File;

#[derive(Deserialize, Debug, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 8081,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct Config {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub admin_listener: Listener,
    /// Without a leader, projects are served from the internal store only
    pub projects_leader: Option<ProjectsLeaderConfig>,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Config = serde_yaml::from_reader(file)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin_listener.port == 0 {
            return Err(ConfigError::InvalidListener(
                "admin_listener.port must be non-zero".into(),
            ));
        }

        if let Some(logging) = &self.logging {
            logging.sentry_dsn.parse::<sentry::types::Dsn>()?;
        }

        if let Some(leader) = &self.projects_leader {
            leader.validate()?;
        }

        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid listener: {0}")]
    InvalidListener(String),
    #[error("invalid sentry DSN: {0}")]
    InvalidSentryDsn(#[from] sentry::types::ParseDsnError),
    #[error("invalid projects leader config: {0}")]
    ProjectsLeader(#[from] projects::ConfigError),
}
