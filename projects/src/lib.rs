//! Project management against an optional external projects leader.
//!
//! Without a leader the internal store is used as is. With one, writes are
//! routed through [`client::ExternalClient`] and the
//! [`synchronizer::Synchronizer`] keeps the internal store in line with the
//! leader.

pub mod client;
pub mod config;
pub mod duration;
pub mod errors;
pub mod leader;
pub mod metrics_defs;
pub mod store;
pub mod synchronizer;
pub mod types;

#[cfg(test)]
mod testutils;

pub use client::ExternalClient;
pub use config::ProjectsLeaderConfig;
pub use errors::{ConfigError, LeaderError, ProjectsError, SyncError};
pub use store::{LocalClient, ProjectsClient};
pub use types::{LeaderKind, ProjectConfig, ProjectKey, RequestOrigin};

use std::sync::Arc;

/// Builds the projects client the rest of the platform talks to: `store`
/// itself when no leader is configured, or a router in front of it.
pub fn new_client(
    leader: Option<&ProjectsLeaderConfig>,
    store: Arc<dyn ProjectsClient>,
) -> Result<Arc<dyn ProjectsClient>, ConfigError> {
    match leader {
        None => {
            tracing::info!("No projects leader configured, serving projects locally");
            Ok(store)
        }
        Some(config) => Ok(Arc::new(ExternalClient::from_config(store, config)?)),
    }
}
