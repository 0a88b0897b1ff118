//! Dual-write router in front of the internal project store.
//!
//! Mutations coming from the configured leader are applied to the internal
//! store directly. Everything else is forwarded to the leader, which owns the
//! project; the result shows up locally once the synchronizer pulls it.

use crate::config::ProjectsLeaderConfig;
use crate::errors::{ConfigError, LeaderError, ProjectsError, Result};
use crate::leader::{self, LeaderClient};
use crate::metrics_defs::FORWARDED_REQUESTS;
use crate::store::ProjectsClient;
use crate::synchronizer::Synchronizer;
use crate::types::{
    CreateProjectOptions, DeleteProjectOptions, GetProjectsOptions, LeaderKind, ProjectConfig,
    RequestOrigin, UpdateProjectOptions,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared::counter;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct ExternalClient {
    store: Arc<dyn ProjectsClient>,
    leader: Arc<dyn LeaderClient>,
    leader_kind: LeaderKind,
    synchronizer: Arc<Synchronizer>,
    shutdown: CancellationToken,
    sync_task: Mutex<Option<JoinHandle<()>>>,
}

impl ExternalClient {
    pub fn new(
        store: Arc<dyn ProjectsClient>,
        leader: Arc<dyn LeaderClient>,
        config: &ProjectsLeaderConfig,
    ) -> Self {
        let synchronizer = Arc::new(Synchronizer::new(leader.clone(), store.clone(), config));

        ExternalClient {
            store,
            leader_kind: config.kind,
            leader,
            synchronizer,
            shutdown: CancellationToken::new(),
            sync_task: Mutex::new(None),
        }
    }

    /// Validates `config` and builds the leader client it names.
    pub fn from_config(
        store: Arc<dyn ProjectsClient>,
        config: &ProjectsLeaderConfig,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let leader = leader::create(config)?;
        Ok(Self::new(store, leader, config))
    }

    fn from_leader(&self, origin: RequestOrigin) -> bool {
        origin == RequestOrigin::Leader(self.leader_kind)
    }

    /// Maps the leader's answer to the router's result. Success is reported
    /// as [`ProjectsError::Accepted`], never as a materialized project.
    fn forwarded<T>(
        &self,
        operation: &'static str,
        result: std::result::Result<(), LeaderError>,
    ) -> Result<T> {
        match result {
            Ok(()) => {
                counter!(FORWARDED_REQUESTS, "operation" => operation, "outcome" => "accepted")
                    .increment(1);
                tracing::debug!(leader = %self.leader_kind, operation, "Forwarded project mutation");
                Err(ProjectsError::Accepted)
            }
            Err(source) => {
                counter!(FORWARDED_REQUESTS, "operation" => operation, "outcome" => "failed")
                    .increment(1);
                tracing::warn!(
                    leader = %self.leader_kind,
                    operation,
                    error = %source,
                    "Projects leader rejected forwarded mutation"
                );
                Err(ProjectsError::Leader { operation, source })
            }
        }
    }
}

#[async_trait]
impl ProjectsClient for ExternalClient {
    /// Starts the synchronizer (once) and then initializes the internal store.
    async fn initialize(&self) -> Result<()> {
        {
            let mut sync_task = self.sync_task.lock();
            if sync_task.is_none() {
                *sync_task = self.synchronizer.start(self.shutdown.clone())?;
            }
        }

        self.store.initialize().await
    }

    async fn get(&self, options: &GetProjectsOptions) -> Result<Vec<ProjectConfig>> {
        self.store.get(options).await
    }

    async fn create(&self, options: &CreateProjectOptions) -> Result<ProjectConfig> {
        if self.from_leader(options.request_origin) {
            return self.store.create(options).await;
        }
        let result = self.leader.create(options).await;
        self.forwarded("create", result)
    }

    async fn update(&self, options: &UpdateProjectOptions) -> Result<ProjectConfig> {
        if self.from_leader(options.request_origin) {
            return self.store.update(options).await;
        }
        let result = self.leader.update(options).await;
        self.forwarded("update", result)
    }

    async fn delete(&self, options: &DeleteProjectOptions) -> Result<()> {
        if self.from_leader(options.request_origin) {
            return self.store.delete(options).await;
        }
        let result = self.leader.delete(options).await;
        self.forwarded("delete", result)
    }

    /// Stops the synchronizer and waits for its loop to exit. A cycle that is
    /// already running completes first.
    async fn shutdown(&self) {
        self.shutdown.cancel();

        let handle = self.sync_task.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::error!("Projects synchronizer task failed: {e}");
        }
    }
}
