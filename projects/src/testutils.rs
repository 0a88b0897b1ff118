use crate::errors::{ProjectsError, Result};
use crate::store::{LocalClient, ProjectsClient};
use crate::types::{
    CreateProjectOptions, DeleteProjectOptions, GetProjectsOptions, ProjectConfig, ProjectKey,
    STATUS_ONLINE, UpdateProjectOptions,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreCall {
    Initialize,
    Get,
    Create(ProjectKey),
    Update(ProjectKey),
    Delete(ProjectKey),
}

/// Wraps a [`LocalClient`], recording every call and allowing failures and
/// latency to be injected.
#[derive(Default)]
pub struct RecordingStore {
    inner: LocalClient,
    calls: Mutex<Vec<StoreCall>>,
    failing_keys: Mutex<HashSet<ProjectKey>>,
    fail_listing: AtomicBool,
    write_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_write_delay(delay: Duration) -> Self {
        RecordingStore {
            write_delay: Some(delay),
            ..Default::default()
        }
    }

    /// Inserts projects without recording any calls.
    pub async fn seed(&self, projects: Vec<ProjectConfig>) {
        for project in projects {
            self.inner
                .create(&CreateProjectOptions {
                    project,
                    ..Default::default()
                })
                .await
                .unwrap();
        }
    }

    pub fn fail_writes_for(&self, key: ProjectKey) {
        self.failing_keys.lock().insert(key);
    }

    pub fn allow_writes_for(&self, key: &ProjectKey) {
        self.failing_keys.lock().remove(key);
    }

    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn writes(&self) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, StoreCall::Get | StoreCall::Initialize))
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> Vec<ProjectConfig> {
        self.inner.get(&GetProjectsOptions::all()).await.unwrap()
    }

    async fn before_write(&self, call: StoreCall, key: &ProjectKey) -> Result<()> {
        self.calls.lock().push(call);

        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_keys.lock().contains(key) {
            return Err(ProjectsError::Store(format!("injected failure for {key}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ProjectsClient for RecordingStore {
    async fn initialize(&self) -> Result<()> {
        self.calls.lock().push(StoreCall::Initialize);
        self.inner.initialize().await
    }

    async fn get(&self, options: &GetProjectsOptions) -> Result<Vec<ProjectConfig>> {
        self.calls.lock().push(StoreCall::Get);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(ProjectsError::Store("injected listing failure".into()));
        }
        self.inner.get(options).await
    }

    async fn create(&self, options: &CreateProjectOptions) -> Result<ProjectConfig> {
        let key = options.project.key();
        self.before_write(StoreCall::Create(key.clone()), &key).await?;
        self.inner.create(options).await
    }

    async fn update(&self, options: &UpdateProjectOptions) -> Result<ProjectConfig> {
        let key = options.project.key();
        self.before_write(StoreCall::Update(key.clone()), &key).await?;
        self.inner.update(options).await
    }

    async fn delete(&self, options: &DeleteProjectOptions) -> Result<()> {
        self.before_write(StoreCall::Delete(options.key.clone()), &options.key)
            .await?;
        self.inner.delete(options).await
    }
}

/// Fixed point in time, offset by `seconds`.
pub fn timestamp(seconds: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(seconds)
}

/// An online leader project last updated at `timestamp(updated_at)`.
pub fn leader_project(name: &str, description: &str, updated_at: i64) -> ProjectConfig {
    let mut project = ProjectConfig::new("default-tenant", name);
    project.spec.description = description.into();
    project.status.admin_status = STATUS_ONLINE.into();
    project.status.operational_status = STATUS_ONLINE.into();
    project.status.updated_at = Some(timestamp(updated_at));
    project
}
