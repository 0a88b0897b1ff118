use super::{LeaderClient, updated_at_or_after};
use crate::errors::LeaderError;
use crate::types::{
    CreateProjectOptions, DeleteProjectOptions, GetProjectsOptions, LeaderKind, ProjectConfig,
    ProjectKey, UpdateProjectOptions,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

#[derive(Clone, Debug, PartialEq)]
pub enum LeaderCall {
    Get(GetProjectsOptions),
    Create(ProjectConfig),
    Update(ProjectConfig),
    Delete(ProjectKey),
    GetUpdatedAfter(Option<DateTime<Utc>>),
}

/// In-memory leader without any network I/O. Records every call and serves
/// whatever project set it was seeded with. Writes are only recorded; like a
/// real leader they do not show up in reads until the test says so.
#[derive(Default)]
pub struct MockLeaderClient {
    projects: Mutex<Vec<ProjectConfig>>,
    calls: Mutex<Vec<LeaderCall>>,
    failure: Mutex<Option<String>>,
    get_failure: Mutex<Option<String>>,
}

impl MockLeaderClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projects(projects: Vec<ProjectConfig>) -> Self {
        let client = Self::new();
        client.set_projects(projects);
        client
    }

    pub fn set_projects(&self, projects: Vec<ProjectConfig>) {
        *self.projects.lock() = projects;
    }

    /// Replaces the project with the same key, or adds it.
    pub fn upsert_project(&self, project: ProjectConfig) {
        let mut projects = self.projects.lock();
        match projects.iter_mut().find(|p| p.key() == project.key()) {
            Some(existing) => *existing = project,
            None => projects.push(project),
        }
    }

    /// Every call fails with `message` until cleared with `None`.
    pub fn set_failure(&self, message: Option<&str>) {
        *self.failure.lock() = message.map(String::from);
    }

    /// Like [`Self::set_failure`], but only for `get`.
    pub fn set_get_failure(&self, message: Option<&str>) {
        *self.get_failure.lock() = message.map(String::from);
    }

    pub fn calls(&self) -> Vec<LeaderCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: LeaderCall) -> Result<(), LeaderError> {
        self.calls.lock().push(call);
        match self.failure.lock().as_ref() {
            Some(message) => Err(LeaderError::Injected(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LeaderClient for MockLeaderClient {
    fn kind(&self) -> LeaderKind {
        LeaderKind::Mock
    }

    async fn get(&self, options: &GetProjectsOptions) -> Result<Vec<ProjectConfig>, LeaderError> {
        self.record(LeaderCall::Get(options.clone()))?;
        if let Some(message) = self.get_failure.lock().as_ref() {
            return Err(LeaderError::Injected(message.clone()));
        }
        Ok(self
            .projects
            .lock()
            .iter()
            .filter(|p| options.matches(p))
            .cloned()
            .collect())
    }

    async fn create(&self, options: &CreateProjectOptions) -> Result<(), LeaderError> {
        self.record(LeaderCall::Create(options.project.clone()))
    }

    async fn update(&self, options: &UpdateProjectOptions) -> Result<(), LeaderError> {
        self.record(LeaderCall::Update(options.project.clone()))
    }

    async fn delete(&self, options: &DeleteProjectOptions) -> Result<(), LeaderError> {
        self.record(LeaderCall::Delete(options.key.clone()))
    }

    async fn get_updated_after(
        &self,
        cursor: Option<DateTime<Utc>>,
    ) -> Result<Vec<ProjectConfig>, LeaderError> {
        self.record(LeaderCall::GetUpdatedAfter(cursor))?;
        Ok(self
            .projects
            .lock()
            .iter()
            .filter(|p| updated_at_or_after(p, cursor))
            .cloned()
            .collect())
    }
}
