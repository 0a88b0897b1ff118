//! The platform-wide project store contract, and an in-memory store that
//! implements it.

use crate::errors::{ProjectsError, Result};
use crate::types::{
    CreateProjectOptions, DeleteProjectOptions, GetProjectsOptions, ProjectConfig, ProjectKey,
    UpdateProjectOptions,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Implemented by the internal store and by the router in front of it, so
/// callers never need to know whether a leader is involved.
#[async_trait]
pub trait ProjectsClient: Send + Sync {
    async fn initialize(&self) -> Result<()>;

    async fn get(&self, options: &GetProjectsOptions) -> Result<Vec<ProjectConfig>>;

    async fn create(&self, options: &CreateProjectOptions) -> Result<ProjectConfig>;

    async fn update(&self, options: &UpdateProjectOptions) -> Result<ProjectConfig>;

    async fn delete(&self, options: &DeleteProjectOptions) -> Result<()>;

    /// Stops any background work started by `initialize`.
    async fn shutdown(&self) {}
}

/// Keeps projects in process memory, keyed by namespace and name.
#[derive(Default)]
pub struct LocalClient {
    projects: RwLock<BTreeMap<ProjectKey, ProjectConfig>>,
}

impl LocalClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn stamped(project: &ProjectConfig) -> ProjectConfig {
        let mut project = project.clone();
        project.status.updated_at.get_or_insert_with(Utc::now);
        project
    }
}

#[async_trait]
impl ProjectsClient for LocalClient {
    async fn initialize(&self) -> Result<()> {
        tracing::debug!("Local projects store ready");
        Ok(())
    }

    async fn get(&self, options: &GetProjectsOptions) -> Result<Vec<ProjectConfig>> {
        Ok(self
            .projects
            .read()
            .values()
            .filter(|p| options.matches(p))
            .cloned()
            .collect())
    }

    async fn create(&self, options: &CreateProjectOptions) -> Result<ProjectConfig> {
        let key = options.project.key();
        let mut projects = self.projects.write();

        if projects.contains_key(&key) {
            return Err(ProjectsError::AlreadyExists(key));
        }

        let project = Self::stamped(&options.project);
        projects.insert(key, project.clone());
        Ok(project)
    }

    async fn update(&self, options: &UpdateProjectOptions) -> Result<ProjectConfig> {
        let key = options.project.key();
        let mut projects = self.projects.write();

        let existing = projects
            .get_mut(&key)
            .ok_or_else(|| ProjectsError::NotFound(key.clone()))?;

        *existing = Self::stamped(&options.project);
        Ok(existing.clone())
    }

    async fn delete(&self, options: &DeleteProjectOptions) -> Result<()> {
        self.projects
            .write()
            .remove(&options.key)
            .map(|_| ())
            .ok_or_else(|| ProjectsError::NotFound(options.key.clone()))
    }
}
