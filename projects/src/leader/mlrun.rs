use super::LeaderClient;
use crate::errors::LeaderError;
use crate::types::{
    CreateProjectOptions, DeleteProjectOptions, GetProjectsOptions, LeaderKind, ProjectConfig,
    UpdateProjectOptions,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Placeholder for MLRun acting as the projects leader. Selectable through
/// configuration, but every operation fails with `NotImplemented`.
pub struct MlrunClient;

fn not_implemented<T>(operation: &'static str) -> Result<T, LeaderError> {
    Err(LeaderError::NotImplemented {
        kind: LeaderKind::Mlrun,
        operation,
    })
}

#[async_trait]
impl LeaderClient for MlrunClient {
    fn kind(&self) -> LeaderKind {
        LeaderKind::Mlrun
    }

    async fn get(&self, _options: &GetProjectsOptions) -> Result<Vec<ProjectConfig>, LeaderError> {
        not_implemented("get")
    }

    async fn create(&self, _options: &CreateProjectOptions) -> Result<(), LeaderError> {
        not_implemented("create")
    }

    async fn update(&self, _options: &UpdateProjectOptions) -> Result<(), LeaderError> {
        not_implemented("update")
    }

    async fn delete(&self, _options: &DeleteProjectOptions) -> Result<(), LeaderError> {
        not_implemented("delete")
    }

    async fn get_updated_after(
        &self,
        _cursor: Option<DateTime<Utc>>,
    ) -> Result<Vec<ProjectConfig>, LeaderError> {
        not_implemented("get_updated_after")
    }
}
