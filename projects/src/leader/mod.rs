//! Clients for the external projects leader.
//!
//! Each leader kind implements [`LeaderClient`] on its own; the router and
//! the synchronizer only ever see the trait object returned by [`create`].

pub mod iguazio;
pub mod mlrun;
pub mod mock;
pub mod protocol;

use crate::config::ProjectsLeaderConfig;
use crate::errors::{ConfigError, LeaderError};
use crate::types::{
    CreateProjectOptions, DeleteProjectOptions, GetProjectsOptions, LeaderKind, ProjectConfig,
    UpdateProjectOptions,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[async_trait]
pub trait LeaderClient: Send + Sync {
    fn kind(&self) -> LeaderKind;

    async fn get(&self, options: &GetProjectsOptions) -> Result<Vec<ProjectConfig>, LeaderError>;

    /// Writes only return the leader's acceptance. The leader applies them
    /// asynchronously and the synchronizer picks the result up later.
    async fn create(&self, options: &CreateProjectOptions) -> Result<(), LeaderError>;

    async fn update(&self, options: &UpdateProjectOptions) -> Result<(), LeaderError>;

    async fn delete(&self, options: &DeleteProjectOptions) -> Result<(), LeaderError>;

    /// Projects updated at or after `cursor`, or every project when there is
    /// no cursor yet. The bound is inclusive so that projects sharing the
    /// cursor's timestamp are never skipped. Projects without a parsable
    /// timestamp are always included.
    async fn get_updated_after(
        &self,
        cursor: Option<DateTime<Utc>>,
    ) -> Result<Vec<ProjectConfig>, LeaderError>;
}

/// Builds the leader client for the configured kind.
pub fn create(config: &ProjectsLeaderConfig) -> Result<Arc<dyn LeaderClient>, ConfigError> {
    let client: Arc<dyn LeaderClient> = match config.kind {
        LeaderKind::Iguazio => Arc::new(iguazio::IguazioClient::new(config)?),
        LeaderKind::Mlrun => Arc::new(mlrun::MlrunClient),
        LeaderKind::Mock => Arc::new(mock::MockLeaderClient::new()),
    };

    tracing::info!(kind = %config.kind, "Created projects leader client");
    Ok(client)
}

/// Shared by leader implementations that filter locally.
pub(crate) fn updated_at_or_after(project: &ProjectConfig, cursor: Option<DateTime<Utc>>) -> bool {
    match (cursor, project.status.updated_at) {
        (None, _) | (_, None) => true,
        (Some(cursor), Some(updated_at)) => updated_at >= cursor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn test_create_by_kind() {
        let mock = create(&ProjectsLeaderConfig::new(LeaderKind::Mock)).unwrap();
        assert_eq!(mock.kind(), LeaderKind::Mock);

        let mlrun = create(&ProjectsLeaderConfig::new(LeaderKind::Mlrun)).unwrap();
        assert_eq!(mlrun.kind(), LeaderKind::Mlrun);

        let mut config = ProjectsLeaderConfig::new(LeaderKind::Iguazio);
        assert!(matches!(
            create(&config),
            Err(ConfigError::MissingAddress(LeaderKind::Iguazio))
        ));

        config.address = Some(Url::parse("http://leader.internal/api").unwrap());
        let iguazio = create(&config).unwrap();
        assert_eq!(iguazio.kind(), LeaderKind::Iguazio);
    }

    #[test]
    fn test_updated_at_or_after() {
        let now = Utc::now();
        let mut project = ProjectConfig::new("default", "p1");

        assert!(updated_at_or_after(&project, None));
        assert!(updated_at_or_after(&project, Some(now)));

        project.status.updated_at = Some(now);
        assert!(updated_at_or_after(&project, Some(now)));
        assert!(!updated_at_or_after(
            &project,
            Some(now + chrono::Duration::seconds(1))
        ));
    }
}
