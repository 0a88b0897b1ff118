use super::LeaderClient;
use super::protocol::{Envelope, ProjectWriteRequest, format_timestamp};
use crate::config::ProjectsLeaderConfig;
use crate::errors::{ConfigError, LeaderError};
use crate::types::{
    CreateProjectOptions, DeleteProjectOptions, GetProjectsOptions, LeaderKind, ProjectConfig,
    UpdateProjectOptions,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::COOKIE;
use reqwest::{Method, StatusCode, Url};

pub const PROJECTS_ROLE_HEADER: &str = "x-projects-role";
pub const PROJECTS_ROLE: &str = "nuclio";
pub const DELETE_STRATEGY_HEADER: &str = "x-iguazio-delete-project-strategy";

/// Talks to an Iguazio platform acting as the projects leader.
pub struct IguazioClient {
    client: reqwest::Client,
    projects_url: String,
    // Used for the client's own reads; writes forward the caller's cookie instead
    session_cookie: Option<String>,
}

impl IguazioClient {
    pub fn new(config: &ProjectsLeaderConfig) -> Result<Self, ConfigError> {
        let address = config
            .address
            .as_ref()
            .ok_or(ConfigError::MissingAddress(config.kind))?;

        let projects_url = format!("{}/{}", address.as_str().trim_end_matches('/'), "projects");

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(IguazioClient {
            client,
            projects_url,
            session_cookie: config.session_cookie.clone(),
        })
    }

    async fn write(
        &self,
        method: Method,
        body: &ProjectWriteRequest,
        session_cookie: Option<&str>,
        extra_header: Option<(&'static str, &'static str)>,
    ) -> Result<(), LeaderError> {
        let mut request = self
            .client
            .request(method.clone(), &self.projects_url)
            .header(PROJECTS_ROLE_HEADER, PROJECTS_ROLE)
            .json(body);

        if let Some(cookie) = session_cookie {
            request = request.header(COOKIE, cookie);
        }
        if let Some((name, value)) = extra_header {
            request = request.header(name, value);
        }

        let response = request.send().await?;

        // The leader acknowledges writes and applies them asynchronously
        if response.status() != StatusCode::ACCEPTED {
            return Err(LeaderError::UnexpectedStatus {
                method,
                url: self.projects_url.clone(),
                status: response.status(),
            });
        }

        tracing::debug!(
            %method,
            project = %body.attributes.metadata.name,
            "Projects leader accepted write"
        );
        Ok(())
    }

    /// Returns `None` when the leader answers 404.
    async fn read(&self, url: Url) -> Result<Option<Vec<ProjectConfig>>, LeaderError> {
        let mut request = self
            .client
            .get(url.clone())
            .header(PROJECTS_ROLE_HEADER, PROJECTS_ROLE);

        if let Some(cookie) = &self.session_cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let bytes = response.bytes().await?;
                let envelope: Envelope = serde_json::from_slice(&bytes)?;
                Ok(Some(
                    envelope
                        .into_projects()
                        .into_iter()
                        .map(|project| project.into_config())
                        .collect(),
                ))
            }
            status => Err(LeaderError::UnexpectedStatus {
                method: Method::GET,
                url: url.to_string(),
                status,
            }),
        }
    }
}

#[async_trait]
impl LeaderClient for IguazioClient {
    fn kind(&self) -> LeaderKind {
        LeaderKind::Iguazio
    }

    async fn get(&self, options: &GetProjectsOptions) -> Result<Vec<ProjectConfig>, LeaderError> {
        let mut url = Url::parse(&self.projects_url)?;

        if let Some(name) = &options.name
            && let Ok(mut segments) = url.path_segments_mut()
        {
            segments.push(name);
        }

        let projects = self.read(url).await?.unwrap_or_default();

        Ok(projects
            .into_iter()
            .filter(|project| options.matches(project))
            .collect())
    }

    async fn create(&self, options: &CreateProjectOptions) -> Result<(), LeaderError> {
        self.write(
            Method::POST,
            &ProjectWriteRequest::from_config(&options.project),
            options.session_cookie.as_deref(),
            None,
        )
        .await
    }

    async fn update(&self, options: &UpdateProjectOptions) -> Result<(), LeaderError> {
        self.write(
            Method::PUT,
            &ProjectWriteRequest::from_config(&options.project),
            options.session_cookie.as_deref(),
            None,
        )
        .await
    }

    async fn delete(&self, options: &DeleteProjectOptions) -> Result<(), LeaderError> {
        self.write(
            Method::DELETE,
            &ProjectWriteRequest::for_delete(&options.key),
            options.session_cookie.as_deref(),
            Some((DELETE_STRATEGY_HEADER, options.strategy.as_str())),
        )
        .await
    }

    async fn get_updated_after(
        &self,
        cursor: Option<DateTime<Utc>>,
    ) -> Result<Vec<ProjectConfig>, LeaderError> {
        let mut url = Url::parse(&self.projects_url)?;

        if let Some(cursor) = cursor {
            url.query_pairs_mut().append_pair(
                "filter[updated_at]",
                &format!("[$gte]{}", format_timestamp(&cursor)),
            );
        }

        Ok(self.read(url).await?.unwrap_or_default())
    }
}
