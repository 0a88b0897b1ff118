use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const STATUS_ONLINE: &str = "online";

/// Identity of a project, unique both in the internal store and at the leader.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectKey {
    pub namespace: String,
    pub name: String,
}

impl ProjectKey {
    pub fn new<N, S>(namespace: N, name: S) -> Self
    where
        N: Into<String>,
        S: Into<String>,
    {
        ProjectKey {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMeta {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSpec {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner: Option<String>,
}

/// Leader-authoritative status. Never part of config equality.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStatus {
    #[serde(default)]
    pub admin_status: String,
    #[serde(default)]
    pub operational_status: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub meta: ProjectMeta,
    #[serde(default)]
    pub spec: ProjectSpec,
    #[serde(default)]
    pub status: ProjectStatus,
}

impl ProjectConfig {
    pub fn new<N, S>(namespace: N, name: S) -> Self
    where
        N: Into<String>,
        S: Into<String>,
    {
        ProjectConfig {
            meta: ProjectMeta {
                name: name.into(),
                namespace: namespace.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn key(&self) -> ProjectKey {
        ProjectKey::new(&self.meta.namespace, &self.meta.name)
    }

    /// Only projects that are fully online at the leader may be materialized
    /// internally. Anything mid-provisioning or mid-deletion is excluded.
    pub fn is_online(&self) -> bool {
        self.status.admin_status == STATUS_ONLINE && self.status.operational_status == STATUS_ONLINE
    }

    /// Equality for synchronization purposes: meta and spec must match, status is ignored.
    pub fn is_config_equal(&self, other: &ProjectConfig) -> bool {
        self.meta == other.meta && self.spec == other.spec
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderKind {
    Iguazio,
    Mlrun,
    Mock,
}

impl LeaderKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            LeaderKind::Iguazio => "iguazio",
            LeaderKind::Mlrun => "mlrun",
            LeaderKind::Mock => "mock",
        }
    }
}

impl fmt::Display for LeaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown projects leader kind: {0:?}")]
pub struct UnknownLeaderKind(pub String);

impl FromStr for LeaderKind {
    type Err = UnknownLeaderKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iguazio" => Ok(LeaderKind::Iguazio),
            "mlrun" => Ok(LeaderKind::Mlrun),
            "mock" => Ok(LeaderKind::Mock),
            other => Err(UnknownLeaderKind(other.to_string())),
        }
    }
}

/// Which system originated a mutating request. The router's only dispatch input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RequestOrigin {
    Leader(LeaderKind),
    #[default]
    NotLeader,
}

impl RequestOrigin {
    /// Parses the origin tag carried by an inbound request. Anything that is
    /// not a known leader kind (including an empty or missing tag) is an
    /// end-user request.
    pub fn from_tag(tag: Option<&str>) -> Self {
        tag.and_then(|t| t.trim().parse::<LeaderKind>().ok())
            .map(RequestOrigin::Leader)
            .unwrap_or(RequestOrigin::NotLeader)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteProjectStrategy {
    /// Refuse to delete a project that still owns resources.
    #[default]
    Restricted,
    /// Delete the project along with everything it owns.
    Cascading,
}

impl DeleteProjectStrategy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DeleteProjectStrategy::Restricted => "restricted",
            DeleteProjectStrategy::Cascading => "cascading",
        }
    }
}

/// Filter for listing projects. Unset fields match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GetProjectsOptions {
    pub name: Option<String>,
    pub namespace: Option<String>,
}

impl GetProjectsOptions {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_key(key: &ProjectKey) -> Self {
        GetProjectsOptions {
            name: Some(key.name.clone()),
            namespace: Some(key.namespace.clone()),
        }
    }

    pub fn matches(&self, project: &ProjectConfig) -> bool {
        self.name.as_ref().is_none_or(|n| *n == project.meta.name)
            && self
                .namespace
                .as_ref()
                .is_none_or(|ns| *ns == project.meta.namespace)
    }
}

#[derive(Clone, Debug, Default)]
pub struct CreateProjectOptions {
    pub project: ProjectConfig,
    pub request_origin: RequestOrigin,
    pub session_cookie: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct UpdateProjectOptions {
    pub project: ProjectConfig,
    pub request_origin: RequestOrigin,
    pub session_cookie: Option<String>,
}

#[derive(Clone, Debug)]
pub struct DeleteProjectOptions {
    pub key: ProjectKey,
    pub strategy: DeleteProjectStrategy,
    pub request_origin: RequestOrigin,
    pub session_cookie: Option<String>,
}

impl DeleteProjectOptions {
    pub fn new(key: ProjectKey) -> Self {
        DeleteProjectOptions {
            key,
            strategy: DeleteProjectStrategy::default(),
            request_origin: RequestOrigin::default(),
            session_cookie: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn online(mut project: ProjectConfig) -> ProjectConfig {
        project.status.admin_status = STATUS_ONLINE.into();
        project.status.operational_status = STATUS_ONLINE.into();
        project
    }

    #[test]
    fn test_config_equality_ignores_status() {
        let mut a = ProjectConfig::new("default", "p1");
        a.spec.description = "desc".into();
        let mut b = a.clone();
        b.status.admin_status = "creating".into();
        b.status.updated_at = Some(Utc::now());
        assert!(a.is_config_equal(&b));

        b.meta.labels.insert("team".into(), "ml".into());
        assert!(!a.is_config_equal(&b));

        let mut c = a.clone();
        c.spec.description = "other".into();
        assert!(!a.is_config_equal(&c));
    }

    #[test]
    fn test_is_online() {
        let project = ProjectConfig::new("default", "p1");
        assert!(!project.is_online());
        assert!(online(project.clone()).is_online());

        let mut half = online(project);
        half.status.operational_status = "deleting".into();
        assert!(!half.is_online());
    }

    #[test]
    fn test_request_origin_from_tag() {
        assert_eq!(
            RequestOrigin::from_tag(Some("iguazio")),
            RequestOrigin::Leader(LeaderKind::Iguazio)
        );
        assert_eq!(
            RequestOrigin::from_tag(Some("mlrun")),
            RequestOrigin::Leader(LeaderKind::Mlrun)
        );
        assert_eq!(RequestOrigin::from_tag(Some("")), RequestOrigin::NotLeader);
        assert_eq!(RequestOrigin::from_tag(Some("ui")), RequestOrigin::NotLeader);
        assert_eq!(RequestOrigin::from_tag(None), RequestOrigin::NotLeader);
    }

    #[test]
    fn test_leader_kind_parse() {
        assert_eq!("mock".parse::<LeaderKind>(), Ok(LeaderKind::Mock));
        assert_eq!(
            "nuclio".parse::<LeaderKind>(),
            Err(UnknownLeaderKind("nuclio".into()))
        );
        assert!(serde_yaml::from_str::<LeaderKind>("unknown").is_err());
    }

    #[test]
    fn test_get_options_matching() {
        let project = ProjectConfig::new("default", "p1");
        assert!(GetProjectsOptions::all().matches(&project));
        assert!(GetProjectsOptions::by_key(&project.key()).matches(&project));
        assert!(!GetProjectsOptions::by_key(&ProjectKey::new("other", "p1")).matches(&project));
    }
}
