use crate::duration::DurationParseError;
use crate::types::{LeaderKind, ProjectKey};
use http::StatusCode;

pub type Result<T, E = ProjectsError> = std::result::Result<T, E>;

/// Invalid projects leader configuration. Always fatal at wiring time.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid synchronization interval {value:?}: {source}")]
    InvalidInterval {
        value: String,
        #[source]
        source: DurationParseError,
    },

    #[error("projects leader of kind {0} requires an address")]
    MissingAddress(LeaderKind),

    #[error("max_concurrent_applies must be greater than 0")]
    InvalidConcurrency,

    #[error("max_apply_attempts must be greater than 0")]
    InvalidApplyAttempts,

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Failures talking to the projects leader.
#[derive(thiserror::Error, Debug)]
pub enum LeaderError {
    #[error("request to projects leader failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("projects leader responded to {method} {url} with unexpected status {status}")]
    UnexpectedStatus {
        method: http::Method,
        url: String,
        status: StatusCode,
    },

    #[error("invalid projects leader URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid response from projects leader: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{operation} is not implemented by the {kind} projects leader")]
    NotImplemented {
        kind: LeaderKind,
        operation: &'static str,
    },

    #[error("injected failure: {0}")]
    Injected(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ProjectsError {
    /// Not a failure: the mutation was handed to the projects leader and will
    /// be materialized locally by the synchronizer later on.
    #[error("project mutation accepted by the projects leader, pending synchronization")]
    Accepted,

    #[error("project {0} not found")]
    NotFound(ProjectKey),

    #[error("project {0} already exists")]
    AlreadyExists(ProjectKey),

    #[error("failed to {operation} project via projects leader: {source}")]
    Leader {
        operation: &'static str,
        #[source]
        source: LeaderError,
    },

    #[error("internal project store failed: {0}")]
    Store(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl ProjectsError {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ProjectsError::Accepted)
    }

    /// Status the HTTP layer should answer with for this outcome.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProjectsError::Accepted => StatusCode::ACCEPTED,
            ProjectsError::NotFound(_) => StatusCode::NOT_FOUND,
            ProjectsError::AlreadyExists(_) => StatusCode::CONFLICT,
            ProjectsError::Leader { .. } => StatusCode::BAD_GATEWAY,
            ProjectsError::Store(_) | ProjectsError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Reasons a whole synchronization cycle is skipped.
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("failed to fetch projects from leader: {0}")]
    Leader(#[from] LeaderError),

    #[error("failed to list internal projects: {0}")]
    Store(#[from] ProjectsError),
}
