//! Wire format of the projects leader API and its mapping to [`ProjectConfig`].
//!
//! The leader represents labels and annotations as ordered lists of
//! `{name, value}` pairs and timestamps as fixed-layout strings. Reads are
//! wrapped in a `{"data": ...}` envelope holding either a single project or a list.

use crate::types::{ProjectConfig, ProjectKey, ProjectMeta, ProjectSpec, ProjectStatus};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Layout of every timestamp the leader emits. Always UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f+00:00";

pub const PROJECT_TYPE: &str = "project";

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map(|naive| naive.and_utc())
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

// The leader sends explicit nulls for empty collections and strings.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: String,
}

fn to_labels(map: &BTreeMap<String, String>) -> Vec<Label> {
    map.iter()
        .map(|(name, value)| Label {
            name: name.clone(),
            value: value.clone(),
        })
        .collect()
}

fn from_labels(labels: Vec<Label>) -> BTreeMap<String, String> {
    labels
        .into_iter()
        .map(|label| (label.name, label.value))
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub data: EnvelopeData,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EnvelopeData {
    Many(Vec<LeaderProject>),
    One(Box<LeaderProject>),
}

impl Envelope {
    /// Entries whose `type` is not `project` are dropped.
    pub fn into_projects(self) -> Vec<LeaderProject> {
        let projects = match self.data {
            EnvelopeData::Many(projects) => projects,
            EnvelopeData::One(project) => vec![*project],
        };

        projects
            .into_iter()
            .filter(|project| {
                let is_project = project.kind == PROJECT_TYPE;
                if !is_project {
                    tracing::debug!(
                        kind = %project.kind,
                        name = %project.attributes.name,
                        "Skipping leader entry that is not a project"
                    );
                }
                is_project
            })
            .collect()
    }
}

fn project_type() -> String {
    PROJECT_TYPE.into()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderProject {
    #[serde(rename = "type", default = "project_type")]
    pub kind: String,
    pub attributes: LeaderProjectAttributes,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderProjectAttributes {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub namespace: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: Vec<Label>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub annotations: Vec<Label>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_username: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub admin_status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub operational_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl LeaderProject {
    pub fn from_config(project: &ProjectConfig) -> Self {
        LeaderProject {
            kind: project_type(),
            attributes: LeaderProjectAttributes {
                name: project.meta.name.clone(),
                namespace: project.meta.namespace.clone(),
                labels: to_labels(&project.meta.labels),
                annotations: to_labels(&project.meta.annotations),
                description: project.spec.description.clone(),
                owner_username: project.spec.owner.clone(),
                admin_status: project.status.admin_status.clone(),
                operational_status: project.status.operational_status.clone(),
                updated_at: project.status.updated_at.as_ref().map(format_timestamp),
            },
        }
    }

    /// Converts to the internal representation. An unparsable `updated_at`
    /// becomes `None`: the project is still synchronized, but never counts as
    /// the most recent one when the cursor is advanced.
    pub fn into_config(self) -> ProjectConfig {
        let attributes = self.attributes;

        let updated_at = attributes.updated_at.as_deref().and_then(|raw| {
            parse_timestamp(raw)
                .inspect_err(|e| {
                    tracing::warn!(
                        project = %attributes.name,
                        updated_at = raw,
                        error = %e,
                        "Failed to parse leader project timestamp"
                    );
                })
                .ok()
        });

        ProjectConfig {
            meta: ProjectMeta {
                name: attributes.name,
                namespace: attributes.namespace,
                labels: from_labels(attributes.labels),
                annotations: from_labels(attributes.annotations),
            },
            spec: ProjectSpec {
                description: attributes.description,
                owner: attributes.owner_username,
            },
            status: ProjectStatus {
                admin_status: attributes.admin_status,
                operational_status: attributes.operational_status,
                updated_at,
            },
        }
    }
}

/// Body of `POST`/`PUT`/`DELETE {leader}/projects`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProjectWriteRequest {
    pub attributes: WriteAttributes,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WriteAttributes {
    pub metadata: WriteMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<WriteSpec>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WriteMetadata {
    pub name: String,
    pub namespace: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Label>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WriteSpec {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl ProjectWriteRequest {
    pub fn from_config(project: &ProjectConfig) -> Self {
        ProjectWriteRequest {
            attributes: WriteAttributes {
                metadata: WriteMetadata {
                    name: project.meta.name.clone(),
                    namespace: project.meta.namespace.clone(),
                    labels: to_labels(&project.meta.labels),
                    annotations: to_labels(&project.meta.annotations),
                },
                spec: Some(WriteSpec {
                    description: project.spec.description.clone(),
                    owner: project.spec.owner.clone(),
                }),
            },
        }
    }

    pub fn for_delete(key: &ProjectKey) -> Self {
        ProjectWriteRequest {
            attributes: WriteAttributes {
                metadata: WriteMetadata {
                    name: key.name.clone(),
                    namespace: key.namespace.clone(),
                    labels: Vec::new(),
                    annotations: Vec::new(),
                },
                spec: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn leader_json() -> serde_json::Value {
        json!({
            "type": "project",
            "attributes": {
                "name": "p1",
                "namespace": "default-tenant",
                "labels": [{"name": "team", "value": "ml"}, {"name": "env", "value": "prod"}],
                "annotations": [{"name": "note", "value": "a=b, c"}],
                "description": "fraud detection",
                "owner_username": "admin",
                "admin_status": "online",
                "operational_status": "online",
                "updated_at": "2021-03-04T10:11:12.123456+00:00"
            }
        })
    }

    #[test]
    fn test_timestamp_layout() {
        let parsed = parse_timestamp("2021-03-04T10:11:12.123456+00:00").unwrap();
        let expected = Utc
            .with_ymd_and_hms(2021, 3, 4, 10, 11, 12)
            .unwrap()
            .checked_add_signed(chrono::Duration::microseconds(123456))
            .unwrap();
        assert_eq!(parsed, expected);
        assert_eq!(format_timestamp(&parsed), "2021-03-04T10:11:12.123456+00:00");

        assert!(parse_timestamp("2021-03-04 10:11:12").is_err());
    }

    #[test]
    fn test_round_trip_preserves_config() {
        let project: LeaderProject = serde_json::from_value(leader_json()).unwrap();
        let config = project.clone().into_config();

        assert_eq!(config.meta.name, "p1");
        assert_eq!(config.meta.namespace, "default-tenant");
        assert_eq!(config.meta.labels.get("team").map(String::as_str), Some("ml"));
        assert_eq!(config.meta.labels.get("env").map(String::as_str), Some("prod"));
        assert_eq!(
            config.meta.annotations.get("note").map(String::as_str),
            Some("a=b, c")
        );
        assert_eq!(config.spec.description, "fraud detection");
        assert_eq!(config.spec.owner.as_deref(), Some("admin"));
        assert!(config.is_online());

        // Re-encoding keeps the same content; label order may differ
        let encoded = LeaderProject::from_config(&config);
        let mut original_labels = project.attributes.labels.clone();
        original_labels.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(encoded.attributes.labels, original_labels);
        assert_eq!(encoded.attributes.annotations, project.attributes.annotations);
        assert_eq!(encoded.attributes.name, project.attributes.name);
        assert_eq!(encoded.attributes.namespace, project.attributes.namespace);
        assert_eq!(encoded.attributes.description, project.attributes.description);
        assert_eq!(encoded.attributes.updated_at, project.attributes.updated_at);
        assert_eq!(encoded.into_config(), config);
    }

    #[test]
    fn test_nulls_and_malformed_timestamp() {
        let project: LeaderProject = serde_json::from_value(json!({
            "type": "project",
            "attributes": {
                "name": "p2",
                "namespace": null,
                "labels": null,
                "annotations": null,
                "description": null,
                "admin_status": "online",
                "operational_status": "creating",
                "updated_at": "yesterday"
            }
        }))
        .unwrap();

        let config = project.into_config();
        assert_eq!(config.meta.namespace, "");
        assert!(config.meta.labels.is_empty());
        assert!(config.meta.annotations.is_empty());
        assert_eq!(config.spec.description, "");
        // Malformed timestamps are dropped rather than treated as newest
        assert_eq!(config.status.updated_at, None);
        assert!(!config.is_online());
    }

    #[test]
    fn test_envelope_single_and_list() {
        let single: Envelope = serde_json::from_value(json!({"data": leader_json()})).unwrap();
        assert_eq!(single.into_projects().len(), 1);

        let list: Envelope =
            serde_json::from_value(json!({"data": [leader_json(), leader_json()]})).unwrap();
        assert_eq!(list.into_projects().len(), 2);

        let empty: Envelope = serde_json::from_value(json!({"data": []})).unwrap();
        assert!(empty.into_projects().is_empty());
    }

    #[test]
    fn test_envelope_skips_other_types() {
        let mut user = leader_json();
        user["type"] = json!("user");
        let mut untyped = leader_json();
        untyped.as_object_mut().unwrap().remove("type");

        let mixed: Envelope =
            serde_json::from_value(json!({"data": [user.clone(), leader_json(), untyped]}))
                .unwrap();
        let projects = mixed.into_projects();
        assert_eq!(projects.len(), 2);
        assert!(projects.iter().all(|p| p.kind == PROJECT_TYPE));

        let single: Envelope = serde_json::from_value(json!({"data": user})).unwrap();
        assert!(single.into_projects().is_empty());
    }

    #[test]
    fn test_write_request_body() {
        let mut project = ProjectConfig::new("default-tenant", "p1");
        project.meta.labels.insert("team".into(), "ml".into());
        project.spec.description = "desc".into();

        let body = serde_json::to_value(ProjectWriteRequest::from_config(&project)).unwrap();
        assert_eq!(
            body,
            json!({
                "attributes": {
                    "metadata": {
                        "name": "p1",
                        "namespace": "default-tenant",
                        "labels": [{"name": "team", "value": "ml"}]
                    },
                    "spec": {"description": "desc"}
                }
            })
        );

        let body =
            serde_json::to_value(ProjectWriteRequest::for_delete(&project.key())).unwrap();
        assert_eq!(
            body,
            json!({"attributes": {"metadata": {"name": "p1", "namespace": "default-tenant"}}})
        );
    }
}
