//! Metrics definitions for the projects subsystem.

use shared::metrics_defs::{MetricDef, MetricType};

pub const SYNC_DURATION: MetricDef = MetricDef {
    name: "projects.sync.duration",
    metric_type: MetricType::Histogram,
    description: "Time to complete a projects leader synchronization cycle in seconds",
};

pub const SYNC_FAILED: MetricDef = MetricDef {
    name: "projects.sync.failed",
    metric_type: MetricType::Counter,
    description: "Synchronization cycles skipped because a listing failed",
};

pub const SYNC_PROJECTS_CREATED: MetricDef = MetricDef {
    name: "projects.sync.created",
    metric_type: MetricType::Counter,
    description: "Leader projects created in the internal store",
};

pub const SYNC_PROJECTS_UPDATED: MetricDef = MetricDef {
    name: "projects.sync.updated",
    metric_type: MetricType::Counter,
    description: "Internal projects updated to match the leader",
};

pub const SYNC_PROJECTS_FAILED: MetricDef = MetricDef {
    name: "projects.sync.apply_failed",
    metric_type: MetricType::Counter,
    description: "Per-project creates or updates that failed during synchronization",
};

pub const SYNC_PROJECTS_ABANDONED: MetricDef = MetricDef {
    name: "projects.sync.abandoned",
    metric_type: MetricType::Counter,
    description: "Leader projects no longer retried after failing max_apply_attempts times",
};

pub const FORWARDED_REQUESTS: MetricDef = MetricDef {
    name: "projects.leader.forwarded",
    metric_type: MetricType::Counter,
    description: "Project mutations forwarded to the projects leader, tagged by operation and outcome",
};

pub const SYNC_CURSOR: MetricDef = MetricDef {
    name: "projects.sync.cursor",
    metric_type: MetricType::Gauge,
    description: "Unix timestamp of the newest leader update materialized so far",
};

pub const ALL_METRICS: &[MetricDef] = &[
    SYNC_DURATION,
    SYNC_CURSOR,
    SYNC_FAILED,
    SYNC_PROJECTS_CREATED,
    SYNC_PROJECTS_UPDATED,
    SYNC_PROJECTS_FAILED,
    SYNC_PROJECTS_ABANDONED,
    FORWARDED_REQUESTS,
];
