//! Periodically pulls projects from the leader and materializes them in the
//! internal store.
//!
//! Every cycle is driven by a [`SyncCursor`] that is owned by the timer loop
//! and threaded through [`Synchronizer::synchronize`]. Only projects updated
//! at or after the cursor timestamp are fetched. The timestamp always moves to
//! the newest update observed; projects whose store write failed are carried
//! separately and fetched again by key, up to `max_apply_attempts` times.
//! Projects the leader deleted are never removed locally.

use crate::config::ProjectsLeaderConfig;
use crate::errors::{ConfigError, ProjectsError, SyncError};
use crate::leader::LeaderClient;
use crate::metrics_defs::{
    SYNC_CURSOR, SYNC_DURATION, SYNC_FAILED, SYNC_PROJECTS_ABANDONED, SYNC_PROJECTS_CREATED,
    SYNC_PROJECTS_FAILED, SYNC_PROJECTS_UPDATED,
};
use crate::store::ProjectsClient;
use crate::types::{
    CreateProjectOptions, GetProjectsOptions, ProjectConfig, ProjectKey, RequestOrigin,
    UpdateProjectOptions,
};
use chrono::{DateTime, Utc};
use shared::{counter, gauge, histogram};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Where the next cycle starts.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncCursor {
    /// Newest leader `updated_at` observed so far.
    pub updated_at: Option<DateTime<Utc>>,
    /// Projects whose last apply failed, with the number of failed attempts.
    pub retries: BTreeMap<ProjectKey, u32>,
}

/// Result of one synchronization cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    /// Projects dropped from the retry set in this cycle
    pub abandoned: usize,
    /// Cursor to pass to the next cycle.
    pub cursor: SyncCursor,
}

/// What a cycle is going to write. The two sets never share a key.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct SyncPlan {
    pub to_create: Vec<ProjectConfig>,
    pub to_update: Vec<ProjectConfig>,
}

impl SyncPlan {
    fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SyncAction {
    Create,
    Update,
}

type ApplyResult = (SyncAction, Result<ProjectConfig, ProjectsError>);

#[derive(Default)]
struct ApplyReport {
    created: usize,
    updated: usize,
    failed: Vec<ProjectKey>,
}

pub struct Synchronizer {
    leader: Arc<dyn LeaderClient>,
    store: Arc<dyn ProjectsClient>,
    config: ProjectsLeaderConfig,
}

impl Synchronizer {
    pub fn new(
        leader: Arc<dyn LeaderClient>,
        store: Arc<dyn ProjectsClient>,
        config: &ProjectsLeaderConfig,
    ) -> Self {
        Synchronizer {
            leader,
            store,
            config: config.clone(),
        }
    }

    /// Spawns the timer loop. Returns `None` when the configured interval is
    /// zero, in which case nothing is ever synchronized.
    pub fn start(
        self: &Arc<Self>,
        cancel: CancellationToken,
    ) -> Result<Option<JoinHandle<()>>, ConfigError> {
        let Some(interval) = self.config.synchronization_interval()? else {
            tracing::info!(
                leader = %self.leader.kind(),
                "Projects synchronization disabled"
            );
            return Ok(None);
        };

        tracing::info!(
            leader = %self.leader.kind(),
            interval = ?interval,
            "Starting projects synchronization"
        );

        let synchronizer = self.clone();
        Ok(Some(tokio::spawn(async move {
            synchronizer.run(interval, cancel).await;
        })))
    }

    async fn run(&self, period: Duration, cancel: CancellationToken) {
        let mut cursor = SyncCursor::default();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Projects synchronization stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            match self.synchronize(&cursor).await {
                Ok(outcome) => {
                    if let Some(updated_at) = outcome.cursor.updated_at {
                        gauge!(SYNC_CURSOR).set(updated_at.timestamp() as f64);
                    }
                    cursor = outcome.cursor;
                }
                Err(error) => {
                    counter!(SYNC_FAILED).increment(1);
                    tracing::warn!(
                        %error,
                        cursor = ?cursor.updated_at,
                        "Projects synchronization cycle failed"
                    );
                }
            }
        }
    }

    /// Runs a single cycle starting from `cursor`. Listing failures skip the
    /// whole cycle and leave the cursor untouched. Individual write failures
    /// only put the project in the returned retry set.
    pub async fn synchronize(&self, cursor: &SyncCursor) -> Result<SyncOutcome, SyncError> {
        let started = Instant::now();
        let result = self.cycle(cursor).await;
        histogram!(SYNC_DURATION).record(started.elapsed().as_secs_f64());
        result
    }

    async fn cycle(&self, cursor: &SyncCursor) -> Result<SyncOutcome, SyncError> {
        let mut leader_projects = self.leader.get_updated_after(cursor.updated_at).await?;
        if leader_projects.is_empty() && cursor.retries.is_empty() {
            tracing::debug!(cursor = ?cursor.updated_at, "No updated projects at the leader");
            return Ok(SyncOutcome {
                cursor: cursor.clone(),
                ..Default::default()
            });
        }

        // Projects fetched for a retry are older than the cursor query and do
        // not move the cursor
        let updated_at = next_cursor(cursor.updated_at, &leader_projects);
        let mut failed = self
            .refetch_retries(&cursor.retries, &mut leader_projects)
            .await;

        let internal: HashMap<ProjectKey, ProjectConfig> = self
            .store
            .get(&GetProjectsOptions::all())
            .await?
            .into_iter()
            .map(|p| (p.key(), p))
            .collect();

        let plan = plan(&leader_projects, &internal);
        let report = if plan.is_empty() {
            ApplyReport::default()
        } else {
            self.apply(plan).await
        };
        failed.extend(report.failed);

        let failed_count = failed.len();
        let (retries, abandoned) =
            next_retries(&cursor.retries, failed, self.config.max_apply_attempts);

        let outcome = SyncOutcome {
            created: report.created,
            updated: report.updated,
            failed: failed_count,
            abandoned,
            cursor: SyncCursor {
                updated_at,
                retries,
            },
        };

        counter!(SYNC_PROJECTS_CREATED).increment(outcome.created as u64);
        counter!(SYNC_PROJECTS_UPDATED).increment(outcome.updated as u64);
        counter!(SYNC_PROJECTS_FAILED).increment(outcome.failed as u64);
        counter!(SYNC_PROJECTS_ABANDONED).increment(outcome.abandoned as u64);

        tracing::info!(
            pulled = leader_projects.len(),
            created = outcome.created,
            updated = outcome.updated,
            failed = outcome.failed,
            retrying = outcome.cursor.retries.len(),
            cursor = ?outcome.cursor.updated_at,
            "Synchronized projects from leader"
        );

        Ok(outcome)
    }

    /// Fetches, by key, the retry candidates the cursor query did not return
    /// and appends them to `pulled`. Returns the keys the leader could not be
    /// asked about; those count as another failed attempt.
    async fn refetch_retries(
        &self,
        retries: &BTreeMap<ProjectKey, u32>,
        pulled: &mut Vec<ProjectConfig>,
    ) -> Vec<ProjectKey> {
        let returned: HashSet<ProjectKey> = pulled.iter().map(ProjectConfig::key).collect();
        let mut failed = Vec::new();

        for key in retries.keys().filter(|key| !returned.contains(*key)) {
            match self.leader.get(&GetProjectsOptions::by_key(key)).await {
                Ok(projects) => pulled.extend(projects),
                Err(error) => {
                    tracing::warn!(project = %key, %error, "Failed to fetch leader project for retry");
                    failed.push(key.clone());
                }
            }
        }

        failed
    }

    /// Writes every planned project, never running more than
    /// `max_concurrent_applies` writes at once, and waits for all of them.
    async fn apply(&self, plan: SyncPlan) -> ApplyReport {
        let origin = RequestOrigin::Leader(self.leader.kind());
        let limit = self.config.max_concurrent_applies.max(1);

        let actions = plan
            .to_create
            .into_iter()
            .map(|p| (SyncAction::Create, p))
            .chain(plan.to_update.into_iter().map(|p| (SyncAction::Update, p)));

        let mut join_set: JoinSet<ApplyResult> = JoinSet::new();
        let mut task_projects = HashMap::new();
        let mut report = ApplyReport::default();

        for (action, project) in actions {
            if join_set.len() >= limit
                && let Some(join_result) = join_set.join_next_with_id().await
            {
                handle_apply_completion(join_result, &mut task_projects, &mut report);
            }

            let store = self.store.clone();
            let key = project.key();

            let abort_handle = join_set.spawn(async move {
                let result = match action {
                    SyncAction::Create => {
                        store
                            .create(&CreateProjectOptions {
                                project,
                                request_origin: origin,
                                session_cookie: None,
                            })
                            .await
                    }
                    SyncAction::Update => {
                        store
                            .update(&UpdateProjectOptions {
                                project,
                                request_origin: origin,
                                session_cookie: None,
                            })
                            .await
                    }
                };
                (action, result)
            });

            task_projects.insert(abort_handle.id(), key);
        }

        while let Some(join_result) = join_set.join_next_with_id().await {
            handle_apply_completion(join_result, &mut task_projects, &mut report);
        }

        report
    }
}

fn handle_apply_completion(
    join_result: Result<(tokio::task::Id, ApplyResult), JoinError>,
    task_projects: &mut HashMap<tokio::task::Id, ProjectKey>,
    report: &mut ApplyReport,
) {
    let (task_id, result) = match join_result {
        Ok((id, (action, result))) => (id, result.map(|_| action).map_err(|e| e.to_string())),
        Err(e) => (e.id(), Err(format!("apply task failed: {e}"))),
    };

    let Some(key) = task_projects.remove(&task_id) else {
        return;
    };

    match result {
        Ok(SyncAction::Create) => {
            report.created += 1;
            tracing::debug!(project = %key, "Created project from leader");
        }
        Ok(SyncAction::Update) => {
            report.updated += 1;
            tracing::debug!(project = %key, "Updated project from leader");
        }
        Err(error) => {
            tracing::warn!(project = %key, %error, "Failed to apply leader project");
            report.failed.push(key);
        }
    }
}

/// Decides which leader projects must be created or updated internally.
///
/// Projects that are not online at the leader are skipped. A project present
/// internally is only updated when its meta or spec differ. When the leader
/// reports the same key twice, the last occurrence wins.
pub(crate) fn plan(
    leader_projects: &[ProjectConfig],
    internal: &HashMap<ProjectKey, ProjectConfig>,
) -> SyncPlan {
    let latest: BTreeMap<ProjectKey, &ProjectConfig> =
        leader_projects.iter().map(|p| (p.key(), p)).collect();

    let mut plan = SyncPlan::default();
    for (key, project) in latest {
        if !project.is_online() {
            tracing::debug!(
                project = %key,
                admin_status = %project.status.admin_status,
                operational_status = %project.status.operational_status,
                "Skipping project that is not online at the leader"
            );
            continue;
        }

        match internal.get(&key) {
            None => plan.to_create.push(project.clone()),
            Some(existing) if !existing.is_config_equal(project) => {
                plan.to_update.push(project.clone())
            }
            Some(_) => {}
        }
    }

    plan
}

/// Newest `updated_at` observed, never moving backwards. Failed applies do
/// not hold it back.
fn next_cursor(
    previous: Option<DateTime<Utc>>,
    pulled: &[ProjectConfig],
) -> Option<DateTime<Utc>> {
    pulled
        .iter()
        .filter_map(|p| p.status.updated_at)
        .chain(previous)
        .max()
}

/// Retry set for the next cycle. Every key in `failed` gets one more attempt
/// counted; keys reaching `max_attempts` are dropped. Previous candidates
/// that did not fail again are dropped as well. Returns the set and the
/// number of keys given up on.
fn next_retries(
    previous: &BTreeMap<ProjectKey, u32>,
    failed: Vec<ProjectKey>,
    max_attempts: u32,
) -> (BTreeMap<ProjectKey, u32>, usize) {
    let mut retries = BTreeMap::new();
    let mut abandoned = 0;

    for key in failed {
        let attempts = previous.get(&key).copied().unwrap_or(0) + 1;
        if attempts >= max_attempts {
            tracing::error!(
                project = %key,
                attempts,
                "Giving up on leader project until the leader updates it again"
            );
            abandoned += 1;
        } else {
            retries.insert(key, attempts);
        }
    }

    (retries, abandoned)
}
