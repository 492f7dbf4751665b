//! Drives one `EntitySync` job end to end.

use super::{
    EntitySync, PhaseTracker, Resolution, RunContext, RunPhase, SyncReport, SyncScope,
};
use crate::cancel::CancelToken;
use crate::db::SyncStore;
use crate::error::SyncError;
use crate::identity::CanonicalIdResolver;
use crate::models::LocalRecord;
use crate::reconcile::{ReconcileOutcome, Reconciler};
use crate::retry::RetryPolicy;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

pub struct SyncOrchestrator {
    store: Arc<dyn SyncStore>,
    reconciler: Reconciler,
    cancel: CancelToken,
}

impl SyncOrchestrator {
    /// `write_retry` applies to transient datastore errors.
    pub fn new(store: Arc<dyn SyncStore>, write_retry: RetryPolicy, cancel: CancelToken) -> Self {
        Self {
            reconciler: Reconciler::new(store.clone(), write_retry),
            store,
            cancel,
        }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Run `job` once over `scope`.
    ///
    /// Same-entity runs are serialised by the store's run lock; a second one
    /// fails with `SyncError::AlreadyRunning`. The lock is released however
    /// the run ends.
    pub async fn run(&self, job: &dyn EntitySync, scope: &SyncScope) -> Result<SyncReport, SyncError> {
        let kind = job.kind();
        if !self.store.try_acquire_run_lock(kind).await? {
            return Err(SyncError::AlreadyRunning(kind));
        }

        let result = self.run_locked(job, scope).await;

        if let Err(e) = self.store.release_run_lock(kind).await {
            warn!("Failed to release {} run lock: {}", kind, e);
        }
        result
    }

    async fn run_locked(&self, job: &dyn EntitySync, scope: &SyncScope) -> Result<SyncReport, SyncError> {
        let kind = job.kind();
        let mut phase = PhaseTracker::new(kind);
        let mut report = SyncReport::new(job.name(), kind, job.provider());
        let ctx = RunContext {
            scope: scope.clone(),
            cancel: self.cancel.clone(),
            store: self.store.clone(),
            resolver: CanonicalIdResolver::new(self.store.clone()),
        };

        info!(
            "Starting {} sync from {} (season {}, {:?})",
            job.name(),
            job.provider(),
            scope.season,
            scope.season_type
        );

        phase.advance(RunPhase::Fetching);
        let sources = if self.cancel.is_cancelled() {
            report.cancelled = true;
            Vec::new()
        } else {
            job.fetch(&ctx).await?
        };
        info!("{}: {} source records", job.name(), sources.len());

        phase.advance(RunPhase::Transforming);
        let synced_at = Utc::now();
        let mut pending: Vec<LocalRecord> = Vec::new();
        for source in sources {
            let raw = match source.payload {
                Ok(raw) => raw,
                Err(e) => {
                    report.record_failure(source.external_id, format!("fetch failed: {}", e));
                    continue;
                }
            };
            match job.transform(scope, &source.external_id, &raw, synced_at) {
                Ok(records) => pending.extend(records),
                Err(e) => report.record_failure(source.external_id, e.to_string()),
            }
        }

        phase.advance(RunPhase::Reconciling);
        for record in pending {
            if self.cancel.is_cancelled() {
                info!("{} sync cancelled, stopping before {}", job.name(), record.key());
                report.cancelled = true;
                break;
            }

            let external_id = record.key();
            let outcome = match job.resolve(&ctx, record).await {
                Ok(Resolution::Ready(record)) => self.reconciler.reconcile(record).await,
                Ok(Resolution::Unresolved { kind, external_id }) => {
                    ReconcileOutcome::SkippedMissingDependency {
                        kind,
                        id: format!("{} id {}", job.provider(), external_id),
                    }
                }
                Ok(Resolution::OutOfScope) => continue,
                Err(e) => ReconcileOutcome::Failed(format!("canonical id resolution failed: {}", e)),
            };
            report.record(external_id, outcome);
        }

        phase.advance(RunPhase::Aggregating);
        // A listing cut short by cancellation still counts as a cancelled run
        report.cancelled |= self.cancel.is_cancelled();
        report.finished_at = Some(Utc::now());
        info!("{}", report.summary_line());

        phase.advance(RunPhase::Done);
        report.phase = phase.phase();
        Ok(report)
    }
}
