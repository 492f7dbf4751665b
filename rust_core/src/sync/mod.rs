//! Sync runs.
//!
//! One run drives one entity type from one provider through
//! `Idle -> Fetching -> Transforming -> Reconciling -> Aggregating -> Done`.
//! Per-record problems are counted and reported; only setup and enumeration
//! failures end a run early.

pub mod jobs;
pub mod orchestrator;

pub use orchestrator::SyncOrchestrator;

use crate::cancel::CancelToken;
use crate::db::{SyncStore, UpsertKind};
use crate::error::{FetchError, StoreResult, SyncError, TransformError};
use crate::identity::CanonicalIdResolver;
use crate::models::{EntityKind, LocalRecord, Provider, SeasonType};
use crate::reconcile::ReconcileOutcome;
use crate::transform::game::season_for;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_NEWS_LIMIT: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunPhase {
    Idle,
    Fetching,
    Transforming,
    Reconciling,
    Aggregating,
    Done,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Fetching => "fetching",
            RunPhase::Transforming => "transforming",
            RunPhase::Reconciling => "reconciling",
            RunPhase::Aggregating => "aggregating",
            RunPhase::Done => "done",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Forward-only phase state for one run.
#[derive(Debug)]
pub struct PhaseTracker {
    kind: EntityKind,
    phase: RunPhase,
}

impl PhaseTracker {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            phase: RunPhase::Idle,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Move to `next`. Refuses to go backwards or stay put.
    pub fn advance(&mut self, next: RunPhase) -> bool {
        if next <= self.phase {
            warn!(
                "{} run refused phase change {} -> {}",
                self.kind, self.phase, next
            );
            return false;
        }
        debug!("{} run: {} -> {}", self.kind, self.phase, next);
        self.phase = next;
        true
    }
}

/// What a run covers.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncScope {
    /// Season by its ending year (2025 is the 2024-25 season)
    pub season: i32,
    pub season_type: SeasonType,
    /// Canonical team id to restrict players, games and stats to
    pub team: Option<String>,
    /// Explicit scoreboard dates (`YYYYMMDD` or `YYYYMMDD-YYYYMMDD`)
    pub dates: Option<String>,
    pub news_limit: u32,
}

impl Default for SyncScope {
    fn default() -> Self {
        Self::for_season(season_for(Utc::now()))
    }
}

impl SyncScope {
    pub fn for_season(season: i32) -> Self {
        Self {
            season,
            season_type: SeasonType::Regular,
            team: None,
            dates: None,
            news_limit: DEFAULT_NEWS_LIMIT,
        }
    }

    /// Scoreboard date range: explicit dates, else October through June.
    pub fn scoreboard_dates(&self) -> String {
        self.dates
            .clone()
            .unwrap_or_else(|| format!("{}1001-{}0630", self.season - 1, self.season))
    }

    pub fn includes_team(&self, team_id: Option<&str>) -> bool {
        match &self.team {
            Some(wanted) => team_id == Some(wanted.as_str()),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub created: u64,
    pub updated: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl SyncStats {
    pub fn synced(&self) -> u64 {
        self.created + self.updated
    }

    pub fn total(&self) -> u64 {
        self.synced() + self.failed + self.skipped
    }

    pub fn merge(&mut self, other: &SyncStats) {
        self.created += other.created;
        self.updated += other.updated;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    Failed,
    Skipped,
}

/// A record that was not synced, with enough context to re-target a re-run.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordIssue {
    pub kind: IssueKind,
    pub entity: EntityKind,
    pub external_id: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub job: &'static str,
    pub entity: EntityKind,
    pub provider: Provider,
    pub stats: SyncStats,
    pub issues: Vec<RecordIssue>,
    pub cancelled: bool,
    pub phase: RunPhase,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncReport {
    pub fn new(job: &'static str, entity: EntityKind, provider: Provider) -> Self {
        Self {
            job,
            entity,
            provider,
            stats: SyncStats::default(),
            issues: Vec::new(),
            cancelled: false,
            phase: RunPhase::Idle,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record_failure(&mut self, external_id: impl Into<String>, message: impl Into<String>) {
        let issue = RecordIssue {
            kind: IssueKind::Failed,
            entity: self.entity,
            external_id: external_id.into(),
            message: message.into(),
        };
        warn!(
            "{} {} failed: {}",
            issue.entity, issue.external_id, issue.message
        );
        self.stats.failed += 1;
        self.issues.push(issue);
    }

    pub fn record_skip(&mut self, external_id: impl Into<String>, message: impl Into<String>) {
        let issue = RecordIssue {
            kind: IssueKind::Skipped,
            entity: self.entity,
            external_id: external_id.into(),
            message: message.into(),
        };
        debug!(
            "{} {} skipped: {}",
            issue.entity, issue.external_id, issue.message
        );
        self.stats.skipped += 1;
        self.issues.push(issue);
    }

    /// Count one reconciliation outcome.
    pub fn record(&mut self, external_id: String, outcome: ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Synced(UpsertKind::Created) => self.stats.created += 1,
            ReconcileOutcome::Synced(UpsertKind::Updated) => self.stats.updated += 1,
            ReconcileOutcome::Failed(message) => self.record_failure(external_id, message),
            ReconcileOutcome::SkippedMissingDependency { kind, id } => {
                self.record_skip(external_id, format!("missing {} {}", kind, id))
            }
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecordIssue> {
        self.issues.iter().filter(|i| i.kind == IssueKind::Failed)
    }

    pub fn skips(&self) -> impl Iterator<Item = &RecordIssue> {
        self.issues.iter().filter(|i| i.kind == IssueKind::Skipped)
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{} ({}): synced={} (created={}, updated={}) failed={} skipped={} total={}{}",
            self.job,
            self.provider,
            self.stats.synced(),
            self.stats.created,
            self.stats.updated,
            self.stats.failed,
            self.stats.skipped,
            self.stats.total(),
            if self.cancelled { " [cancelled]" } else { "" }
        )
    }
}

/// One enumerated source record, fetched or not.
#[derive(Debug)]
pub struct SourceRecord {
    /// Provider id or `$ref`, for diagnostics
    pub external_id: String,
    pub payload: Result<Value, FetchError>,
}

impl SourceRecord {
    /// Wrap an inline listing item, labelled by `id_key` when present.
    pub fn inline(index: usize, payload: Value, id_key: &str) -> Self {
        let external_id = crate::transform::str_field(&payload, id_key)
            .unwrap_or_else(|| format!("#{}", index));
        Self {
            external_id,
            payload: Ok(payload),
        }
    }
}

/// Outcome of mapping a record onto canonical ids.
#[derive(Debug)]
pub enum Resolution {
    Ready(LocalRecord),
    /// No canonical counterpart for a provider id
    Unresolved { kind: EntityKind, external_id: String },
    /// Outside the run's scope once ids are canonical; not counted
    OutOfScope,
}

/// Shared state for one run.
pub struct RunContext {
    pub scope: SyncScope,
    pub cancel: CancelToken,
    pub store: Arc<dyn SyncStore>,
    pub resolver: CanonicalIdResolver,
}

/// One entity type from one provider.
#[async_trait]
pub trait EntitySync: Send + Sync {
    fn name(&self) -> &'static str;
    fn kind(&self) -> EntityKind;
    fn provider(&self) -> Provider;

    /// Enumerate source records in provider order. An error here means the
    /// listing itself is unavailable and ends the run.
    async fn fetch(&self, ctx: &RunContext) -> Result<Vec<SourceRecord>, SyncError>;

    /// Pure payload mapping. One source record may yield several rows.
    fn transform(
        &self,
        scope: &SyncScope,
        external_id: &str,
        raw: &Value,
        synced_at: DateTime<Utc>,
    ) -> Result<Vec<LocalRecord>, TransformError>;

    /// Map provider ids onto canonical ids before anything is written.
    async fn resolve(&self, _ctx: &RunContext, record: LocalRecord) -> StoreResult<Resolution> {
        Ok(Resolution::Ready(record))
    }
}
