//! Legacy game id migration.
//!
//! Games stored under a legacy id are matched to the current-scheme game with
//! the same home and away teams on the same UTC day. A matched legacy row
//! hands its scores to the current row (only where the current row has
//! none), leaves a legacy -> current entry in the external id map, and is
//! deleted. Rows with no unique match are reported and left alone, so a
//! second run migrates nothing new.

use super::{same_matchup, IdScheme, IdSchemeRule};
use crate::cancel::CancelToken;
use crate::db::SyncStore;
use crate::error::{StoreError, StoreResult, SyncError};
use crate::models::{EntityKind, Game};
use crate::retry::{execute_with_retry, RetryPolicy};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct MigrationScope {
    /// Restrict to one season
    pub season: Option<i32>,
    /// Report what would happen without writing
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    pub migrated: u64,
    /// Rows already under the current scheme
    pub skipped: u64,
    /// Legacy ids with no unique current-scheme counterpart, with the reason
    pub unmappable: Vec<(String, String)>,
    /// Legacy ids whose migration failed, with the error
    pub errors: Vec<(String, String)>,
    pub dry_run: bool,
    pub cancelled: bool,
}

pub struct IdentityMigrator {
    store: Arc<dyn SyncStore>,
    rule: IdSchemeRule,
    retry: RetryPolicy,
}

impl IdentityMigrator {
    pub fn new(store: Arc<dyn SyncStore>, rule: IdSchemeRule, retry: RetryPolicy) -> Self {
        Self { store, rule, retry }
    }

    pub fn classify(&self, id: &str) -> IdScheme {
        self.rule.classify(id)
    }

    /// Holds the game run lock, so it never interleaves with a game sync.
    pub async fn migrate(
        &self,
        scope: &MigrationScope,
        cancel: &CancelToken,
    ) -> Result<MigrationReport, SyncError> {
        if !self.store.try_acquire_run_lock(EntityKind::Game).await? {
            return Err(SyncError::AlreadyRunning(EntityKind::Game));
        }

        let result = self.migrate_inner(scope, cancel).await;

        if let Err(e) = self.store.release_run_lock(EntityKind::Game).await {
            warn!("Failed to release game run lock after migration: {}", e);
        }
        result
    }

    async fn migrate_inner(
        &self,
        scope: &MigrationScope,
        cancel: &CancelToken,
    ) -> Result<MigrationReport, SyncError> {
        let games: Vec<Game> = self
            .store
            .list_games()
            .await?
            .into_iter()
            .filter(|g| scope.season.map(|s| g.season == s).unwrap_or(true))
            .collect();

        let (legacy, current): (Vec<Game>, Vec<Game>) = games
            .into_iter()
            .partition(|g| self.rule.classify(&g.id) == IdScheme::Legacy);

        let mut report = MigrationReport {
            skipped: current.len() as u64,
            dry_run: scope.dry_run,
            ..Default::default()
        };
        info!(
            "Identity migration: {} legacy game ids, {} current (dry_run={})",
            legacy.len(),
            current.len(),
            scope.dry_run
        );

        for old in &legacy {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let Some(when) = old.scheduled_at else {
                report
                    .unmappable
                    .push((old.id.clone(), "no scheduled date".to_string()));
                continue;
            };
            let matches: Vec<&Game> = current
                .iter()
                .filter(|g| same_matchup(g, &old.home_team_id, &old.away_team_id, when))
                .collect();

            let target = match matches.as_slice() {
                [target] => *target,
                [] => {
                    report
                        .unmappable
                        .push((old.id.clone(), "no current game with the same teams and date".to_string()));
                    continue;
                }
                many => {
                    report.unmappable.push((
                        old.id.clone(),
                        format!("{} current games with the same teams and date", many.len()),
                    ));
                    continue;
                }
            };

            if scope.dry_run {
                info!("[dry run] would migrate game {} -> {}", old.id, target.id);
                report.migrated += 1;
                continue;
            }

            match self.merge_into(old, target).await {
                Ok(()) => {
                    info!("Migrated game {} -> {}", old.id, target.id);
                    report.migrated += 1;
                }
                Err(e) => {
                    warn!("Failed to migrate game {}: {}", old.id, e);
                    report.errors.push((old.id.clone(), e.to_string()));
                }
            }
        }

        for (id, reason) in &report.unmappable {
            warn!("Unmappable legacy game {}: {}", id, reason);
        }
        Ok(report)
    }

    async fn merge_into(&self, old: &Game, target: &Game) -> StoreResult<()> {
        let mut merged = target.clone();
        let mut changed = false;
        if merged.home_score.is_none() && old.home_score.is_some() {
            merged.home_score = old.home_score;
            changed = true;
        }
        if merged.away_score.is_none() && old.away_score.is_some() {
            merged.away_score = old.away_score;
            changed = true;
        }
        if merged.venue.is_none() && old.venue.is_some() {
            merged.venue = old.venue.clone();
            changed = true;
        }

        if changed {
            self.with_retry("migrate game scores", || self.store.upsert_game(&merged))
                .await?;
        }
        self.with_retry("record legacy game id", || {
            self.store
                .save_external_id(old.source, EntityKind::Game, &old.id, &target.id)
        })
        .await?;
        self.with_retry("delete legacy game", || self.store.delete_game(&old.id))
            .await?;
        Ok(())
    }

    async fn with_retry<T, F, Fut>(&self, label: &str, f: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = StoreResult<T>>,
    {
        execute_with_retry(&self.retry, label, f, StoreError::is_transient).await
    }
}
