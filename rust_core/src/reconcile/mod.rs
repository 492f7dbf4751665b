//! Upsert reconciler.
//!
//! Given one transformed record: verify its references exist, merge it with
//! the stored row by provider precedence, and upsert by its stable key.
//! Every outcome is per record; nothing here aborts a batch.

pub mod precedence;

use crate::db::{SyncStore, UpsertKind};
use crate::error::{StoreError, StoreResult};
use crate::models::{EntityKind, LocalRecord};
use crate::retry::{execute_with_retry, RetryPolicy};
use precedence::{merge_game, merge_player, merge_team};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Synced(UpsertKind),
    /// Write or constraint failure; the message is operator-facing
    Failed(String),
    /// A referenced row does not exist; nothing was written
    SkippedMissingDependency { kind: EntityKind, id: String },
}

pub struct Reconciler {
    store: Arc<dyn SyncStore>,
    retry: RetryPolicy,
}

impl Reconciler {
    pub fn new(store: Arc<dyn SyncStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub async fn reconcile(&self, record: LocalRecord) -> ReconcileOutcome {
        let kind = record.kind();
        let key = record.key();

        match self.missing_dependency(&record).await {
            Ok(Some((dep_kind, dep_id))) => {
                debug!("{} {} references missing {} {}", kind, key, dep_kind, dep_id);
                return ReconcileOutcome::SkippedMissingDependency {
                    kind: dep_kind,
                    id: dep_id,
                };
            }
            Ok(None) => {}
            Err(e) => return ReconcileOutcome::Failed(format!("dependency check failed: {}", e)),
        }

        match self.write(record).await {
            Ok(upsert) => ReconcileOutcome::Synced(upsert),
            Err(e) => ReconcileOutcome::Failed(e.to_string()),
        }
    }

    /// First referenced row that does not exist, if any.
    async fn missing_dependency(
        &self,
        record: &LocalRecord,
    ) -> StoreResult<Option<(EntityKind, String)>> {
        let mut deps: Vec<(EntityKind, &str)> = Vec::new();
        match record {
            LocalRecord::Team(_) => {}
            LocalRecord::Player(p) => {
                if let Some(team_id) = &p.team_id {
                    deps.push((EntityKind::Team, team_id));
                }
            }
            LocalRecord::Game(g) => {
                deps.push((EntityKind::Team, &g.home_team_id));
                deps.push((EntityKind::Team, &g.away_team_id));
            }
            LocalRecord::Stat(s) => deps.push((s.owner.parent_kind(), &s.entity_id)),
            LocalRecord::News(n) => {
                if let Some(player_id) = &n.player_id {
                    deps.push((EntityKind::Player, player_id));
                }
                if let Some(team_id) = &n.team_id {
                    deps.push((EntityKind::Team, team_id));
                }
            }
        }

        for (kind, id) in deps {
            let present = self
                .with_retry("dependency check", || self.store.exists(kind, id))
                .await?;
            if !present {
                return Ok(Some((kind, id.to_string())));
            }
        }
        Ok(None)
    }

    async fn write(&self, record: LocalRecord) -> StoreResult<UpsertKind> {
        match record {
            LocalRecord::Team(team) => {
                let existing = self.with_retry("load team", || self.store.get_team(&team.id)).await?;
                let merged = merge_team(existing.as_ref(), team);
                self.with_retry("upsert team", || self.store.upsert_team(&merged)).await
            }
            LocalRecord::Player(player) => {
                let existing = self
                    .with_retry("load player", || self.store.get_player(&player.id))
                    .await?;
                let merged = merge_player(existing.as_ref(), player);
                self.with_retry("upsert player", || self.store.upsert_player(&merged)).await
            }
            LocalRecord::Game(game) => {
                let existing = self.with_retry("load game", || self.store.get_game(&game.id)).await?;
                let merged = merge_game(existing.as_ref(), game);
                self.with_retry("upsert game", || self.store.upsert_game(&merged)).await
            }
            LocalRecord::Stat(stat) => {
                self.with_retry("upsert stat", || self.store.upsert_stat(&stat)).await
            }
            LocalRecord::News(news) => {
                self.with_retry("upsert news", || self.store.upsert_news(&news)).await
            }
        }
    }

    async fn with_retry<T, F, Fut>(&self, label: &str, f: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        execute_with_retry(&self.retry, label, f, StoreError::is_transient).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{Player, PlayerNews, Provider, Team};
    use chrono::Utc;
    use std::time::Duration;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    fn team(id: &str) -> Team {
        Team {
            id: id.to_string(),
            abbreviation: None,
            display_name: Some("Milwaukee Bucks".to_string()),
            short_name: None,
            location: None,
            nickname: None,
            conference: None,
            division: None,
            primary_color: Some("00471B".to_string()),
            secondary_color: None,
            logo_url: None,
            logo_dark_url: None,
            is_active: true,
            source: Provider::EspnSite,
            last_synced_at: Utc::now(),
        }
    }

    fn player(id: &str, team_id: Option<&str>) -> Player {
        Player {
            id: id.to_string(),
            first_name: None,
            last_name: None,
            full_name: Some("Test Player".to_string()),
            position: None,
            jersey: None,
            team_id: team_id.map(String::from),
            height_inches: None,
            height_display: None,
            weight_lbs: None,
            weight_display: None,
            birth_date: None,
            contract: None,
            alternate_ids: None,
            is_active: true,
            source: Provider::EspnCore,
            last_synced_at: Utc::now(),
        }
    }

    fn reconciler(store: Arc<MemoryStore>) -> Reconciler {
        Reconciler::new(store, fast_retry())
    }

    #[tokio::test]
    async fn test_created_then_updated() {
        let store = Arc::new(MemoryStore::new());
        let r = reconciler(store.clone());
        assert_eq!(
            r.reconcile(LocalRecord::Team(team("15"))).await,
            ReconcileOutcome::Synced(UpsertKind::Created)
        );
        assert_eq!(
            r.reconcile(LocalRecord::Team(team("15"))).await,
            ReconcileOutcome::Synced(UpsertKind::Updated)
        );
    }

    #[tokio::test]
    async fn test_missing_team_skips_player() {
        let store = Arc::new(MemoryStore::new());
        let r = reconciler(store.clone());
        let outcome = r.reconcile(LocalRecord::Player(player("1", Some("99")))).await;
        assert_eq!(
            outcome,
            ReconcileOutcome::SkippedMissingDependency {
                kind: EntityKind::Team,
                id: "99".to_string()
            }
        );
        assert_eq!(store.count(EntityKind::Player).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_free_agent_has_no_dependency() {
        let store = Arc::new(MemoryStore::new());
        let r = reconciler(store.clone());
        let outcome = r.reconcile(LocalRecord::Player(player("1", None))).await;
        assert_eq!(outcome, ReconcileOutcome::Synced(UpsertKind::Created));
    }

    #[tokio::test]
    async fn test_news_without_tags_is_written() {
        let store = Arc::new(MemoryStore::new());
        let r = reconciler(store.clone());
        let news = PlayerNews {
            id: "7".to_string(),
            headline: Some("League notes".to_string()),
            description: None,
            link: None,
            published_at: None,
            player_id: None,
            team_id: None,
            source: Provider::EspnSite,
            last_synced_at: Utc::now(),
        };
        assert_eq!(
            r.reconcile(LocalRecord::News(news)).await,
            ReconcileOutcome::Synced(UpsertKind::Created)
        );
    }

    #[tokio::test]
    async fn test_transient_write_failures_are_retried() {
        let store = Arc::new(MemoryStore::new());
        store.inject_transient_failures(2);
        let r = reconciler(store.clone());
        assert_eq!(
            r.reconcile(LocalRecord::Team(team("15"))).await,
            ReconcileOutcome::Synced(UpsertKind::Created)
        );
    }

    #[tokio::test]
    async fn test_persistent_failure_is_reported() {
        let store = Arc::new(MemoryStore::new());
        store.inject_transient_failures(10);
        let r = reconciler(store.clone());
        assert!(matches!(
            r.reconcile(LocalRecord::Team(team("15"))).await,
            ReconcileOutcome::Failed(_)
        ));
    }
}
