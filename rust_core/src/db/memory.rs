//! In-process `SyncStore`.
//!
//! Enforces the same keys and referential constraints as the Postgres schema
//! so runs against it exercise the real reconciliation paths.

use super::{SyncStore, UpsertKind};
use crate::error::{StoreError, StoreResult};
use crate::models::{
    EntityKind, Game, Player, PlayerNews, Provider, StatKey, StatLine, StatOwner, Team,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Default)]
struct Tables {
    teams: BTreeMap<String, Team>,
    players: BTreeMap<String, Player>,
    games: BTreeMap<String, Game>,
    stats: BTreeMap<(StatOwner, StatKey), StatLine>,
    news: BTreeMap<String, PlayerNews>,
    external_ids: HashMap<(Provider, EntityKind, String), String>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    run_locks: Mutex<HashSet<EntityKind>>,
    /// Writes that fail with a transient error before succeeding
    pending_transient_failures: AtomicU32,
}

fn upsert_into<T>(map: &mut BTreeMap<String, T>, id: &str, row: T) -> UpsertKind {
    match map.insert(id.to_string(), row) {
        Some(_) => UpsertKind::Updated,
        None => UpsertKind::Created,
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` writes fail with a pool timeout.
    pub fn inject_transient_failures(&self, n: u32) {
        self.pending_transient_failures.store(n, Ordering::SeqCst);
    }

    pub fn stat(&self, owner: StatOwner, key: &StatKey) -> Option<StatLine> {
        self.tables.read().stats.get(&(owner, key.clone())).cloned()
    }

    pub fn news(&self, id: &str) -> Option<PlayerNews> {
        self.tables.read().news.get(id).cloned()
    }

    fn take_transient_failure(&self) -> StoreResult<()> {
        let took = self
            .pending_transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if took {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }

    fn require_team(tables: &Tables, id: &str, column: &str) -> StoreResult<()> {
        if tables.teams.contains_key(id) {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!(
                "{} references missing team {}",
                column, id
            )))
        }
    }

    fn require_player(tables: &Tables, id: &str, column: &str) -> StoreResult<()> {
        if tables.players.contains_key(id) {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!(
                "{} references missing player {}",
                column, id
            )))
        }
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn exists(&self, kind: EntityKind, id: &str) -> StoreResult<bool> {
        let tables = self.tables.read();
        match kind {
            EntityKind::Team => Ok(tables.teams.contains_key(id)),
            EntityKind::Player => Ok(tables.players.contains_key(id)),
            EntityKind::Game => Ok(tables.games.contains_key(id)),
            EntityKind::PlayerNews => Ok(tables.news.contains_key(id)),
            other => Err(StoreError::Unsupported(other)),
        }
    }

    async fn get_team(&self, id: &str) -> StoreResult<Option<Team>> {
        Ok(self.tables.read().teams.get(id).cloned())
    }

    async fn upsert_team(&self, team: &Team) -> StoreResult<UpsertKind> {
        self.take_transient_failure()?;
        let mut tables = self.tables.write();
        Ok(upsert_into(&mut tables.teams, &team.id, team.clone()))
    }

    async fn list_teams(&self) -> StoreResult<Vec<Team>> {
        Ok(self.tables.read().teams.values().cloned().collect())
    }

    async fn get_player(&self, id: &str) -> StoreResult<Option<Player>> {
        Ok(self.tables.read().players.get(id).cloned())
    }

    async fn upsert_player(&self, player: &Player) -> StoreResult<UpsertKind> {
        self.take_transient_failure()?;
        let mut tables = self.tables.write();
        if let Some(team_id) = &player.team_id {
            Self::require_team(&tables, team_id, "players.team_id")?;
        }
        Ok(upsert_into(&mut tables.players, &player.id, player.clone()))
    }

    async fn list_players(&self) -> StoreResult<Vec<Player>> {
        Ok(self.tables.read().players.values().cloned().collect())
    }

    async fn get_game(&self, id: &str) -> StoreResult<Option<Game>> {
        Ok(self.tables.read().games.get(id).cloned())
    }

    async fn upsert_game(&self, game: &Game) -> StoreResult<UpsertKind> {
        self.take_transient_failure()?;
        let mut tables = self.tables.write();
        Self::require_team(&tables, &game.home_team_id, "games.home_team_id")?;
        Self::require_team(&tables, &game.away_team_id, "games.away_team_id")?;
        Ok(upsert_into(&mut tables.games, &game.id, game.clone()))
    }

    async fn list_games(&self) -> StoreResult<Vec<Game>> {
        let mut games: Vec<Game> = self.tables.read().games.values().cloned().collect();
        games.sort_by(|a, b| match (a.scheduled_at, b.scheduled_at) {
            (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.id.cmp(&b.id)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.id.cmp(&b.id),
        });
        Ok(games)
    }

    async fn delete_game(&self, id: &str) -> StoreResult<bool> {
        self.take_transient_failure()?;
        Ok(self.tables.write().games.remove(id).is_some())
    }

    async fn upsert_stat(&self, stat: &StatLine) -> StoreResult<UpsertKind> {
        self.take_transient_failure()?;
        let mut tables = self.tables.write();
        match stat.owner {
            StatOwner::Player => Self::require_player(&tables, &stat.entity_id, "player_season_stats.player_id")?,
            StatOwner::Team => Self::require_team(&tables, &stat.entity_id, "team_statistics.team_id")?,
        }
        let previous = tables.stats.insert((stat.owner, stat.key()), stat.clone());
        Ok(if previous.is_some() {
            UpsertKind::Updated
        } else {
            UpsertKind::Created
        })
    }

    async fn upsert_news(&self, news: &PlayerNews) -> StoreResult<UpsertKind> {
        self.take_transient_failure()?;
        let mut tables = self.tables.write();
        if let Some(player_id) = &news.player_id {
            Self::require_player(&tables, player_id, "player_news.player_id")?;
        }
        if let Some(team_id) = &news.team_id {
            Self::require_team(&tables, team_id, "player_news.team_id")?;
        }
        Ok(upsert_into(&mut tables.news, &news.id, news.clone()))
    }

    async fn lookup_external_id(
        &self,
        provider: Provider,
        kind: EntityKind,
        external_id: &str,
    ) -> StoreResult<Option<String>> {
        Ok(self
            .tables
            .read()
            .external_ids
            .get(&(provider, kind, external_id.to_string()))
            .cloned())
    }

    async fn save_external_id(
        &self,
        provider: Provider,
        kind: EntityKind,
        external_id: &str,
        canonical_id: &str,
    ) -> StoreResult<()> {
        self.tables
            .write()
            .external_ids
            .insert((provider, kind, external_id.to_string()), canonical_id.to_string());
        Ok(())
    }

    async fn try_acquire_run_lock(&self, kind: EntityKind) -> StoreResult<bool> {
        Ok(self.run_locks.lock().insert(kind))
    }

    async fn release_run_lock(&self, kind: EntityKind) -> StoreResult<()> {
        self.run_locks.lock().remove(&kind);
        Ok(())
    }

    async fn count(&self, kind: EntityKind) -> StoreResult<u64> {
        let tables = self.tables.read();
        let n = match kind {
            EntityKind::Team => tables.teams.len(),
            EntityKind::Player => tables.players.len(),
            EntityKind::Game => tables.games.len(),
            EntityKind::PlayerNews => tables.news.len(),
            EntityKind::PlayerSeasonStat | EntityKind::TeamStatistic => {
                let owner = if kind == EntityKind::PlayerSeasonStat {
                    StatOwner::Player
                } else {
                    StatOwner::Team
                };
                tables.stats.keys().filter(|(o, _)| *o == owner).count()
            }
        };
        Ok(n as u64)
    }
}
