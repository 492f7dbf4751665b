//! Datastore seam for the sync pipeline.
//!
//! Jobs never open their own connections: every orchestrator and reconciler
//! receives an `Arc<dyn SyncStore>`. `PgSyncStore` is the production store;
//! `MemoryStore` backs tests and dry runs.

pub mod health;
pub mod memory;
pub mod pool;
pub mod postgres;

pub use health::{check_pool_health, wait_for_pool};
pub use memory::MemoryStore;
pub use pool::{create_pool, DbPoolConfig};
pub use postgres::PgSyncStore;

use crate::error::StoreResult;
use crate::models::{EntityKind, Game, Player, PlayerNews, Provider, StatLine, Team};
use async_trait::async_trait;

/// Whether an upsert inserted a new row or overwrote an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertKind {
    Created,
    Updated,
}

/// Create/read/update-by-key access to the local schema.
///
/// Upserts overwrite the whole row; merging with the stored row is the
/// reconciler's job. Referential constraints (player -> team, game -> teams,
/// stat -> owner, news -> player/team) are enforced by the store and surface
/// as `StoreError::Constraint`.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Existence by canonical id. Supported for teams, players, games and news.
    async fn exists(&self, kind: EntityKind, id: &str) -> StoreResult<bool>;

    async fn get_team(&self, id: &str) -> StoreResult<Option<Team>>;
    async fn upsert_team(&self, team: &Team) -> StoreResult<UpsertKind>;
    async fn list_teams(&self) -> StoreResult<Vec<Team>>;

    async fn get_player(&self, id: &str) -> StoreResult<Option<Player>>;
    async fn upsert_player(&self, player: &Player) -> StoreResult<UpsertKind>;
    async fn list_players(&self) -> StoreResult<Vec<Player>>;

    async fn get_game(&self, id: &str) -> StoreResult<Option<Game>>;
    async fn upsert_game(&self, game: &Game) -> StoreResult<UpsertKind>;
    async fn list_games(&self) -> StoreResult<Vec<Game>>;
    /// Returns whether a row was deleted.
    async fn delete_game(&self, id: &str) -> StoreResult<bool>;

    /// Keyed by (entity, season, season type, category, stat name).
    async fn upsert_stat(&self, stat: &StatLine) -> StoreResult<UpsertKind>;

    async fn upsert_news(&self, news: &PlayerNews) -> StoreResult<UpsertKind>;

    /// Canonical id previously recorded for a provider's identifier.
    async fn lookup_external_id(
        &self,
        provider: Provider,
        kind: EntityKind,
        external_id: &str,
    ) -> StoreResult<Option<String>>;

    async fn save_external_id(
        &self,
        provider: Provider,
        kind: EntityKind,
        external_id: &str,
        canonical_id: &str,
    ) -> StoreResult<()>;

    /// Non-blocking. `false` means another run of `kind` holds the lock.
    async fn try_acquire_run_lock(&self, kind: EntityKind) -> StoreResult<bool>;
    async fn release_run_lock(&self, kind: EntityKind) -> StoreResult<()>;

    /// Row count for an entity table.
    async fn count(&self, kind: EntityKind) -> StoreResult<u64>;
}
