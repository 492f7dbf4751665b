//! PostgreSQL-backed `SyncStore`.
//!
//! Upserts are single `INSERT ... ON CONFLICT DO UPDATE` statements keyed on the
//! canonical id (or the stat composite key). `RETURNING (xmax = 0)` tells a
//! fresh insert from an update. Run locks are session advisory locks held on a
//! dedicated pooled connection for the duration of the run.

use super::{SyncStore, UpsertKind};
use crate::error::{StoreError, StoreResult};
use crate::models::{
    EntityKind, Game, GameStatus, Player, PlayerNews, Provider, SeasonType, StatLine, StatOwner,
    Team,
};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgRow;
use sqlx::{Executor, PgPool, Postgres, Row};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

pub struct PgSyncStore {
    pool: PgPool,
    lock_connections: Mutex<HashMap<EntityKind, PoolConnection<Postgres>>>,
}

impl PgSyncStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_connections: Mutex::new(HashMap::new()),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled reference schema. Every statement is `IF NOT EXISTS`.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        self.pool.execute(SCHEMA_SQL).await.map_err(classify)?;
        info!("Schema ensured");
        Ok(())
    }
}

/// Integrity violations (SQLSTATE class 23) are constraint failures, not
/// datastore outages.
fn classify(e: sqlx::Error) -> StoreError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.code().map(|c| c.starts_with("23")).unwrap_or(false) {
            return StoreError::Constraint(db_err.message().to_string());
        }
    }
    StoreError::Database(e)
}

fn upsert_kind(row: &PgRow) -> StoreResult<UpsertKind> {
    let inserted: bool = row.try_get("inserted")?;
    Ok(if inserted {
        UpsertKind::Created
    } else {
        UpsertKind::Updated
    })
}

fn table_for(kind: EntityKind) -> Option<&'static str> {
    match kind {
        EntityKind::Team => Some("teams"),
        EntityKind::Player => Some("players"),
        EntityKind::Game => Some("games"),
        EntityKind::PlayerNews => Some("player_news"),
        EntityKind::PlayerSeasonStat | EntityKind::TeamStatistic => None,
    }
}

/// (table, owner column) for a stat owner
fn stat_table(owner: StatOwner) -> (&'static str, &'static str) {
    match owner {
        StatOwner::Player => ("player_season_stats", "player_id"),
        StatOwner::Team => ("team_statistics", "team_id"),
    }
}

fn provider_from_row(row: &PgRow) -> StoreResult<Provider> {
    let source: String = row.try_get("source")?;
    Provider::parse(&source).ok_or_else(|| StoreError::InvalidRow(format!("unknown source {:?}", source)))
}

fn team_from_row(row: &PgRow) -> StoreResult<Team> {
    Ok(Team {
        id: row.try_get("id")?,
        abbreviation: row.try_get("abbreviation")?,
        display_name: row.try_get("display_name")?,
        short_name: row.try_get("short_name")?,
        location: row.try_get("location")?,
        nickname: row.try_get("nickname")?,
        conference: row.try_get("conference")?,
        division: row.try_get("division")?,
        primary_color: row.try_get("primary_color")?,
        secondary_color: row.try_get("secondary_color")?,
        logo_url: row.try_get("logo_url")?,
        logo_dark_url: row.try_get("logo_dark_url")?,
        is_active: row.try_get("is_active")?,
        source: provider_from_row(row)?,
        last_synced_at: row.try_get("last_synced_at")?,
    })
}

fn player_from_row(row: &PgRow) -> StoreResult<Player> {
    Ok(Player {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        full_name: row.try_get("full_name")?,
        position: row.try_get("position")?,
        jersey: row.try_get("jersey")?,
        team_id: row.try_get("team_id")?,
        height_inches: row.try_get("height_inches")?,
        height_display: row.try_get("height_display")?,
        weight_lbs: row.try_get("weight_lbs")?,
        weight_display: row.try_get("weight_display")?,
        birth_date: row.try_get("birth_date")?,
        contract: row.try_get("contract")?,
        alternate_ids: row.try_get("alternate_ids")?,
        is_active: row.try_get("is_active")?,
        source: provider_from_row(row)?,
        last_synced_at: row.try_get("last_synced_at")?,
    })
}

fn game_from_row(row: &PgRow) -> StoreResult<Game> {
    let season_type: i32 = row.try_get("season_type")?;
    let status: String = row.try_get("status")?;
    Ok(Game {
        id: row.try_get("id")?,
        season: row.try_get("season")?,
        season_type: SeasonType::from_espn_code(i64::from(season_type)).ok_or_else(|| {
            StoreError::InvalidRow(format!("unknown season_type {}", season_type))
        })?,
        scheduled_at: row.try_get("scheduled_at")?,
        status: GameStatus::parse(&status),
        home_team_id: row.try_get("home_team_id")?,
        away_team_id: row.try_get("away_team_id")?,
        home_score: row.try_get("home_score")?,
        away_score: row.try_get("away_score")?,
        venue: row.try_get("venue")?,
        source: provider_from_row(row)?,
        last_synced_at: row.try_get("last_synced_at")?,
    })
}

#[async_trait]
impl SyncStore for PgSyncStore {
    async fn exists(&self, kind: EntityKind, id: &str) -> StoreResult<bool> {
        let table = table_for(kind).ok_or(StoreError::Unsupported(kind))?;
        let row = sqlx::query(&format!("SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1) AS present", table))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;
        Ok(row.try_get("present")?)
    }

    async fn get_team(&self, id: &str) -> StoreResult<Option<Team>> {
        let row = sqlx::query("SELECT * FROM teams WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;
        row.as_ref().map(team_from_row).transpose()
    }

    async fn upsert_team(&self, team: &Team) -> StoreResult<UpsertKind> {
        let row = sqlx::query(
            r#"
            INSERT INTO teams (
                id, abbreviation, display_name, short_name, location, nickname,
                conference, division, primary_color, secondary_color,
                logo_url, logo_dark_url, is_active, source, last_synced_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO UPDATE SET
                abbreviation = EXCLUDED.abbreviation,
                display_name = EXCLUDED.display_name,
                short_name = EXCLUDED.short_name,
                location = EXCLUDED.location,
                nickname = EXCLUDED.nickname,
                conference = EXCLUDED.conference,
                division = EXCLUDED.division,
                primary_color = EXCLUDED.primary_color,
                secondary_color = EXCLUDED.secondary_color,
                logo_url = EXCLUDED.logo_url,
                logo_dark_url = EXCLUDED.logo_dark_url,
                is_active = EXCLUDED.is_active,
                source = EXCLUDED.source,
                last_synced_at = EXCLUDED.last_synced_at
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&team.id)
        .bind(&team.abbreviation)
        .bind(&team.display_name)
        .bind(&team.short_name)
        .bind(&team.location)
        .bind(&team.nickname)
        .bind(&team.conference)
        .bind(&team.division)
        .bind(&team.primary_color)
        .bind(&team.secondary_color)
        .bind(&team.logo_url)
        .bind(&team.logo_dark_url)
        .bind(team.is_active)
        .bind(team.source.as_str())
        .bind(team.last_synced_at)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        upsert_kind(&row)
    }

    async fn list_teams(&self) -> StoreResult<Vec<Team>> {
        let rows = sqlx::query("SELECT * FROM teams ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;
        rows.iter().map(team_from_row).collect()
    }

    async fn get_player(&self, id: &str) -> StoreResult<Option<Player>> {
        let row = sqlx::query("SELECT * FROM players WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;
        row.as_ref().map(player_from_row).transpose()
    }

    async fn upsert_player(&self, player: &Player) -> StoreResult<UpsertKind> {
        let row = sqlx::query(
            r#"
            INSERT INTO players (
                id, first_name, last_name, full_name, position, jersey, team_id,
                height_inches, height_display, weight_lbs, weight_display,
                birth_date, contract, alternate_ids, is_active, source, last_synced_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (id) DO UPDATE SET
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                full_name = EXCLUDED.full_name,
                position = EXCLUDED.position,
                jersey = EXCLUDED.jersey,
                team_id = EXCLUDED.team_id,
                height_inches = EXCLUDED.height_inches,
                height_display = EXCLUDED.height_display,
                weight_lbs = EXCLUDED.weight_lbs,
                weight_display = EXCLUDED.weight_display,
                birth_date = EXCLUDED.birth_date,
                contract = EXCLUDED.contract,
                alternate_ids = EXCLUDED.alternate_ids,
                is_active = EXCLUDED.is_active,
                source = EXCLUDED.source,
                last_synced_at = EXCLUDED.last_synced_at
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&player.id)
        .bind(&player.first_name)
        .bind(&player.last_name)
        .bind(&player.full_name)
        .bind(&player.position)
        .bind(&player.jersey)
        .bind(&player.team_id)
        .bind(player.height_inches)
        .bind(&player.height_display)
        .bind(player.weight_lbs)
        .bind(&player.weight_display)
        .bind(player.birth_date)
        .bind(&player.contract)
        .bind(&player.alternate_ids)
        .bind(player.is_active)
        .bind(player.source.as_str())
        .bind(player.last_synced_at)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        upsert_kind(&row)
    }

    async fn list_players(&self) -> StoreResult<Vec<Player>> {
        let rows = sqlx::query("SELECT * FROM players ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;
        rows.iter().map(player_from_row).collect()
    }

    async fn get_game(&self, id: &str) -> StoreResult<Option<Game>> {
        let row = sqlx::query("SELECT * FROM games WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;
        row.as_ref().map(game_from_row).transpose()
    }

    async fn upsert_game(&self, game: &Game) -> StoreResult<UpsertKind> {
        let row = sqlx::query(
            r#"
            INSERT INTO games (
                id, season, season_type, scheduled_at, status, home_team_id, away_team_id,
                home_score, away_score, venue, source, last_synced_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                season = EXCLUDED.season,
                season_type = EXCLUDED.season_type,
                scheduled_at = EXCLUDED.scheduled_at,
                status = EXCLUDED.status,
                home_team_id = EXCLUDED.home_team_id,
                away_team_id = EXCLUDED.away_team_id,
                home_score = EXCLUDED.home_score,
                away_score = EXCLUDED.away_score,
                venue = EXCLUDED.venue,
                source = EXCLUDED.source,
                last_synced_at = EXCLUDED.last_synced_at
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&game.id)
        .bind(game.season)
        .bind(game.season_type.espn_code())
        .bind(game.scheduled_at)
        .bind(game.status.as_str())
        .bind(&game.home_team_id)
        .bind(&game.away_team_id)
        .bind(game.home_score)
        .bind(game.away_score)
        .bind(&game.venue)
        .bind(game.source.as_str())
        .bind(game.last_synced_at)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        upsert_kind(&row)
    }

    async fn list_games(&self) -> StoreResult<Vec<Game>> {
        let rows = sqlx::query("SELECT * FROM games ORDER BY scheduled_at NULLS LAST, id")
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;
        rows.iter().map(game_from_row).collect()
    }

    async fn delete_game(&self, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM games WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_stat(&self, stat: &StatLine) -> StoreResult<UpsertKind> {
        let (table, owner_column) = stat_table(stat.owner);
        let sql = format!(
            r#"
            INSERT INTO {table} (
                {owner_column}, season, season_type, category, stat_name,
                value, display_value, last_synced_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT ({owner_column}, season, season_type, category, stat_name) DO UPDATE SET
                value = EXCLUDED.value,
                display_value = EXCLUDED.display_value,
                last_synced_at = EXCLUDED.last_synced_at
            RETURNING (xmax = 0) AS inserted
            "#
        );

        let row = sqlx::query(&sql)
            .bind(&stat.entity_id)
            .bind(stat.season)
            .bind(stat.season_type.espn_code())
            .bind(&stat.category)
            .bind(&stat.stat_name)
            .bind(stat.value)
            .bind(&stat.display_value)
            .bind(stat.last_synced_at)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;

        upsert_kind(&row)
    }

    async fn upsert_news(&self, news: &PlayerNews) -> StoreResult<UpsertKind> {
        let row = sqlx::query(
            r#"
            INSERT INTO player_news (
                id, headline, description, link, published_at,
                player_id, team_id, source, last_synced_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                headline = EXCLUDED.headline,
                description = EXCLUDED.description,
                link = EXCLUDED.link,
                published_at = EXCLUDED.published_at,
                player_id = EXCLUDED.player_id,
                team_id = EXCLUDED.team_id,
                source = EXCLUDED.source,
                last_synced_at = EXCLUDED.last_synced_at
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&news.id)
        .bind(&news.headline)
        .bind(&news.description)
        .bind(&news.link)
        .bind(news.published_at)
        .bind(&news.player_id)
        .bind(&news.team_id)
        .bind(news.source.as_str())
        .bind(news.last_synced_at)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        upsert_kind(&row)
    }

    async fn lookup_external_id(
        &self,
        provider: Provider,
        kind: EntityKind,
        external_id: &str,
    ) -> StoreResult<Option<String>> {
        let row = sqlx::query(
            "SELECT canonical_id FROM external_ids WHERE provider = $1 AND entity = $2 AND external_id = $3",
        )
        .bind(provider.as_str())
        .bind(kind.as_str())
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;

        match row {
            Some(row) => Ok(Some(row.try_get("canonical_id")?)),
            None => Ok(None),
        }
    }

    async fn save_external_id(
        &self,
        provider: Provider,
        kind: EntityKind,
        external_id: &str,
        canonical_id: &str,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO external_ids (provider, entity, external_id, canonical_id, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (provider, entity, external_id) DO UPDATE SET
                canonical_id = EXCLUDED.canonical_id,
                updated_at = NOW()
            "#,
        )
        .bind(provider.as_str())
        .bind(kind.as_str())
        .bind(external_id)
        .bind(canonical_id)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn try_acquire_run_lock(&self, kind: EntityKind) -> StoreResult<bool> {
        let mut held = self.lock_connections.lock().await;
        if held.contains_key(&kind) {
            return Ok(false);
        }

        let mut conn = self.pool.acquire().await.map_err(classify)?;
        let row = sqlx::query("SELECT pg_try_advisory_lock($1) AS locked")
            .bind(kind.lock_key())
            .fetch_one(&mut *conn)
            .await
            .map_err(classify)?;
        let locked: bool = row.try_get("locked")?;

        if locked {
            debug!("Acquired advisory lock {} for {}", kind.lock_key(), kind);
            held.insert(kind, conn);
        }
        Ok(locked)
    }

    async fn release_run_lock(&self, kind: EntityKind) -> StoreResult<()> {
        let Some(mut conn) = self.lock_connections.lock().await.remove(&kind) else {
            return Ok(());
        };

        let result = sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(kind.lock_key())
            .execute(&mut *conn)
            .await;

        if let Err(e) = result {
            // Closing the session drops any advisory lock it still holds
            warn!("Failed to unlock {} cleanly, closing connection: {}", kind, e);
            drop(conn.detach());
            return Err(classify(e));
        }
        debug!("Released advisory lock for {}", kind);
        Ok(())
    }

    async fn count(&self, kind: EntityKind) -> StoreResult<u64> {
        let table = match kind {
            EntityKind::PlayerSeasonStat => "player_season_stats",
            EntityKind::TeamStatistic => "team_statistics",
            other => table_for(other).ok_or(StoreError::Unsupported(other))?,
        };
        let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;
        let n: i64 = row.try_get("n")?;
        Ok(n.max(0) as u64)
    }
}
