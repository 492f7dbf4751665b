//! Season statistics from the ESPN Core API, for players and teams already
//! stored. Each owner's document is fetched separately; one failing only
//! fails that owner.

use crate::clients::EspnCoreClient;
use crate::error::{SyncError, TransformError};
use crate::models::{EntityKind, LocalRecord, Provider, StatOwner};
use crate::sync::jobs::fetch_details;
use crate::sync::{EntitySync, RunContext, SourceRecord, SyncScope};
use crate::transform::stats::{self, StatContext};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

fn stat_records(
    owner: StatOwner,
    scope: &SyncScope,
    entity_id: &str,
    raw: &Value,
    synced_at: DateTime<Utc>,
) -> Result<Vec<LocalRecord>, TransformError> {
    let ctx = StatContext {
        owner,
        entity_id: entity_id.to_string(),
        season: scope.season,
        season_type: scope.season_type,
    };
    Ok(stats::from_espn_core(&ctx, raw, synced_at)?
        .into_iter()
        .map(LocalRecord::Stat)
        .collect())
}

pub struct PlayerStatsSync {
    client: EspnCoreClient,
}

impl PlayerStatsSync {
    pub fn new(client: EspnCoreClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EntitySync for PlayerStatsSync {
    fn name(&self) -> &'static str {
        "player-stats"
    }

    fn kind(&self) -> EntityKind {
        EntityKind::PlayerSeasonStat
    }

    fn provider(&self) -> Provider {
        Provider::EspnCore
    }

    async fn fetch(&self, ctx: &RunContext) -> Result<Vec<SourceRecord>, SyncError> {
        let ids: Vec<String> = ctx
            .store
            .list_players()
            .await?
            .into_iter()
            .filter(|p| p.is_active && ctx.scope.includes_team(p.team_id.as_deref()))
            .map(|p| p.id)
            .collect();
        info!("Fetching season statistics for {} players", ids.len());

        let client = &self.client;
        let (season, season_type) = (ctx.scope.season, ctx.scope.season_type);
        Ok(fetch_details(
            ids,
            client.http().deref_concurrency(),
            &ctx.cancel,
            |id| async move { client.athlete_statistics(season, season_type, &id).await },
        )
        .await)
    }

    fn transform(
        &self,
        scope: &SyncScope,
        external_id: &str,
        raw: &Value,
        synced_at: DateTime<Utc>,
    ) -> Result<Vec<LocalRecord>, TransformError> {
        stat_records(StatOwner::Player, scope, external_id, raw, synced_at)
    }
}

pub struct TeamStatsSync {
    client: EspnCoreClient,
}

impl TeamStatsSync {
    pub fn new(client: EspnCoreClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EntitySync for TeamStatsSync {
    fn name(&self) -> &'static str {
        "team-stats"
    }

    fn kind(&self) -> EntityKind {
        EntityKind::TeamStatistic
    }

    fn provider(&self) -> Provider {
        Provider::EspnCore
    }

    async fn fetch(&self, ctx: &RunContext) -> Result<Vec<SourceRecord>, SyncError> {
        let ids: Vec<String> = ctx
            .store
            .list_teams()
            .await?
            .into_iter()
            .filter(|t| t.is_active && ctx.scope.includes_team(Some(&t.id)))
            .map(|t| t.id)
            .collect();

        let client = &self.client;
        let (season, season_type) = (ctx.scope.season, ctx.scope.season_type);
        Ok(fetch_details(
            ids,
            client.http().deref_concurrency(),
            &ctx.cancel,
            |id| async move { client.team_statistics(season, season_type, &id).await },
        )
        .await)
    }

    fn transform(
        &self,
        scope: &SyncScope,
        external_id: &str,
        raw: &Value,
        synced_at: DateTime<Utc>,
    ) -> Result<Vec<LocalRecord>, TransformError> {
        stat_records(StatOwner::Team, scope, external_id, raw, synced_at)
    }
}
