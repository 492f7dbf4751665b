use crate::clients::{EspnCoreClient, SportsDataClient};
use crate::error::{StoreResult, SyncError, TransformError};
use crate::models::{EntityKind, LocalRecord, Player, Provider};
use crate::sync::jobs::inline_records;
use crate::sync::{EntitySync, Resolution, RunContext, SourceRecord, SyncScope};
use crate::transform::{id_from_ref, player};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

fn scoped(scope: &SyncScope, player: Player) -> Vec<LocalRecord> {
    if scope.includes_team(player.team_id.as_deref()) {
        vec![LocalRecord::Player(player)]
    } else {
        Vec::new()
    }
}

/// Active athletes from the ESPN Core API (`$ref` listing).
pub struct PlayerSync {
    client: EspnCoreClient,
}

impl PlayerSync {
    pub fn new(client: EspnCoreClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EntitySync for PlayerSync {
    fn name(&self) -> &'static str {
        "players"
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Player
    }

    fn provider(&self) -> Provider {
        Provider::EspnCore
    }

    async fn fetch(&self, ctx: &RunContext) -> Result<Vec<SourceRecord>, SyncError> {
        let athletes = self.client.athletes(true, &ctx.cancel).await?;
        Ok(athletes
            .into_iter()
            .map(|(reference, payload)| SourceRecord {
                external_id: id_from_ref(&reference, "athletes").unwrap_or(reference),
                payload,
            })
            .collect())
    }

    fn transform(
        &self,
        scope: &SyncScope,
        _external_id: &str,
        raw: &Value,
        synced_at: DateTime<Utc>,
    ) -> Result<Vec<LocalRecord>, TransformError> {
        Ok(scoped(scope, player::from_espn_core(raw, synced_at)?))
    }
}

/// Players from sportsdata.io. Needs the sportsdata team map, so run the
/// sportsdata team sync first.
pub struct SportsDataPlayerSync {
    client: SportsDataClient,
}

impl SportsDataPlayerSync {
    pub fn new(client: SportsDataClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EntitySync for SportsDataPlayerSync {
    fn name(&self) -> &'static str {
        "players"
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Player
    }

    fn provider(&self) -> Provider {
        Provider::SportsData
    }

    async fn fetch(&self, _ctx: &RunContext) -> Result<Vec<SourceRecord>, SyncError> {
        Ok(inline_records(self.client.players().await?, "PlayerID"))
    }

    fn transform(
        &self,
        _scope: &SyncScope,
        _external_id: &str,
        raw: &Value,
        synced_at: DateTime<Utc>,
    ) -> Result<Vec<LocalRecord>, TransformError> {
        // Team scoping happens after the team id is made canonical
        Ok(vec![LocalRecord::Player(player::from_sportsdata(raw, synced_at)?)])
    }

    async fn resolve(&self, ctx: &RunContext, record: LocalRecord) -> StoreResult<Resolution> {
        let mut player = match record {
            LocalRecord::Player(player) => player,
            other => return Ok(Resolution::Ready(other)),
        };

        if let Some(external_team) = player.team_id.take() {
            match ctx
                .resolver
                .lookup(Provider::SportsData, EntityKind::Team, &external_team)
                .await?
            {
                Some(team_id) => player.team_id = Some(team_id),
                None => {
                    return Ok(Resolution::Unresolved {
                        kind: EntityKind::Team,
                        external_id: external_team,
                    })
                }
            }
        }

        let canonical = ctx
            .resolver
            .resolve_player(
                Provider::SportsData,
                &player.id,
                player.full_name.as_deref(),
                player.team_id.as_deref(),
            )
            .await?;

        Ok(match canonical {
            Some(id) if ctx.scope.includes_team(player.team_id.as_deref()) => {
                player.id = id;
                Resolution::Ready(LocalRecord::Player(player))
            }
            Some(_) => Resolution::OutOfScope,
            None => Resolution::Unresolved {
                kind: EntityKind::Player,
                external_id: player.id,
            },
        })
    }
}
