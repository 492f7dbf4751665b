use crate::clients::{EspnSiteClient, SportsDataClient};
use crate::error::{StoreResult, SyncError, TransformError};
use crate::identity::{IdScheme, IdSchemeRule};
use crate::models::{EntityKind, Game, LocalRecord, Provider};
use crate::sync::jobs::inline_records;
use crate::sync::{EntitySync, Resolution, RunContext, SourceRecord, SyncScope};
use crate::transform::game;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

fn in_scope(scope: &SyncScope, game: &Game) -> bool {
    scope.includes_team(Some(&game.home_team_id)) || scope.includes_team(Some(&game.away_team_id))
}

/// Games from the ESPN Site scoreboard over the season's date range.
///
/// A legacy id that identity migration already retired is written under the
/// id that replaced it, so the deleted row is not recreated.
pub struct GameSync {
    client: EspnSiteClient,
    id_scheme: IdSchemeRule,
}

impl GameSync {
    pub fn new(client: EspnSiteClient) -> Self {
        Self {
            client,
            id_scheme: IdSchemeRule::default(),
        }
    }

    pub fn with_id_scheme(mut self, id_scheme: IdSchemeRule) -> Self {
        self.id_scheme = id_scheme;
        self
    }
}

#[async_trait]
impl EntitySync for GameSync {
    fn name(&self) -> &'static str {
        "games"
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Game
    }

    fn provider(&self) -> Provider {
        Provider::EspnSite
    }

    async fn fetch(&self, ctx: &RunContext) -> Result<Vec<SourceRecord>, SyncError> {
        let events = self
            .client
            .scoreboard(&ctx.scope.scoreboard_dates(), ctx.scope.season_type)
            .await?;
        Ok(inline_records(events, "id"))
    }

    fn transform(
        &self,
        scope: &SyncScope,
        _external_id: &str,
        raw: &Value,
        synced_at: DateTime<Utc>,
    ) -> Result<Vec<LocalRecord>, TransformError> {
        let game = game::from_espn_site(raw, synced_at)?;
        Ok(if in_scope(scope, &game) {
            vec![LocalRecord::Game(game)]
        } else {
            Vec::new()
        })
    }

    async fn resolve(&self, ctx: &RunContext, record: LocalRecord) -> StoreResult<Resolution> {
        let mut game = match record {
            LocalRecord::Game(game) => game,
            other => return Ok(Resolution::Ready(other)),
        };
        if self.id_scheme.classify(&game.id) == IdScheme::Legacy {
            if let Some(current) = ctx
                .resolver
                .replacement(Provider::EspnSite, EntityKind::Game, &game.id)
                .await?
            {
                debug!("Legacy game {} was migrated to {}", game.id, current);
                game.id = current;
            }
        }
        Ok(Resolution::Ready(LocalRecord::Game(game)))
    }
}

/// Games from sportsdata.io. Only games ESPN already knows about are
/// written, under the ESPN game id.
pub struct SportsDataGameSync {
    client: SportsDataClient,
}

impl SportsDataGameSync {
    pub fn new(client: SportsDataClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EntitySync for SportsDataGameSync {
    fn name(&self) -> &'static str {
        "games"
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Game
    }

    fn provider(&self) -> Provider {
        Provider::SportsData
    }

    async fn fetch(&self, ctx: &RunContext) -> Result<Vec<SourceRecord>, SyncError> {
        let games = self
            .client
            .games(ctx.scope.season, ctx.scope.season_type)
            .await?;
        Ok(inline_records(games, "GameID"))
    }

    fn transform(
        &self,
        _scope: &SyncScope,
        _external_id: &str,
        raw: &Value,
        synced_at: DateTime<Utc>,
    ) -> Result<Vec<LocalRecord>, TransformError> {
        Ok(vec![LocalRecord::Game(game::from_sportsdata(raw, synced_at)?)])
    }

    async fn resolve(&self, ctx: &RunContext, record: LocalRecord) -> StoreResult<Resolution> {
        let mut game = match record {
            LocalRecord::Game(game) => game,
            other => return Ok(Resolution::Ready(other)),
        };

        for side in [&mut game.home_team_id, &mut game.away_team_id] {
            match ctx
                .resolver
                .lookup(Provider::SportsData, EntityKind::Team, side.as_str())
                .await?
            {
                Some(team_id) => *side = team_id,
                None => {
                    return Ok(Resolution::Unresolved {
                        kind: EntityKind::Team,
                        external_id: side.clone(),
                    })
                }
            }
        }

        if !in_scope(&ctx.scope, &game) {
            return Ok(Resolution::OutOfScope);
        }

        let canonical = ctx
            .resolver
            .resolve_game(
                Provider::SportsData,
                &game.id,
                &game.home_team_id,
                &game.away_team_id,
                game.scheduled_at,
            )
            .await?;

        Ok(match canonical {
            Some(id) => {
                game.id = id;
                Resolution::Ready(LocalRecord::Game(game))
            }
            None => Resolution::Unresolved {
                kind: EntityKind::Game,
                external_id: game.id,
            },
        })
    }
}
