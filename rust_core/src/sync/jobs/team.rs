use crate::clients::{EspnSiteClient, SportsDataClient};
use crate::error::{StoreResult, SyncError, TransformError};
use crate::models::{EntityKind, LocalRecord, Provider};
use crate::sync::jobs::inline_records;
use crate::sync::{EntitySync, Resolution, RunContext, SourceRecord, SyncScope};
use crate::transform::team;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Teams from the ESPN Site API.
pub struct TeamSync {
    client: EspnSiteClient,
}

impl TeamSync {
    pub fn new(client: EspnSiteClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EntitySync for TeamSync {
    fn name(&self) -> &'static str {
        "teams"
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Team
    }

    fn provider(&self) -> Provider {
        Provider::EspnSite
    }

    async fn fetch(&self, _ctx: &RunContext) -> Result<Vec<SourceRecord>, SyncError> {
        Ok(inline_records(self.client.teams().await?, "id"))
    }

    fn transform(
        &self,
        _scope: &SyncScope,
        _external_id: &str,
        raw: &Value,
        synced_at: DateTime<Utc>,
    ) -> Result<Vec<LocalRecord>, TransformError> {
        Ok(vec![LocalRecord::Team(team::from_espn_site(raw, synced_at)?)])
    }
}

/// Teams from sportsdata.io, mapped onto ESPN teams by id map or abbreviation.
pub struct SportsDataTeamSync {
    client: SportsDataClient,
}

impl SportsDataTeamSync {
    pub fn new(client: SportsDataClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EntitySync for SportsDataTeamSync {
    fn name(&self) -> &'static str {
        "teams"
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Team
    }

    fn provider(&self) -> Provider {
        Provider::SportsData
    }

    async fn fetch(&self, _ctx: &RunContext) -> Result<Vec<SourceRecord>, SyncError> {
        Ok(inline_records(self.client.teams().await?, "TeamID"))
    }

    fn transform(
        &self,
        _scope: &SyncScope,
        _external_id: &str,
        raw: &Value,
        synced_at: DateTime<Utc>,
    ) -> Result<Vec<LocalRecord>, TransformError> {
        Ok(vec![LocalRecord::Team(team::from_sportsdata(raw, synced_at)?)])
    }

    async fn resolve(&self, ctx: &RunContext, record: LocalRecord) -> StoreResult<Resolution> {
        let mut team = match record {
            LocalRecord::Team(team) => team,
            other => return Ok(Resolution::Ready(other)),
        };
        let canonical = ctx
            .resolver
            .resolve_team(Provider::SportsData, &team.id, team.abbreviation.as_deref())
            .await?;

        Ok(match canonical {
            Some(id) => {
                team.id = id;
                Resolution::Ready(LocalRecord::Team(team))
            }
            None => Resolution::Unresolved {
                kind: EntityKind::Team,
                external_id: team.id,
            },
        })
    }
}
