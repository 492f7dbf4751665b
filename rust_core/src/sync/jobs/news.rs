use crate::clients::EspnSiteClient;
use crate::error::{SyncError, TransformError};
use crate::models::{EntityKind, LocalRecord, Provider};
use crate::sync::jobs::inline_records;
use crate::sync::{EntitySync, RunContext, SourceRecord, SyncScope};
use crate::transform::news;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Latest league news from the ESPN Site API. Articles tagging a player or
/// team that is not stored yet are skipped, untagged articles are kept.
pub struct NewsSync {
    client: EspnSiteClient,
}

impl NewsSync {
    pub fn new(client: EspnSiteClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EntitySync for NewsSync {
    fn name(&self) -> &'static str {
        "news"
    }

    fn kind(&self) -> EntityKind {
        EntityKind::PlayerNews
    }

    fn provider(&self) -> Provider {
        Provider::EspnSite
    }

    async fn fetch(&self, ctx: &RunContext) -> Result<Vec<SourceRecord>, SyncError> {
        let articles = self.client.news(ctx.scope.news_limit).await?;
        Ok(inline_records(articles, "id"))
    }

    fn transform(
        &self,
        _scope: &SyncScope,
        _external_id: &str,
        raw: &Value,
        synced_at: DateTime<Utc>,
    ) -> Result<Vec<LocalRecord>, TransformError> {
        Ok(vec![LocalRecord::News(news::from_espn_site(raw, synced_at)?)])
    }
}
