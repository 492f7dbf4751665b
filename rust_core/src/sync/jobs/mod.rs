//! Per-entity sync jobs.
//!
//! ESPN jobs write under ESPN ids directly; sportsdata.io jobs resolve every
//! id to its canonical counterpart first. Teams must be synced before the
//! jobs that reference them.

pub mod game;
pub mod news;
pub mod player;
pub mod stats;
pub mod team;

pub use game::{GameSync, SportsDataGameSync};
pub use news::NewsSync;
pub use player::{PlayerSync, SportsDataPlayerSync};
pub use stats::{PlayerStatsSync, TeamStatsSync};
pub use team::{SportsDataTeamSync, TeamSync};

use super::SourceRecord;
use crate::cancel::CancelToken;
use crate::error::FetchError;
use futures_util::stream::{self, StreamExt};
use serde_json::Value;
use std::future::Future;

/// Fetch one detail document per id with bounded concurrency, in id order.
/// Ids not yet started when `cancel` fires are dropped.
pub(crate) async fn fetch_details<F, Fut>(
    ids: Vec<String>,
    concurrency: usize,
    cancel: &CancelToken,
    fetch: F,
) -> Vec<SourceRecord>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Value, FetchError>>,
{
    let fetch = &fetch;
    stream::iter(ids)
        .map(|id| async move {
            if cancel.is_cancelled() {
                return None;
            }
            let payload = fetch(id.clone()).await;
            Some(SourceRecord {
                external_id: id,
                payload,
            })
        })
        .buffered(concurrency.max(1))
        .filter_map(|record| async move { record })
        .collect()
        .await
}

/// Label listing items by `id_key`.
pub(crate) fn inline_records(items: Vec<Value>, id_key: &str) -> Vec<SourceRecord> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| SourceRecord::inline(i, item, id_key))
        .collect()
}
