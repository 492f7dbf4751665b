//! ESPN Site news articles.
//!
//! Articles tag players and teams through `categories`; either link may be
//! absent and that is a valid article.

use super::dates::parse_datetime;
use super::str_field;
use crate::error::TransformError;
use crate::models::{EntityKind, PlayerNews, Provider};
use chrono::{DateTime, Utc};
use serde_json::Value;

pub fn from_espn_site(raw: &Value, synced_at: DateTime<Utc>) -> Result<PlayerNews, TransformError> {
    if !raw.is_object() {
        return Err(TransformError::Malformed {
            entity: EntityKind::PlayerNews,
            reason: "expected a JSON object".to_string(),
        });
    }
    let id = str_field(raw, "id")
        .or_else(|| str_field(raw, "dataSourceIdentifier"))
        .ok_or(TransformError::MissingKey {
            entity: EntityKind::PlayerNews,
            field: "id",
        })?;

    let categories = raw.get("categories").and_then(|c| c.as_array());
    let tagged = |kind: &str, id_key: &str, nested: &str| -> Option<String> {
        categories?
            .iter()
            .filter(|c| c.get("type").and_then(|t| t.as_str()) == Some(kind))
            .find_map(|c| {
                str_field(c, id_key).or_else(|| c.get(nested).and_then(|n| str_field(n, "id")))
            })
    };

    Ok(PlayerNews {
        headline: str_field(raw, "headline"),
        description: str_field(raw, "description"),
        link: raw
            .get("links")
            .and_then(|l| l.get("web"))
            .and_then(|w| str_field(w, "href")),
        published_at: str_field(raw, "published").and_then(|p| parse_datetime(&p)),
        player_id: tagged("athlete", "athleteId", "athlete"),
        team_id: tagged("team", "teamId", "team"),
        source: Provider::EspnSite,
        last_synced_at: synced_at,
        id,
    })
}
