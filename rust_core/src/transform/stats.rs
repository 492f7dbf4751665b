//! Core API `statistics` documents -> one `StatLine` per (category, stat).

use super::{float_field, str_field};
use crate::error::TransformError;
use crate::models::{SeasonType, StatLine, StatOwner};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

/// Which entity and season a statistics document belongs to.
#[derive(Debug, Clone)]
pub struct StatContext {
    pub owner: StatOwner,
    pub entity_id: String,
    pub season: i32,
    pub season_type: SeasonType,
}

pub fn from_espn_core(
    ctx: &StatContext,
    raw: &Value,
    synced_at: DateTime<Utc>,
) -> Result<Vec<StatLine>, TransformError> {
    let categories = raw
        .get("splits")
        .and_then(|s| s.get("categories"))
        .and_then(|c| c.as_array())
        .ok_or_else(|| TransformError::Malformed {
            entity: ctx.owner.entity_kind(),
            reason: format!("statistics for {} have no splits.categories", ctx.entity_id),
        })?;

    let mut lines = Vec::new();
    for category in categories {
        let Some(category_name) = str_field(category, "name") else {
            debug!("Skipping unnamed stat category for {}", ctx.entity_id);
            continue;
        };
        let Some(stats) = category.get("stats").and_then(|s| s.as_array()) else {
            continue;
        };

        for stat in stats {
            let Some(stat_name) = str_field(stat, "name") else {
                continue;
            };
            let value = float_field(stat, "value");
            let display_value = str_field(stat, "displayValue").or_else(|| value.map(format_stat_value));

            lines.push(StatLine {
                owner: ctx.owner,
                entity_id: ctx.entity_id.clone(),
                season: ctx.season,
                season_type: ctx.season_type,
                category: category_name.clone(),
                stat_name,
                value,
                display_value,
                last_synced_at: synced_at,
            });
        }
    }

    Ok(lines)
}

/// Whole numbers without decimals, otherwise up to three places.
pub fn format_stat_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        let s = format!("{:.3}", value);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> StatContext {
        StatContext {
            owner: StatOwner::Player,
            entity_id: "3032977".to_string(),
            season: 2025,
            season_type: SeasonType::Regular,
        }
    }

    #[test]
    fn test_flattens_categories() {
        let raw = json!({
            "splits": {"categories": [
                {"name": "offensive", "stats": [
                    {"name": "avgPoints", "value": 30.4, "displayValue": "30.4"},
                    {"name": "fieldGoalPct", "value": 0.611}
                ]},
                {"name": "general", "stats": [
                    {"name": "gamesPlayed", "value": 67.0},
                    {"displayValue": "no name"}
                ]}
            ]}
        });
        let lines = from_espn_core(&ctx(), &raw, Utc::now()).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].category, "offensive");
        assert_eq!(lines[0].display_value.as_deref(), Some("30.4"));
        assert_eq!(lines[1].display_value.as_deref(), Some("0.611"));
        assert_eq!(lines[2].display_value.as_deref(), Some("67"));
        assert_eq!(lines[2].key().season_type, 2);
    }

    #[test]
    fn test_missing_splits_is_malformed() {
        assert!(from_espn_core(&ctx(), &json!({"id": 1}), Utc::now()).is_err());
    }

    #[test]
    fn test_format_stat_value() {
        assert_eq!(format_stat_value(12.0), "12");
        assert_eq!(format_stat_value(0.5), "0.5");
        assert_eq!(format_stat_value(0.47512), "0.475");
    }
}
