//! Player payloads: ESPN Core athletes and sportsdata `Players` rows.

use super::dates::{parse_date, parse_datetime};
use super::physical::{reconcile_height, reconcile_weight};
use super::{bool_field, float_field, id_from_ref, str_field, JsonBlob};
use crate::error::TransformError;
use crate::models::{EntityKind, Player, Provider};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

pub fn from_espn_core(raw: &Value, synced_at: DateTime<Utc>) -> Result<Player, TransformError> {
    ensure_object(raw)?;
    let id = str_field(raw, "id").ok_or(TransformError::MissingKey {
        entity: EntityKind::Player,
        field: "id",
    })?;

    let (height_inches, height_display) =
        reconcile_height(float_field(raw, "height"), str_field(raw, "displayHeight").as_deref());
    let (weight_lbs, weight_display) =
        reconcile_weight(float_field(raw, "weight"), str_field(raw, "displayWeight").as_deref());

    let team_id = raw
        .get("team")
        .and_then(|t| t.get("$ref"))
        .and_then(|r| r.as_str())
        .and_then(|r| id_from_ref(r, "teams"));

    let birth_date = str_field(raw, "dateOfBirth").and_then(|s| {
        let parsed = parse_date(&s);
        if parsed.is_none() {
            debug!("athlete {} has unparseable dateOfBirth {:?}", id, s);
        }
        parsed
    });

    let contract_field = raw.get("contract").or_else(|| raw.get("contracts"));

    Ok(Player {
        first_name: str_field(raw, "firstName"),
        last_name: str_field(raw, "lastName"),
        full_name: str_field(raw, "fullName").or_else(|| str_field(raw, "displayName")),
        position: raw.get("position").and_then(|p| str_field(p, "abbreviation")),
        jersey: str_field(raw, "jersey"),
        team_id,
        height_inches,
        height_display,
        weight_lbs,
        weight_display,
        birth_date,
        contract: JsonBlob::from_field(contract_field).normalize(),
        alternate_ids: JsonBlob::from_field(raw.get("alternateIds")).normalize(),
        is_active: bool_field(raw, "active").unwrap_or(true),
        source: Provider::EspnCore,
        last_synced_at: synced_at,
        id,
    })
}

/// `id` and `team_id` are sportsdata identifiers until canonical resolution.
pub fn from_sportsdata(raw: &Value, synced_at: DateTime<Utc>) -> Result<Player, TransformError> {
    ensure_object(raw)?;
    let id = str_field(raw, "PlayerID").ok_or(TransformError::MissingKey {
        entity: EntityKind::Player,
        field: "PlayerID",
    })?;

    let first_name = str_field(raw, "FirstName");
    let last_name = str_field(raw, "LastName");
    let full_name = match (&first_name, &last_name) {
        (Some(f), Some(l)) => Some(format!("{} {}", f, l)),
        (Some(n), None) | (None, Some(n)) => Some(n.clone()),
        (None, None) => None,
    };

    let (height_inches, height_display) = reconcile_height(float_field(raw, "Height"), None);
    let (weight_lbs, weight_display) = reconcile_weight(float_field(raw, "Weight"), None);

    Ok(Player {
        first_name,
        last_name,
        full_name,
        position: str_field(raw, "Position"),
        jersey: str_field(raw, "Jersey"),
        team_id: str_field(raw, "TeamID"),
        height_inches,
        height_display,
        weight_lbs,
        weight_display,
        birth_date: str_field(raw, "BirthDate")
            .and_then(|s| parse_datetime(&s).map(|dt| dt.date_naive()).or_else(|| parse_date(&s))),
        contract: None,
        alternate_ids: None,
        is_active: bool_field(raw, "Status").unwrap_or(true),
        source: Provider::SportsData,
        last_synced_at: synced_at,
        id,
    })
}

fn ensure_object(raw: &Value) -> Result<(), TransformError> {
    if raw.is_object() {
        Ok(())
    } else {
        Err(TransformError::Malformed {
            entity: EntityKind::Player,
            reason: "expected a JSON object".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn athlete() -> Value {
        json!({
            "id": "3032977",
            "firstName": "Giannis",
            "lastName": "Antetokounmpo",
            "fullName": "Giannis Antetokounmpo",
            "jersey": "34",
            "position": {"abbreviation": "F"},
            "height": 83.0,
            "displayHeight": "6' 11\"",
            "weight": 243.0,
            "displayWeight": "243 lbs",
            "dateOfBirth": "1994-12-06T08:00Z",
            "active": true,
            "team": {"$ref": "http://sports.core.api.espn.com/v2/sports/basketball/leagues/nba/seasons/2025/teams/15?lang=en"},
            "contract": "{\"salary\": 48787676, \"yearsRemaining\": 3}",
            "alternateIds": {"sdr": "3032977"}
        })
    }

    #[test]
    fn test_espn_core_athlete() {
        let player = from_espn_core(&athlete(), Utc::now()).unwrap();
        assert_eq!(player.id, "3032977");
        assert_eq!(player.team_id.as_deref(), Some("15"));
        assert_eq!(player.position.as_deref(), Some("F"));
        assert_eq!(player.height_inches, Some(83));
        assert_eq!(player.height_display.as_deref(), Some("6' 11\""));
        assert_eq!(player.weight_lbs, Some(243));
        assert_eq!(player.birth_date, NaiveDate::from_ymd_opt(1994, 12, 6));
        assert_eq!(player.contract, Some(json!({"salary": 48787676, "yearsRemaining": 3})));
        assert_eq!(player.alternate_ids, Some(json!({"sdr": "3032977"})));
    }

    #[test]
    fn test_missing_fields_become_none() {
        let player = from_espn_core(&json!({"id": 42}), Utc::now()).unwrap();
        assert_eq!(player.id, "42");
        assert_eq!(player.team_id, None);
        assert_eq!(player.height_inches, None);
        assert_eq!(player.height_display, None);
        assert_eq!(player.birth_date, None);
        assert_eq!(player.contract, None);
    }

    #[test]
    fn test_display_only_height_is_parsed() {
        let raw = json!({"id": "1", "displayHeight": "6' 7\"", "displayWeight": "230 lbs"});
        let player = from_espn_core(&raw, Utc::now()).unwrap();
        assert_eq!(player.height_inches, Some(79));
        assert_eq!(player.weight_lbs, Some(230));
    }

    #[test]
    fn test_absurd_display_height_is_dropped() {
        let raw = json!({"id": "1", "displayHeight": "999999999'"});
        let player = from_espn_core(&raw, Utc::now()).unwrap();
        assert_eq!(player.height_inches, None);
        assert_eq!(player.height_display, None);
    }

    #[test]
    fn test_height_round_trips_through_display() {
        let raw = json!({"id": "1", "height": 79});
        let first = from_espn_core(&raw, Utc::now()).unwrap();
        let reparsed = from_espn_core(
            &json!({"id": "1", "displayHeight": first.height_display}),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(reparsed.height_inches, first.height_inches);
    }

    #[test]
    fn test_missing_id() {
        assert!(matches!(
            from_espn_core(&json!({"fullName": "No Id"}), Utc::now()),
            Err(TransformError::MissingKey { field: "id", .. })
        ));
    }

    #[test]
    fn test_sportsdata_player() {
        let raw = json!({
            "PlayerID": 20000441, "FirstName": "Giannis", "LastName": "Antetokounmpo",
            "TeamID": 15, "Team": "MIL", "Position": "PF", "Jersey": 34,
            "Height": 83, "Weight": 243, "BirthDate": "1994-12-06T00:00:00", "Status": "Active"
        });
        let player = from_sportsdata(&raw, Utc::now()).unwrap();
        assert_eq!(player.id, "20000441");
        assert_eq!(player.full_name.as_deref(), Some("Giannis Antetokounmpo"));
        assert_eq!(player.team_id.as_deref(), Some("15"));
        assert_eq!(player.jersey.as_deref(), Some("34"));
        assert_eq!(player.height_display.as_deref(), Some("6'11\""));
        assert_eq!(player.weight_display.as_deref(), Some("243 lbs"));
        assert_eq!(player.birth_date, NaiveDate::from_ymd_opt(1994, 12, 6));
        assert!(player.is_active);
    }
}
