//! Game payloads: ESPN scoreboard events and sportsdata `Games` rows.

use super::dates::parse_datetime;
use super::{int_field, str_field};
use crate::error::TransformError;
use crate::models::{EntityKind, Game, GameStatus, Provider, SeasonType};
use chrono::{DateTime, Datelike, Utc};
use serde_json::Value;

/// Season year of a date, NBA style: a season starting in October 2024 is 2025.
pub fn season_for(date: DateTime<Utc>) -> i32 {
    if date.month() >= 8 {
        date.year() + 1
    } else {
        date.year()
    }
}

pub fn from_espn_site(raw: &Value, synced_at: DateTime<Utc>) -> Result<Game, TransformError> {
    if !raw.is_object() {
        return Err(malformed("expected a JSON object"));
    }
    let id = str_field(raw, "id").ok_or(TransformError::MissingKey {
        entity: EntityKind::Game,
        field: "id",
    })?;

    let competition = raw
        .get("competitions")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first());
    let competitors = competition
        .and_then(|c| c.get("competitors"))
        .and_then(|c| c.as_array())
        .ok_or_else(|| malformed("event has no competitors"))?;

    let side = |home_away: &str| {
        competitors
            .iter()
            .find(|c| c.get("homeAway").and_then(|v| v.as_str()) == Some(home_away))
    };
    let home = side("home").ok_or(TransformError::MissingKey {
        entity: EntityKind::Game,
        field: "home competitor",
    })?;
    let away = side("away").ok_or(TransformError::MissingKey {
        entity: EntityKind::Game,
        field: "away competitor",
    })?;
    let team_id = |c: &Value| c.get("team").and_then(|t| str_field(t, "id")).or_else(|| str_field(c, "id"));
    let home_team_id = team_id(home).ok_or(TransformError::MissingKey {
        entity: EntityKind::Game,
        field: "home team id",
    })?;
    let away_team_id = team_id(away).ok_or(TransformError::MissingKey {
        entity: EntityKind::Game,
        field: "away team id",
    })?;

    let status = raw
        .get("status")
        .and_then(|s| s.get("type"))
        .and_then(|t| str_field(t, "name").or_else(|| str_field(t, "state")))
        .map(|s| GameStatus::parse(&s))
        .unwrap_or_default();

    let scheduled_at = str_field(raw, "date").and_then(|d| parse_datetime(&d));
    let season_obj = raw.get("season");
    let season = season_obj
        .and_then(|s| int_field(s, "year"))
        .map(|y| y as i32)
        .or_else(|| scheduled_at.map(season_for))
        .ok_or_else(|| malformed("event has neither season nor date"))?;
    let season_type = season_obj
        .and_then(|s| int_field(s, "type"))
        .and_then(SeasonType::from_espn_code)
        .unwrap_or_default();

    // Pre-game scoreboards carry "0" scores
    let score = |c: &Value| match status {
        GameStatus::Scheduled | GameStatus::Postponed | GameStatus::Cancelled => None,
        _ => int_field(c, "score").map(|s| s as i32),
    };

    Ok(Game {
        id,
        season,
        season_type,
        scheduled_at,
        status,
        home_score: score(home),
        away_score: score(away),
        home_team_id,
        away_team_id,
        venue: competition
            .and_then(|c| c.get("venue"))
            .and_then(|v| str_field(v, "fullName")),
        source: Provider::EspnSite,
        last_synced_at: synced_at,
    })
}

/// Ids are sportsdata identifiers until canonical resolution.
pub fn from_sportsdata(raw: &Value, synced_at: DateTime<Utc>) -> Result<Game, TransformError> {
    if !raw.is_object() {
        return Err(malformed("expected a JSON object"));
    }
    let id = str_field(raw, "GameID").ok_or(TransformError::MissingKey {
        entity: EntityKind::Game,
        field: "GameID",
    })?;
    let home_team_id = str_field(raw, "HomeTeamID").ok_or(TransformError::MissingKey {
        entity: EntityKind::Game,
        field: "HomeTeamID",
    })?;
    let away_team_id = str_field(raw, "AwayTeamID").ok_or(TransformError::MissingKey {
        entity: EntityKind::Game,
        field: "AwayTeamID",
    })?;

    let scheduled_at = str_field(raw, "DateTimeUTC")
        .or_else(|| str_field(raw, "DateTime"))
        .or_else(|| str_field(raw, "Day"))
        .and_then(|d| parse_datetime(&d));
    let season = int_field(raw, "Season")
        .map(|s| s as i32)
        .or_else(|| scheduled_at.map(season_for))
        .ok_or_else(|| malformed("game has neither Season nor a date"))?;

    Ok(Game {
        id,
        season,
        season_type: int_field(raw, "SeasonType")
            .and_then(SeasonType::from_sportsdata_code)
            .unwrap_or_default(),
        scheduled_at,
        status: str_field(raw, "Status")
            .map(|s| GameStatus::parse(&s))
            .unwrap_or_default(),
        home_team_id,
        away_team_id,
        home_score: int_field(raw, "HomeTeamScore").map(|s| s as i32),
        away_score: int_field(raw, "AwayTeamScore").map(|s| s as i32),
        venue: None,
        source: Provider::SportsData,
        last_synced_at: synced_at,
    })
}

fn malformed(reason: &str) -> TransformError {
    TransformError::Malformed {
        entity: EntityKind::Game,
        reason: reason.to_string(),
    }
}
