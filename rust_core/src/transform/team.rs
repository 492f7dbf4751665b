//! Team payloads: ESPN Site `team` objects and sportsdata `AllTeams` rows.

use super::{bool_field, str_field};
use crate::error::TransformError;
use crate::models::{EntityKind, Provider, Team};
use chrono::{DateTime, Utc};
use serde_json::Value;

pub fn from_espn_site(raw: &Value, synced_at: DateTime<Utc>) -> Result<Team, TransformError> {
    ensure_object(raw)?;
    let id = str_field(raw, "id").ok_or(TransformError::MissingKey {
        entity: EntityKind::Team,
        field: "id",
    })?;

    let logos = raw.get("logos").and_then(|v| v.as_array());
    let logo_with = |rel: &str| -> Option<String> {
        logos?
            .iter()
            .find(|logo| {
                logo.get("rel")
                    .and_then(|r| r.as_array())
                    .map(|rels| rels.iter().any(|r| r.as_str() == Some(rel)))
                    .unwrap_or(false)
            })
            .and_then(|logo| str_field(logo, "href"))
    };
    let logo_url = logo_with("default").or_else(|| {
        logos
            .and_then(|l| l.first())
            .and_then(|logo| str_field(logo, "href"))
    });

    Ok(Team {
        id,
        abbreviation: str_field(raw, "abbreviation"),
        display_name: str_field(raw, "displayName"),
        short_name: str_field(raw, "shortDisplayName"),
        location: str_field(raw, "location"),
        nickname: str_field(raw, "name").or_else(|| str_field(raw, "nickname")),
        conference: None,
        division: None,
        primary_color: str_field(raw, "color").map(|c| normalize_color(&c)),
        secondary_color: str_field(raw, "alternateColor").map(|c| normalize_color(&c)),
        logo_url,
        logo_dark_url: logo_with("dark"),
        is_active: bool_field(raw, "isActive").unwrap_or(true),
        source: Provider::EspnSite,
        last_synced_at: synced_at,
    })
}

/// `id` is the sportsdata `TeamID`; it is swapped for the canonical id
/// before the row is written.
pub fn from_sportsdata(raw: &Value, synced_at: DateTime<Utc>) -> Result<Team, TransformError> {
    ensure_object(raw)?;
    let id = str_field(raw, "TeamID").ok_or(TransformError::MissingKey {
        entity: EntityKind::Team,
        field: "TeamID",
    })?;

    let city = str_field(raw, "City");
    let name = str_field(raw, "Name");
    let display_name = match (&city, &name) {
        (Some(c), Some(n)) => Some(format!("{} {}", c, n)),
        (None, Some(n)) => Some(n.clone()),
        _ => None,
    };

    Ok(Team {
        id,
        abbreviation: str_field(raw, "Key"),
        display_name,
        short_name: name.clone(),
        location: city,
        nickname: name,
        conference: str_field(raw, "Conference"),
        division: str_field(raw, "Division"),
        primary_color: str_field(raw, "PrimaryColor").map(|c| normalize_color(&c)),
        secondary_color: str_field(raw, "SecondaryColor").map(|c| normalize_color(&c)),
        logo_url: str_field(raw, "WikipediaLogoUrl"),
        logo_dark_url: None,
        is_active: bool_field(raw, "Active").unwrap_or(true),
        source: Provider::SportsData,
        last_synced_at: synced_at,
    })
}

/// `#00471b` -> `00471B`
pub fn normalize_color(color: &str) -> String {
    color.trim().trim_start_matches('#').to_uppercase()
}

fn ensure_object(raw: &Value) -> Result<(), TransformError> {
    if raw.is_object() {
        Ok(())
    } else {
        Err(TransformError::Malformed {
            entity: EntityKind::Team,
            reason: "expected a JSON object".to_string(),
        })
    }
}
