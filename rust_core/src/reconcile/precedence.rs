//! Provider precedence merge.
//!
//! ESPN Site outranks ESPN Core, which outranks sportsdata.io. A provider at
//! or above the stored row's source replaces the row outright, so its `None`
//! clears a field. The exception is a field the provider has no counterpart
//! for at all: that `None` means "not sent" and the stored value stays.
//! A lower-ranked provider only fills fields that are still `None` and never
//! takes over the row's `source`.

use crate::models::{Game, Player, Provider, Team};
use std::fmt::Debug;
use tracing::debug;

/// Whether `incoming` may overwrite data recorded by `stored`.
pub fn outranks_or_equals(incoming: Provider, stored: Provider) -> bool {
    incoming.rank() <= stored.rank()
}

fn fill<T: PartialEq + Debug>(id: &str, field: &str, stored: &mut Option<T>, incoming: Option<T>) {
    match (stored.as_ref(), incoming) {
        (None, Some(value)) => *stored = Some(value),
        (Some(current), Some(value)) if *current != value => {
            debug!(
                "{}: keeping {} {:?}, lower-precedence provider sent {:?}",
                id, field, current, value
            );
        }
        _ => {}
    }
}

/// ESPN Site team documents have no conference or division.
fn sends_team_alignment(provider: Provider) -> bool {
    !matches!(provider, Provider::EspnSite)
}

pub fn merge_team(existing: Option<&Team>, incoming: Team) -> Team {
    let Some(stored) = existing else {
        return incoming;
    };
    if outranks_or_equals(incoming.source, stored.source) {
        let mut merged = incoming;
        if !sends_team_alignment(merged.source) {
            merged.conference = stored.conference.clone();
            merged.division = stored.division.clone();
        }
        return merged;
    }

    let mut merged = stored.clone();
    let id = stored.id.as_str();
    fill(id, "abbreviation", &mut merged.abbreviation, incoming.abbreviation);
    fill(id, "display_name", &mut merged.display_name, incoming.display_name);
    fill(id, "short_name", &mut merged.short_name, incoming.short_name);
    fill(id, "location", &mut merged.location, incoming.location);
    fill(id, "nickname", &mut merged.nickname, incoming.nickname);
    fill(id, "conference", &mut merged.conference, incoming.conference);
    fill(id, "division", &mut merged.division, incoming.division);
    fill(id, "primary_color", &mut merged.primary_color, incoming.primary_color);
    fill(id, "secondary_color", &mut merged.secondary_color, incoming.secondary_color);
    fill(id, "logo_url", &mut merged.logo_url, incoming.logo_url);
    fill(id, "logo_dark_url", &mut merged.logo_dark_url, incoming.logo_dark_url);
    merged.last_synced_at = incoming.last_synced_at;
    merged
}

pub fn merge_player(existing: Option<&Player>, incoming: Player) -> Player {
    let Some(stored) = existing else {
        return incoming;
    };
    if outranks_or_equals(incoming.source, stored.source) {
        return incoming;
    }

    let mut merged = stored.clone();
    let id = stored.id.as_str();
    fill(id, "first_name", &mut merged.first_name, incoming.first_name);
    fill(id, "last_name", &mut merged.last_name, incoming.last_name);
    fill(id, "full_name", &mut merged.full_name, incoming.full_name);
    fill(id, "position", &mut merged.position, incoming.position);
    fill(id, "jersey", &mut merged.jersey, incoming.jersey);
    fill(id, "team_id", &mut merged.team_id, incoming.team_id);
    fill(id, "birth_date", &mut merged.birth_date, incoming.birth_date);
    fill(id, "contract", &mut merged.contract, incoming.contract);
    fill(id, "alternate_ids", &mut merged.alternate_ids, incoming.alternate_ids);

    // Number and display string travel together
    if merged.height_inches.is_none() {
        merged.height_inches = incoming.height_inches;
        merged.height_display = incoming.height_display;
    }
    if merged.weight_lbs.is_none() {
        merged.weight_lbs = incoming.weight_lbs;
        merged.weight_display = incoming.weight_display;
    }

    merged.last_synced_at = incoming.last_synced_at;
    merged
}

pub fn merge_game(existing: Option<&Game>, incoming: Game) -> Game {
    let Some(stored) = existing else {
        return incoming;
    };
    if outranks_or_equals(incoming.source, stored.source) {
        return incoming;
    }

    let mut merged = stored.clone();
    let id = stored.id.as_str();
    fill(id, "scheduled_at", &mut merged.scheduled_at, incoming.scheduled_at);
    fill(id, "home_score", &mut merged.home_score, incoming.home_score);
    fill(id, "away_score", &mut merged.away_score, incoming.away_score);
    fill(id, "venue", &mut merged.venue, incoming.venue);
    merged.last_synced_at = incoming.last_synced_at;
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn team(source: Provider, name: Option<&str>, conference: Option<&str>) -> Team {
        Team {
            id: "15".to_string(),
            abbreviation: Some("MIL".to_string()),
            display_name: name.map(String::from),
            short_name: None,
            location: None,
            nickname: None,
            conference: conference.map(String::from),
            division: None,
            primary_color: Some("00471B".to_string()),
            secondary_color: None,
            logo_url: None,
            logo_dark_url: None,
            is_active: true,
            source,
            last_synced_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_row_takes_incoming() {
        let incoming = team(Provider::SportsData, Some("Milwaukee Bucks"), None);
        assert_eq!(merge_team(None, incoming.clone()), incoming);
    }

    #[test]
    fn test_lower_precedence_only_fills_gaps() {
        let stored = team(Provider::EspnSite, Some("Milwaukee Bucks"), None);
        let incoming = team(Provider::SportsData, Some("Bucks"), Some("Eastern"));
        let merged = merge_team(Some(&stored), incoming);
        assert_eq!(merged.display_name.as_deref(), Some("Milwaukee Bucks"));
        assert_eq!(merged.conference.as_deref(), Some("Eastern"));
        assert_eq!(merged.source, Provider::EspnSite);
    }

    #[test]
    fn test_higher_precedence_overwrites() {
        let stored = team(Provider::SportsData, Some("Bucks"), Some("Eastern"));
        let incoming = team(Provider::EspnSite, Some("Milwaukee Bucks"), None);
        let merged = merge_team(Some(&stored), incoming);
        assert_eq!(merged.display_name.as_deref(), Some("Milwaukee Bucks"));
        assert_eq!(merged.conference.as_deref(), Some("Eastern"));
        assert_eq!(merged.source, Provider::EspnSite);
    }

    #[test]
    fn test_same_provider_clears_field() {
        let stored = team(Provider::SportsData, Some("Bucks"), Some("Eastern"));
        let incoming = team(Provider::SportsData, None, None);
        let merged = merge_team(Some(&stored), incoming);
        assert_eq!(merged.display_name, None);
        assert_eq!(merged.conference, None);
    }

    #[test]
    fn test_espn_site_keeps_conference_it_never_sends() {
        let mut stored = team(Provider::EspnSite, Some("Milwaukee Bucks"), Some("Eastern"));
        stored.division = Some("Central".to_string());
        let incoming = team(Provider::EspnSite, None, None);
        let merged = merge_team(Some(&stored), incoming);
        assert_eq!(merged.display_name, None);
        assert_eq!(merged.conference.as_deref(), Some("Eastern"));
        assert_eq!(merged.division.as_deref(), Some("Central"));
    }

    #[test]
    fn test_game_scores_filled_from_lower_precedence() {
        let stored = Game {
            id: "401584793".to_string(),
            season: 2025,
            season_type: Default::default(),
            scheduled_at: None,
            status: Default::default(),
            home_team_id: "2".to_string(),
            away_team_id: "18".to_string(),
            home_score: None,
            away_score: Some(100),
            venue: None,
            source: Provider::EspnSite,
            last_synced_at: Utc::now(),
        };
        let mut incoming = stored.clone();
        incoming.source = Provider::SportsData;
        incoming.home_score = Some(132);
        incoming.away_score = Some(109);
        let merged = merge_game(Some(&stored), incoming);
        assert_eq!(merged.home_score, Some(132));
        assert_eq!(merged.away_score, Some(100));
    }
}
