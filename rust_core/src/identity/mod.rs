//! Canonical identifiers.
//!
//! ESPN identifiers are canonical. Records from other providers are mapped to
//! a canonical id before anything is written, through the `external_ids` map
//! or, failing that, by matching against rows already stored. A record that
//! cannot be mapped is never written under its foreign id.

pub mod migration;

pub use migration::{IdentityMigrator, MigrationReport};

use crate::db::SyncStore;
use crate::error::StoreResult;
use crate::models::{EntityKind, Game, Player, Provider, Team};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use strsim::jaro_winkler;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Minimum Jaro-Winkler similarity for a player name match
pub const NAME_MATCH_THRESHOLD: f64 = 0.95;

/// Default minimum length of a current-scheme game id
pub const DEFAULT_CURRENT_MIN_LEN: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdScheme {
    Legacy,
    Current,
}

/// Structural rule separating legacy ids from current ones: current ids are
/// numeric and at least `current_min_len` digits long.
#[derive(Debug, Clone, Copy)]
pub struct IdSchemeRule {
    pub current_min_len: usize,
}

impl Default for IdSchemeRule {
    fn default() -> Self {
        Self {
            current_min_len: DEFAULT_CURRENT_MIN_LEN,
        }
    }
}

impl IdSchemeRule {
    pub fn from_env() -> Self {
        Self {
            current_min_len: std::env::var("GAME_ID_CURRENT_MIN_LEN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CURRENT_MIN_LEN),
        }
    }

    pub fn classify(&self, id: &str) -> IdScheme {
        let id = id.trim();
        if id.len() >= self.current_min_len && id.chars().all(|c| c.is_ascii_digit()) {
            IdScheme::Current
        } else {
            IdScheme::Legacy
        }
    }
}

type AliasMap = HashMap<&'static str, &'static str>;

/// Provider abbreviation variants -> ESPN abbreviation
fn abbreviation_aliases() -> &'static AliasMap {
    static ALIASES: OnceLock<AliasMap> = OnceLock::new();
    ALIASES.get_or_init(|| {
        HashMap::from([
            ("PHO", "PHX"),
            ("UTA", "UTAH"),
            ("WAS", "WSH"),
            ("GSW", "GS"),
            ("NYK", "NY"),
            ("SAS", "SA"),
            ("NOP", "NO"),
            ("BRK", "BKN"),
        ])
    })
}

pub fn canonical_abbreviation(abbr: &str) -> String {
    let upper = abbr.trim().to_uppercase();
    abbreviation_aliases()
        .get(upper.as_str())
        .map(|a| a.to_string())
        .unwrap_or(upper)
}

/// Lowercase, punctuation dropped, generational suffixes removed.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .filter(|w| !matches!(*w, "jr" | "sr" | "ii" | "iii" | "iv"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Maps provider identifiers to canonical ones for the duration of a run.
///
/// Stored teams, players and games are loaded once, on first use.
pub struct CanonicalIdResolver {
    store: Arc<dyn SyncStore>,
    teams: OnceCell<Vec<Team>>,
    players: OnceCell<Vec<Player>>,
    games: OnceCell<Vec<Game>>,
}

impl CanonicalIdResolver {
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self {
            store,
            teams: OnceCell::new(),
            players: OnceCell::new(),
            games: OnceCell::new(),
        }
    }

    async fn teams(&self) -> StoreResult<&Vec<Team>> {
        self.teams.get_or_try_init(|| self.store.list_teams()).await
    }

    async fn players(&self) -> StoreResult<&Vec<Player>> {
        self.players.get_or_try_init(|| self.store.list_players()).await
    }

    async fn games(&self) -> StoreResult<&Vec<Game>> {
        self.games.get_or_try_init(|| self.store.list_games()).await
    }

    /// Recorded mapping only, no matching. Canonical providers map to themselves.
    pub async fn lookup(
        &self,
        provider: Provider,
        kind: EntityKind,
        external_id: &str,
    ) -> StoreResult<Option<String>> {
        if provider.issues_canonical_ids() {
            return Ok(Some(external_id.to_string()));
        }
        self.store.lookup_external_id(provider, kind, external_id).await
    }

    /// Canonical id that replaced a retired id during identity migration.
    pub async fn replacement(
        &self,
        provider: Provider,
        kind: EntityKind,
        retired_id: &str,
    ) -> StoreResult<Option<String>> {
        self.store.lookup_external_id(provider, kind, retired_id).await
    }

    async fn remember(
        &self,
        provider: Provider,
        kind: EntityKind,
        external_id: &str,
        canonical_id: &str,
    ) -> StoreResult<()> {
        debug!("{} {} {} -> canonical {}", provider, kind, external_id, canonical_id);
        self.store
            .save_external_id(provider, kind, external_id, canonical_id)
            .await
    }

    pub async fn resolve_team(
        &self,
        provider: Provider,
        external_id: &str,
        abbreviation: Option<&str>,
    ) -> StoreResult<Option<String>> {
        if let Some(id) = self.lookup(provider, EntityKind::Team, external_id).await? {
            return Ok(Some(id));
        }
        let Some(abbr) = abbreviation else {
            return Ok(None);
        };

        let wanted = canonical_abbreviation(abbr);
        let found = self.teams().await?.iter().find(|t| {
            t.abbreviation
                .as_deref()
                .map(|a| canonical_abbreviation(a) == wanted)
                .unwrap_or(false)
        });

        match found {
            Some(team) => {
                self.remember(provider, EntityKind::Team, external_id, &team.id).await?;
                Ok(Some(team.id.clone()))
            }
            None => Ok(None),
        }
    }

    /// `team_id` is the player's canonical team, when known; it breaks ties
    /// between equally similar names.
    pub async fn resolve_player(
        &self,
        provider: Provider,
        external_id: &str,
        full_name: Option<&str>,
        team_id: Option<&str>,
    ) -> StoreResult<Option<String>> {
        if let Some(id) = self.lookup(provider, EntityKind::Player, external_id).await? {
            return Ok(Some(id));
        }
        let Some(name) = full_name.map(normalize_name).filter(|n| !n.is_empty()) else {
            return Ok(None);
        };

        let mut candidates: Vec<(f64, &Player)> = self
            .players()
            .await?
            .iter()
            .filter_map(|p| {
                let stored = normalize_name(p.full_name.as_deref()?);
                let score = jaro_winkler(&name, &stored);
                (score >= NAME_MATCH_THRESHOLD).then_some((score, p))
            })
            .collect();

        if candidates.len() > 1 {
            if let Some(team_id) = team_id {
                let same_team: Vec<(f64, &Player)> = candidates
                    .iter()
                    .copied()
                    .filter(|(_, p)| p.team_id.as_deref() == Some(team_id))
                    .collect();
                if !same_team.is_empty() {
                    candidates = same_team;
                }
            }
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

        let best = match candidates.as_slice() {
            [] => return Ok(None),
            [(_, only)] => *only,
            [(top, first), (second, _), ..] if top > second => *first,
            _ => {
                warn!(
                    "{} player {} ({}) matches several stored players, not mapping",
                    provider, external_id, name
                );
                return Ok(None);
            }
        };

        self.remember(provider, EntityKind::Player, external_id, &best.id).await?;
        Ok(Some(best.id.clone()))
    }

    /// Team ids must already be canonical.
    pub async fn resolve_game(
        &self,
        provider: Provider,
        external_id: &str,
        home_team_id: &str,
        away_team_id: &str,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Option<String>> {
        if let Some(id) = self.lookup(provider, EntityKind::Game, external_id).await? {
            return Ok(Some(id));
        }
        let Some(when) = scheduled_at else {
            return Ok(None);
        };

        let matches: Vec<&Game> = self
            .games()
            .await?
            .iter()
            .filter(|g| same_matchup(g, home_team_id, away_team_id, when))
            .collect();

        match matches.as_slice() {
            [game] => {
                self.remember(provider, EntityKind::Game, external_id, &game.id).await?;
                Ok(Some(game.id.clone()))
            }
            [] => Ok(None),
            _ => {
                warn!(
                    "{} game {} matches {} stored games, not mapping",
                    provider,
                    external_id,
                    matches.len()
                );
                Ok(None)
            }
        }
    }
}

/// Same home team, same away team, same UTC calendar day.
pub fn same_matchup(game: &Game, home_team_id: &str, away_team_id: &str, when: DateTime<Utc>) -> bool {
    game.home_team_id == home_team_id
        && game.away_team_id == away_team_id
        && game
            .scheduled_at
            .map(|t| t.date_naive() == when.date_naive())
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use chrono::TimeZone;

    fn team(id: &str, abbr: &str) -> Team {
        Team {
            id: id.to_string(),
            abbreviation: Some(abbr.to_string()),
            display_name: None,
            short_name: None,
            location: None,
            nickname: None,
            conference: None,
            division: None,
            primary_color: None,
            secondary_color: None,
            logo_url: None,
            logo_dark_url: None,
            is_active: true,
            source: Provider::EspnSite,
            last_synced_at: Utc::now(),
        }
    }

    fn player(id: &str, name: &str, team_id: &str) -> Player {
        Player {
            id: id.to_string(),
            first_name: None,
            last_name: None,
            full_name: Some(name.to_string()),
            position: None,
            jersey: None,
            team_id: Some(team_id.to_string()),
            height_inches: None,
            height_display: None,
            weight_lbs: None,
            weight_display: None,
            birth_date: None,
            contract: None,
            alternate_ids: None,
            is_active: true,
            source: Provider::EspnCore,
            last_synced_at: Utc::now(),
        }
    }

    #[test]
    fn test_classify() {
        let rule = IdSchemeRule::default();
        assert_eq!(rule.classify("401584793"), IdScheme::Current);
        assert_eq!(rule.classify("12345"), IdScheme::Legacy);
        assert_eq!(rule.classify("nba-2024-bos-nyk"), IdScheme::Legacy);
        assert_eq!(IdSchemeRule { current_min_len: 5 }.classify("12345"), IdScheme::Current);
    }

    #[test]
    fn test_normalization() {
        assert_eq!(canonical_abbreviation("pho"), "PHX");
        assert_eq!(canonical_abbreviation("MIL"), "MIL");
        assert_eq!(normalize_name("Jaren Jackson Jr."), "jaren jackson");
        assert_eq!(normalize_name("  Nikola   Jokić "), "nikola jokić");
    }

    #[tokio::test]
    async fn test_espn_ids_are_canonical() {
        let resolver = CanonicalIdResolver::new(Arc::new(MemoryStore::new()));
        let id = resolver.resolve_team(Provider::EspnSite, "15", None).await.unwrap();
        assert_eq!(id.as_deref(), Some("15"));
    }

    #[tokio::test]
    async fn test_team_resolved_by_alias_and_remembered() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_team(&team("21", "PHX")).await.unwrap();
        let resolver = CanonicalIdResolver::new(store.clone());

        let id = resolver
            .resolve_team(Provider::SportsData, "29", Some("PHO"))
            .await
            .unwrap();
        assert_eq!(id.as_deref(), Some("21"));
        assert_eq!(
            store
                .lookup_external_id(Provider::SportsData, EntityKind::Team, "29")
                .await
                .unwrap()
                .as_deref(),
            Some("21")
        );
    }

    #[tokio::test]
    async fn test_player_fuzzy_match() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_team(&team("15", "MIL")).await.unwrap();
        store
            .upsert_player(&player("3032977", "Giannis Antetokounmpo", "15"))
            .await
            .unwrap();
        let resolver = CanonicalIdResolver::new(store.clone());

        let hit = resolver
            .resolve_player(Provider::SportsData, "20000441", Some("Giannis Antetokounmpo"), None)
            .await
            .unwrap();
        assert_eq!(hit.as_deref(), Some("3032977"));

        let miss = resolver
            .resolve_player(Provider::SportsData, "1", Some("Someone Else"), None)
            .await
            .unwrap();
        assert_eq!(miss, None);
    }

    #[tokio::test]
    async fn test_game_matched_by_teams_and_day() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_team(&team("2", "BOS")).await.unwrap();
        store.upsert_team(&team("18", "NY")).await.unwrap();
        let tipoff = Utc.with_ymd_and_hms(2024, 10, 22, 23, 30, 0).unwrap();
        store
            .upsert_game(&Game {
                id: "401584793".to_string(),
                season: 2025,
                season_type: Default::default(),
                scheduled_at: Some(tipoff),
                status: Default::default(),
                home_team_id: "2".to_string(),
                away_team_id: "18".to_string(),
                home_score: None,
                away_score: None,
                venue: None,
                source: Provider::EspnSite,
                last_synced_at: Utc::now(),
            })
            .await
            .unwrap();
        let resolver = CanonicalIdResolver::new(store);

        let later_same_day = Utc.with_ymd_and_hms(2024, 10, 22, 23, 45, 0).unwrap();
        let id = resolver
            .resolve_game(Provider::SportsData, "20812", "2", "18", Some(later_same_day))
            .await
            .unwrap();
        assert_eq!(id.as_deref(), Some("401584793"));

        let reversed = resolver
            .resolve_game(Provider::SportsData, "20813", "18", "2", Some(later_same_day))
            .await
            .unwrap();
        assert_eq!(reversed, None);
    }
}
