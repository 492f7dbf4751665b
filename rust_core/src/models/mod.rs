//! Local entity shapes that the sync jobs reconcile into the datastore.
//!
//! Every row is keyed by a canonical identifier (see `identity`). Optional
//! fields are `None` when the provider payload did not carry them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// External data providers, in descending precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    EspnSite,
    EspnCore,
    SportsData,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::EspnSite => "espn_site",
            Provider::EspnCore => "espn_core",
            Provider::SportsData => "sportsdata",
        }
    }

    /// Lower rank wins when two providers disagree on a field.
    pub fn rank(&self) -> u8 {
        match self {
            Provider::EspnSite => 0,
            Provider::EspnCore => 1,
            Provider::SportsData => 2,
        }
    }

    /// Whether this provider's identifiers are canonical as-is.
    pub fn issues_canonical_ids(&self) -> bool {
        matches!(self, Provider::EspnSite | Provider::EspnCore)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "espn_site" | "espn-site" | "espn" => Some(Provider::EspnSite),
            "espn_core" | "espn-core" => Some(Provider::EspnCore),
            "sportsdata" | "sportsdata.io" | "sportsdataio" => Some(Provider::SportsData),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity types handled by the pipeline. Also the key for run locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Team,
    Player,
    Game,
    PlayerSeasonStat,
    TeamStatistic,
    PlayerNews,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Team => "team",
            EntityKind::Player => "player",
            EntityKind::Game => "game",
            EntityKind::PlayerSeasonStat => "player_season_stat",
            EntityKind::TeamStatistic => "team_statistic",
            EntityKind::PlayerNews => "player_news",
        }
    }

    /// Stable advisory lock key
    pub fn lock_key(&self) -> i64 {
        // "hoop" prefix keeps us clear of other advisory lock users
        0x686f_6f70_0000 + *self as i64
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Season type, numbered the way ESPN numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeasonType {
    Preseason,
    #[default]
    Regular,
    Postseason,
    PlayIn,
}

impl SeasonType {
    pub fn espn_code(&self) -> i32 {
        match self {
            SeasonType::Preseason => 1,
            SeasonType::Regular => 2,
            SeasonType::Postseason => 3,
            SeasonType::PlayIn => 5,
        }
    }

    pub fn from_espn_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(SeasonType::Preseason),
            2 => Some(SeasonType::Regular),
            3 => Some(SeasonType::Postseason),
            5 => Some(SeasonType::PlayIn),
            _ => None,
        }
    }

    /// sportsdata.io: 1 regular, 2 preseason, 3 postseason
    pub fn from_sportsdata_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(SeasonType::Regular),
            2 => Some(SeasonType::Preseason),
            3 => Some(SeasonType::Postseason),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pre" | "preseason" | "1" => Some(SeasonType::Preseason),
            "regular" | "reg" | "2" => Some(SeasonType::Regular),
            "post" | "postseason" | "playoffs" | "3" => Some(SeasonType::Postseason),
            "play-in" | "playin" | "5" => Some(SeasonType::PlayIn),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    #[default]
    Scheduled,
    Live,
    Finished,
    Postponed,
    Cancelled,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Scheduled => "scheduled",
            GameStatus::Live => "live",
            GameStatus::Finished => "finished",
            GameStatus::Postponed => "postponed",
            GameStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a provider status string ("STATUS_FINAL", "InProgress", "finished", ...)
    pub fn parse(status: &str) -> Self {
        let status_lower = status.to_lowercase();

        if status_lower.contains("in_progress")
            || status_lower.contains("inprogress")
            || status_lower.contains("halftime")
            || status_lower.contains("end_period")
            || status_lower == "live"
        {
            GameStatus::Live
        } else if status_lower.contains("final")
            || status_lower.contains("completed")
            || status_lower.contains("finished")
            || status_lower == "f/ot"
        {
            GameStatus::Finished
        } else if status_lower.contains("postponed") {
            GameStatus::Postponed
        } else if status_lower.contains("cancel") {
            GameStatus::Cancelled
        } else {
            GameStatus::Scheduled
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub abbreviation: Option<String>,
    pub display_name: Option<String>,
    pub short_name: Option<String>,
    pub location: Option<String>,
    pub nickname: Option<String>,
    pub conference: Option<String>,
    pub division: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub logo_url: Option<String>,
    pub logo_dark_url: Option<String>,
    pub is_active: bool,
    pub source: Provider,
    pub last_synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub position: Option<String>,
    pub jersey: Option<String>,
    /// `None` for free agents
    pub team_id: Option<String>,
    pub height_inches: Option<i32>,
    pub height_display: Option<String>,
    pub weight_lbs: Option<i32>,
    pub weight_display: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub contract: Option<serde_json::Value>,
    pub alternate_ids: Option<serde_json::Value>,
    pub is_active: bool,
    pub source: Provider,
    pub last_synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub season: i32,
    pub season_type: SeasonType,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: GameStatus,
    pub home_team_id: String,
    pub away_team_id: String,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub venue: Option<String>,
    pub source: Provider,
    pub last_synced_at: DateTime<Utc>,
}

/// Owner of a stat line: a player season stat or a team statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatOwner {
    Player,
    Team,
}

impl StatOwner {
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            StatOwner::Player => EntityKind::PlayerSeasonStat,
            StatOwner::Team => EntityKind::TeamStatistic,
        }
    }

    /// The entity the stat line must reference.
    pub fn parent_kind(&self) -> EntityKind {
        match self {
            StatOwner::Player => EntityKind::Player,
            StatOwner::Team => EntityKind::Team,
        }
    }
}

/// Natural composite key for stat lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StatKey {
    pub entity_id: String,
    pub season: i32,
    pub season_type: i32,
    pub category: String,
    pub stat_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatLine {
    pub owner: StatOwner,
    pub entity_id: String,
    pub season: i32,
    pub season_type: SeasonType,
    pub category: String,
    pub stat_name: String,
    pub value: Option<f64>,
    pub display_value: Option<String>,
    pub last_synced_at: DateTime<Utc>,
}

impl StatLine {
    pub fn key(&self) -> StatKey {
        StatKey {
            entity_id: self.entity_id.clone(),
            season: self.season,
            season_type: self.season_type.espn_code(),
            category: self.category.clone(),
            stat_name: self.stat_name.clone(),
        }
    }

    /// Human-readable identifier for logs and failure reports
    pub fn label(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.entity_id,
            self.season,
            self.season_type.espn_code(),
            self.category,
            self.stat_name
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerNews {
    pub id: String,
    pub headline: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub player_id: Option<String>,
    pub team_id: Option<String>,
    pub source: Provider,
    pub last_synced_at: DateTime<Utc>,
}

/// A transformed record of any entity type, ready for reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalRecord {
    Team(Team),
    Player(Player),
    Game(Game),
    Stat(StatLine),
    News(PlayerNews),
}

impl LocalRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            LocalRecord::Team(_) => EntityKind::Team,
            LocalRecord::Player(_) => EntityKind::Player,
            LocalRecord::Game(_) => EntityKind::Game,
            LocalRecord::Stat(s) => s.owner.entity_kind(),
            LocalRecord::News(_) => EntityKind::PlayerNews,
        }
    }

    /// The stable key this record is upserted against.
    pub fn key(&self) -> String {
        match self {
            LocalRecord::Team(t) => t.id.clone(),
            LocalRecord::Player(p) => p.id.clone(),
            LocalRecord::Game(g) => g.id.clone(),
            LocalRecord::Stat(s) => s.label(),
            LocalRecord::News(n) => n.id.clone(),
        }
    }
}
