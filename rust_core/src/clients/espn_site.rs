//! ESPN Site API (`site.api.espn.com`): teams, scoreboard, news.

use super::http::{HttpConfig, ProviderClient};
use crate::error::FetchError;
use crate::models::{Provider, SeasonType};
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://site.api.espn.com/apis/site/v2/sports/basketball/nba";

#[derive(Debug, Clone)]
pub struct EspnSiteClient {
    http: ProviderClient,
}

impl EspnSiteClient {
    pub fn new(base_url: &str, config: &HttpConfig) -> Result<Self, FetchError> {
        Ok(Self {
            http: ProviderClient::new(Provider::EspnSite, base_url, config)?,
        })
    }

    pub fn http(&self) -> &ProviderClient {
        &self.http
    }

    /// Team objects from `sports[0].leagues[0].teams[].team`
    pub async fn teams(&self) -> Result<Vec<Value>, FetchError> {
        let data = self
            .http
            .get_json("/teams", &[("limit", "100".to_string())])
            .await?;
        Ok(extract_teams(&data))
    }

    /// Scoreboard events for a `YYYYMMDD` or `YYYYMMDD-YYYYMMDD` date range
    pub async fn scoreboard(
        &self,
        dates: &str,
        season_type: SeasonType,
    ) -> Result<Vec<Value>, FetchError> {
        let data = self
            .http
            .get_json(
                "/scoreboard",
                &[
                    ("dates", dates.to_string()),
                    ("seasontype", season_type.espn_code().to_string()),
                    ("limit", "1000".to_string()),
                ],
            )
            .await?;
        Ok(array_at(&data, "events"))
    }

    pub async fn news(&self, limit: u32) -> Result<Vec<Value>, FetchError> {
        let data = self
            .http
            .get_json("/news", &[("limit", limit.to_string())])
            .await?;
        Ok(array_at(&data, "articles"))
    }
}

fn extract_teams(data: &Value) -> Vec<Value> {
    data.pointer("/sports/0/leagues/0/teams")
        .and_then(|v| v.as_array())
        .map(|teams| {
            teams
                .iter()
                .map(|entry| entry.get("team").cloned().unwrap_or_else(|| entry.clone()))
                .collect()
        })
        .unwrap_or_default()
}

fn array_at(data: &Value, key: &str) -> Vec<Value> {
    data.get(key)
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_teams_unwraps_team_objects() {
        let data = json!({
            "sports": [{"leagues": [{"teams": [
                {"team": {"id": "15", "abbreviation": "MIL"}},
                {"team": {"id": "2", "abbreviation": "BOS"}}
            ]}]}]
        });
        let teams = extract_teams(&data);
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[0]["abbreviation"], "MIL");
    }

    #[test]
    fn test_extract_teams_tolerates_missing_structure() {
        assert!(extract_teams(&json!({"sports": []})).is_empty());
        assert!(array_at(&json!({}), "events").is_empty());
    }
}
