//! sportsdata.io NBA v3 endpoints, keyed by API key.

use super::http::{HttpConfig, ProviderClient};
use crate::error::FetchError;
use crate::models::{Provider, SeasonType};
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://api.sportsdata.io/v3/nba";
pub const API_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

#[derive(Debug, Clone)]
pub struct SportsDataClient {
    http: ProviderClient,
}

impl SportsDataClient {
    pub fn new(base_url: &str, api_key: &str, config: &HttpConfig) -> Result<Self, FetchError> {
        Ok(Self {
            http: ProviderClient::new(Provider::SportsData, base_url, config)?
                .with_api_key(API_KEY_HEADER, api_key),
        })
    }

    pub fn http(&self) -> &ProviderClient {
        &self.http
    }

    pub async fn teams(&self) -> Result<Vec<Value>, FetchError> {
        let data = self.http.get_json("/scores/json/AllTeams", &[]).await?;
        Ok(as_list(data))
    }

    pub async fn players(&self) -> Result<Vec<Value>, FetchError> {
        let data = self.http.get_json("/scores/json/Players", &[]).await?;
        Ok(as_list(data))
    }

    pub async fn games(&self, season: i32, season_type: SeasonType) -> Result<Vec<Value>, FetchError> {
        let endpoint = format!("/scores/json/Games/{}", season_key(season, season_type));
        let data = self.http.get_json(&endpoint, &[]).await?;
        Ok(as_list(data))
    }
}

/// sportsdata season keys: `2024`, `2024PRE`, `2024POST`
pub fn season_key(season: i32, season_type: SeasonType) -> String {
    match season_type {
        SeasonType::Preseason => format!("{}PRE", season),
        SeasonType::Postseason | SeasonType::PlayIn => format!("{}POST", season),
        SeasonType::Regular => season.to_string(),
    }
}

fn as_list(data: Value) -> Vec<Value> {
    match data {
        Value::Array(items) => items,
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_key() {
        assert_eq!(season_key(2024, SeasonType::Regular), "2024");
        assert_eq!(season_key(2024, SeasonType::Preseason), "2024PRE");
        assert_eq!(season_key(2024, SeasonType::Postseason), "2024POST");
    }

    #[tokio::test]
    async fn test_api_key_header_is_sent() {
        let mut server = mockito::Server::new_async().await;
        let teams = server
            .mock("GET", "/scores/json/AllTeams")
            .match_header(API_KEY_HEADER, "secret")
            .with_status(200)
            .with_body(r#"[{"TeamID": 1, "Key": "MIL"}]"#)
            .create_async()
            .await;

        let client = SportsDataClient::new(&server.url(), "secret", &HttpConfig::default()).unwrap();
        let result = client.teams().await.unwrap();
        assert_eq!(result.len(), 1);
        teams.assert_async().await;
    }
}
