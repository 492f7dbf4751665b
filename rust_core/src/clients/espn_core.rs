//! ESPN Core API (`sports.core.api.espn.com`): `$ref`-paged athletes and
//! season statistics.

use super::http::{HttpConfig, ProviderClient};
use crate::cancel::CancelToken;
use crate::error::FetchError;
use crate::models::{Provider, SeasonType};
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str =
    "https://sports.core.api.espn.com/v2/sports/basketball/leagues/nba";

#[derive(Debug, Clone)]
pub struct EspnCoreClient {
    http: ProviderClient,
}

impl EspnCoreClient {
    pub fn new(base_url: &str, config: &HttpConfig) -> Result<Self, FetchError> {
        Ok(Self {
            http: ProviderClient::new(Provider::EspnCore, base_url, config)?,
        })
    }

    pub fn http(&self) -> &ProviderClient {
        &self.http
    }

    /// Every athlete reference across all pages, dereferenced.
    ///
    /// The listing itself failing is an error; a single athlete failing to
    /// dereference is reported in its slot.
    pub async fn athletes(
        &self,
        active_only: bool,
        cancel: &CancelToken,
    ) -> Result<Vec<(String, Result<Value, FetchError>)>, FetchError> {
        let mut params = vec![("limit", "1000".to_string())];
        if active_only {
            params.push(("active", "true".to_string()));
        }
        let items = self.http.list_items("/athletes", &params, cancel).await?;
        Ok(self.http.resolve_items(items, cancel).await)
    }

    pub async fn athlete_statistics(
        &self,
        season: i32,
        season_type: SeasonType,
        athlete_id: &str,
    ) -> Result<Value, FetchError> {
        let endpoint = format!(
            "/seasons/{}/types/{}/athletes/{}/statistics",
            season,
            season_type.espn_code(),
            athlete_id
        );
        self.http.get_json(&endpoint, &[]).await
    }

    pub async fn team_statistics(
        &self,
        season: i32,
        season_type: SeasonType,
        team_id: &str,
    ) -> Result<Value, FetchError> {
        let endpoint = format!(
            "/seasons/{}/types/{}/teams/{}/statistics",
            season,
            season_type.espn_code(),
            team_id
        );
        self.http.get_json(&endpoint, &[]).await
    }
}
