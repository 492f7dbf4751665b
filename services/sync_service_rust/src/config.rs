use anyhow::{Context, Result};
use hoopsync_core::clients::{espn_core, espn_site, sportsdata, HttpConfig};
use hoopsync_core::db::DbPoolConfig;
use hoopsync_core::sync::DEFAULT_NEWS_LIMIT;
use hoopsync_core::IdSchemeRule;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,

    pub espn_site_base_url: String,
    pub espn_core_base_url: String,
    pub sportsdata_base_url: String,
    /// Only sportsdata jobs need it
    pub sportsdata_api_key: Option<String>,

    pub http: HttpConfig,
    pub db_pool: DbPoolConfig,
    pub id_scheme: IdSchemeRule,
    pub news_limit: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let espn_site_base_url =
            env::var("ESPN_SITE_BASE_URL").unwrap_or_else(|_| espn_site::DEFAULT_BASE_URL.to_string());
        let espn_core_base_url =
            env::var("ESPN_CORE_BASE_URL").unwrap_or_else(|_| espn_core::DEFAULT_BASE_URL.to_string());
        let sportsdata_base_url = env::var("SPORTSDATA_BASE_URL")
            .unwrap_or_else(|_| sportsdata::DEFAULT_BASE_URL.to_string());
        let sportsdata_api_key = env::var("SPORTSDATA_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let news_limit = match env::var("NEWS_LIMIT") {
            Ok(v) => v
                .parse()
                .with_context(|| format!("Invalid NEWS_LIMIT: {}", v))?,
            Err(_) => DEFAULT_NEWS_LIMIT,
        };

        Ok(Self {
            database_url,
            espn_site_base_url,
            espn_core_base_url,
            sportsdata_base_url,
            sportsdata_api_key,
            http: HttpConfig::from_env(),
            db_pool: DbPoolConfig::from_env(),
            id_scheme: IdSchemeRule::from_env(),
            news_limit,
        })
    }

    pub fn require_sportsdata_key(&self) -> Result<&str> {
        self.sportsdata_api_key
            .as_deref()
            .context("SPORTSDATA_API_KEY must be set for sportsdata jobs")
    }
}
