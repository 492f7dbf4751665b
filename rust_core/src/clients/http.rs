//! Generic provider HTTP client.
//!
//! Every provider call goes through `ProviderClient::get_json`, which applies
//! the per-call timeout, the provider's circuit breaker and bounded retry with
//! exponential backoff. Core-API style listings (`{ items: [{ $ref }] }`) are
//! paged with `list_items` and expanded with `resolve_items`.

use crate::cancel::CancelToken;
use crate::circuit_breaker::{ApiCircuitBreaker, ApiCircuitBreakerConfig, ApiCircuitState};
use crate::error::FetchError;
use crate::models::Provider;
use crate::retry::{execute_with_retry, RetryPolicy};
use futures_util::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on followed pages, in case a provider keeps returning `next`
const MAX_PAGES: u32 = 500;

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub circuit_breaker: ApiCircuitBreakerConfig,
    /// Concurrent `$ref` dereferences
    pub deref_concurrency: usize,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            circuit_breaker: ApiCircuitBreakerConfig::default(),
            deref_concurrency: 8,
            user_agent: format!("hoopsync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let env_u64 = |key: &str| std::env::var(key).ok().and_then(|v| v.parse::<u64>().ok());

        Self {
            timeout: env_u64("HTTP_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            retry: RetryPolicy {
                max_attempts: env_u64("HTTP_MAX_ATTEMPTS")
                    .map(|v| v as u32)
                    .unwrap_or(defaults.retry.max_attempts),
                base_backoff: env_u64("HTTP_BACKOFF_BASE_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.retry.base_backoff),
                max_backoff: env_u64("HTTP_BACKOFF_MAX_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.retry.max_backoff),
            },
            circuit_breaker: ApiCircuitBreakerConfig::from_env(),
            deref_concurrency: env_u64("DEREF_CONCURRENCY")
                .map(|v| v.max(1) as usize)
                .unwrap_or(defaults.deref_concurrency),
            user_agent: defaults.user_agent,
        }
    }
}

/// One page of a listing endpoint.
#[derive(Debug, Clone, Default)]
pub struct RawPage {
    pub items: Vec<Value>,
    pub page_index: u32,
    pub page_count: u32,
    /// Explicit link to the next page, when the provider sends one
    pub next: Option<String>,
}

impl RawPage {
    pub fn from_value(data: &Value) -> Self {
        let items = data
            .get("items")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        let page_index = data.get("pageIndex").and_then(|v| v.as_u64()).unwrap_or(1) as u32;
        let page_count = data.get("pageCount").and_then(|v| v.as_u64()).unwrap_or(1) as u32;
        let next = match data.get("next") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Object(o)) => o.get("$ref").and_then(|v| v.as_str()).map(String::from),
            _ => None,
        };

        Self {
            items,
            page_index,
            page_count,
            next,
        }
    }

    pub fn has_more(&self) -> bool {
        self.next.is_some() || self.page_index < self.page_count
    }
}

/// Pull the `$ref` link out of a Core API indirection object.
pub fn ref_of(item: &Value) -> Option<&str> {
    item.get("$ref").and_then(|v| v.as_str())
}

#[derive(Clone)]
pub struct ProviderClient {
    provider: Provider,
    client: Client,
    base_url: String,
    api_key: Option<(&'static str, String)>,
    retry: RetryPolicy,
    deref_concurrency: usize,
    circuit_breaker: Arc<ApiCircuitBreaker>,
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("circuit_breaker_state", &self.circuit_breaker.state())
            .finish()
    }
}

impl ProviderClient {
    pub fn new(
        provider: Provider,
        base_url: impl Into<String>,
        config: &HttpConfig,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(FetchError::ClientBuild)?;

        Ok(Self {
            provider,
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            retry: config.retry,
            deref_concurrency: config.deref_concurrency.max(1),
            circuit_breaker: Arc::new(ApiCircuitBreaker::new(
                provider,
                config.circuit_breaker.clone(),
            )),
        })
    }

    /// Send an API key header with every request
    pub fn with_api_key(mut self, header: &'static str, key: impl Into<String>) -> Self {
        self.api_key = Some((header, key.into()));
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn deref_concurrency(&self) -> usize {
        self.deref_concurrency
    }

    pub fn circuit_state(&self) -> ApiCircuitState {
        self.circuit_breaker.state()
    }

    /// Endpoints are relative to the base URL unless already absolute.
    pub fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
        }
    }

    /// GET a JSON document with retry and circuit breaking.
    pub async fn get_json(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Value, FetchError> {
        let url = self.url_for(endpoint);
        let label = format!("{} GET {}", self.provider, url);

        execute_with_retry(
            &self.retry,
            &label,
            || self.get_once(&url, params),
            FetchError::is_transient,
        )
        .await
    }

    async fn get_once(&self, url: &str, params: &[(&str, String)]) -> Result<Value, FetchError> {
        if !self.circuit_breaker.is_available() {
            return Err(FetchError::CircuitOpen {
                provider: self.provider,
            });
        }

        let result = self.send(url, params).await;

        match &result {
            Ok(_) => self.circuit_breaker.record_success(),
            Err(e) if e.counts_against_provider() => self.circuit_breaker.record_failure(),
            Err(_) => {}
        }

        result
    }

    async fn send(&self, url: &str, params: &[(&str, String)]) -> Result<Value, FetchError> {
        let mut request = self.client.get(url);
        if !params.is_empty() {
            request = request.query(params);
        }
        if let Some((header, key)) = &self.api_key {
            request = request.header(*header, key);
        }

        let resp = request.send().await.map_err(|e| classify_reqwest(url, e))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(|e| classify_reqwest(url, e))?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    pub async fn fetch_page(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<RawPage, FetchError> {
        let data = self.get_json(endpoint, params).await?;
        Ok(RawPage::from_value(&data))
    }

    /// Follow a `$ref` indirection to the full object.
    pub async fn dereference(&self, reference: &str) -> Result<Value, FetchError> {
        if !reference.starts_with("http://") && !reference.starts_with("https://") {
            return Err(FetchError::InvalidUrl(reference.to_string()));
        }
        self.get_json(reference, &[]).await
    }

    /// Collect the items of every page of a listing, in provider order.
    ///
    /// Follows an explicit `next` link when present, otherwise increments the
    /// `page` parameter until `pageIndex == pageCount`.
    pub async fn list_items(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        cancel: &CancelToken,
    ) -> Result<Vec<Value>, FetchError> {
        let mut items = Vec::new();
        let mut next_link: Option<String> = None;
        let mut page_number: u32 = 1;

        for _ in 0..MAX_PAGES {
            if cancel.is_cancelled() {
                debug!("{} listing {} cancelled after {} items", self.provider, endpoint, items.len());
                break;
            }

            let page = match &next_link {
                Some(link) => self.fetch_page(link, &[]).await?,
                None => {
                    let mut page_params = params.to_vec();
                    page_params.push(("page", page_number.to_string()));
                    self.fetch_page(endpoint, &page_params).await?
                }
            };

            let page_was_empty = page.items.is_empty();
            let has_more = page.has_more();
            let page_index = page.page_index;
            let explicit_next = page.next.clone();
            items.extend(page.items);

            if !has_more || page_was_empty {
                break;
            }
            match explicit_next {
                Some(link) => next_link = Some(link),
                None => {
                    next_link = None;
                    page_number = page_index.max(page_number) + 1;
                }
            }
        }

        Ok(items)
    }

    /// Expand listing items: `$ref` items are fetched (bounded concurrency,
    /// order preserved), inline objects are passed through.
    ///
    /// Each entry carries the reference (or `inline:<n>`) for diagnostics.
    pub async fn resolve_items(
        &self,
        items: Vec<Value>,
        cancel: &CancelToken,
    ) -> Vec<(String, Result<Value, FetchError>)> {
        let total = items.len();
        let results: Vec<Option<(String, Result<Value, FetchError>)>> = stream::iter(
            items.into_iter().enumerate(),
        )
        .map(|(i, item)| async move {
            if cancel.is_cancelled() {
                return None;
            }
            match ref_of(&item).map(String::from) {
                Some(reference) => {
                    let result = self.dereference(&reference).await;
                    if let Err(e) = &result {
                        warn!("{} failed to dereference {}: {}", self.provider, reference, e);
                    }
                    Some((reference, result))
                }
                None => Some((format!("inline:{}", i), Ok(item))),
            }
        })
        .buffered(self.deref_concurrency)
        .collect()
        .await;

        let resolved: Vec<_> = results.into_iter().flatten().collect();
        if resolved.len() < total {
            debug!(
                "{} resolved {}/{} items before cancellation",
                self.provider,
                resolved.len(),
                total
            );
        }
        resolved
    }
}

fn classify_reqwest(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if e.is_builder() {
        FetchError::InvalidUrl(url.to_string())
    } else {
        FetchError::Network {
            url: url.to_string(),
            source: e,
        }
    }
}
