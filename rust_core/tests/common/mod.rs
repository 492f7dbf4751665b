#![allow(dead_code)]

use hoopsync_core::circuit_breaker::ApiCircuitBreakerConfig;
use hoopsync_core::clients::HttpConfig;
use hoopsync_core::{CancelToken, MemoryStore, RetryPolicy, SyncOrchestrator};
use mockito::{Matcher, Mock, ServerGuard};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub fn http_config() -> HttpConfig {
    HttpConfig {
        timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_attempts: 2,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        },
        circuit_breaker: ApiCircuitBreakerConfig {
            failure_threshold: 50,
            recovery_timeout: Duration::from_secs(60),
            success_threshold: 1,
        },
        deref_concurrency: 4,
        user_agent: "hoopsync-test".to_string(),
    }
}

pub fn orchestrator(store: &Arc<MemoryStore>) -> SyncOrchestrator {
    SyncOrchestrator::new(store.clone(), RetryPolicy::no_retry(), CancelToken::new())
}

/// Serve `body` for GET `path`, whatever the query string.
pub async fn serve(server: &mut ServerGuard, path: &str, body: Value) -> Mock {
    server
        .mock("GET", path)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await
}

pub fn site_teams(teams: Vec<Value>) -> Value {
    let entries: Vec<Value> = teams.into_iter().map(|t| json!({ "team": t })).collect();
    json!({ "sports": [{ "leagues": [{ "teams": entries }] }] })
}

pub fn site_team(id: &str, abbreviation: &str, name: &str) -> Value {
    json!({
        "id": id,
        "abbreviation": abbreviation,
        "displayName": name,
        "shortDisplayName": name.rsplit(' ').next().unwrap_or(name),
        "color": "000000",
        "isActive": true
    })
}

pub fn mil() -> Value {
    json!({
        "id": "15",
        "abbreviation": "MIL",
        "displayName": "Milwaukee Bucks",
        "shortDisplayName": "Bucks",
        "location": "Milwaukee",
        "name": "Bucks",
        "color": "00471B",
        "alternateColor": "eee1c6",
        "isActive": true,
        "logos": [
            { "href": "https://a.espncdn.com/i/teamlogos/nba/500/mil.png", "rel": ["full", "default"] },
            { "href": "https://a.espncdn.com/i/teamlogos/nba/500-dark/mil.png", "rel": ["full", "dark"] }
        ]
    })
}

pub fn scoreboard_event(id: &str, date: &str, home: &str, away: &str, scores: Option<(&str, &str)>) -> Value {
    let (status, home_score, away_score) = match scores {
        Some((h, a)) => ("STATUS_FINAL", h, a),
        None => ("STATUS_SCHEDULED", "0", "0"),
    };
    json!({
        "id": id,
        "date": date,
        "season": { "year": 2025, "type": 2 },
        "status": { "type": { "name": status } },
        "competitions": [{
            "venue": { "fullName": "Fiserv Forum" },
            "competitors": [
                { "homeAway": "home", "team": { "id": home }, "score": home_score },
                { "homeAway": "away", "team": { "id": away }, "score": away_score }
            ]
        }]
    })
}
