mod common;

use chrono::{TimeZone, Utc};
use common::{http_config, mil, orchestrator, scoreboard_event, serve, site_team, site_teams};
use hoopsync_core::clients::{EspnSiteClient, SportsDataClient};
use hoopsync_core::models::Game;
use hoopsync_core::sync::jobs::{
    SportsDataGameSync, SportsDataPlayerSync, SportsDataTeamSync, TeamSync,
};
use hoopsync_core::transform::{game, player, team};
use hoopsync_core::{
    CancelToken, EntityKind, GameStatus, IdSchemeRule, IdentityMigrator, MemoryStore,
    MigrationScope, Provider, RetryPolicy, SeasonType, SyncScope, SyncStore,
};
use serde_json::json;
use std::sync::Arc;

/// ESPN teams MIL (15), BOS (2) and PHX (21), plus Giannis on MIL.
async fn espn_seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    for raw in [mil(), site_team("2", "BOS", "Boston Celtics"), site_team("21", "PHX", "Phoenix Suns")] {
        store.upsert_team(&team::from_espn_site(&raw, now).unwrap()).await.unwrap();
    }
    let giannis = json!({
        "id": "3032977",
        "fullName": "Giannis Antetokounmpo",
        "team": { "$ref": "http://core.test/seasons/2025/teams/15?lang=en" }
    });
    store
        .upsert_player(&player::from_espn_core(&giannis, now).unwrap())
        .await
        .unwrap();
    store
}

fn sportsdata(server: &mockito::ServerGuard) -> SportsDataClient {
    SportsDataClient::new(&server.url(), "test-key", &http_config()).unwrap()
}

fn sportsdata_teams() -> serde_json::Value {
    json!([
        { "TeamID": 29, "Key": "MIL", "City": "Milwaukee", "Name": "Bucks", "Conference": "Eastern", "Division": "Central", "Active": true },
        { "TeamID": 9, "Key": "BOS", "City": "Boston", "Name": "Celtics", "Conference": "Eastern", "Active": true },
        { "TeamID": 21, "Key": "PHO", "City": "Phoenix", "Name": "Suns", "Conference": "Western", "Active": true },
        { "TeamID": 99, "Key": "SEA", "City": "Seattle", "Name": "SuperSonics", "Active": false }
    ])
}

#[tokio::test]
async fn test_sportsdata_teams_map_onto_espn_teams() {
    let mut server = mockito::Server::new_async().await;
    serve(&mut server, "/scores/json/AllTeams", sportsdata_teams()).await;
    let store = espn_seeded_store().await;

    let report = orchestrator(&store)
        .run(&SportsDataTeamSync::new(sportsdata(&server)), &SyncScope::for_season(2025))
        .await
        .unwrap();

    assert_eq!(report.stats.updated, 3);
    assert_eq!(report.stats.skipped, 1);
    assert_eq!(store.count(EntityKind::Team).await.unwrap(), 3);
    assert_eq!(
        store
            .lookup_external_id(Provider::SportsData, EntityKind::Team, "21")
            .await
            .unwrap()
            .as_deref(),
        Some("21")
    );
    assert_eq!(
        store
            .lookup_external_id(Provider::SportsData, EntityKind::Team, "29")
            .await
            .unwrap()
            .as_deref(),
        Some("15")
    );

    // Lower precedence only fills gaps
    let bucks = store.get_team("15").await.unwrap().unwrap();
    assert_eq!(bucks.source, Provider::EspnSite);
    assert_eq!(bucks.display_name.as_deref(), Some("Milwaukee Bucks"));
    assert_eq!(bucks.conference.as_deref(), Some("Eastern"));
    assert_eq!(bucks.primary_color.as_deref(), Some("00471B"));
}

#[tokio::test]
async fn test_espn_rerun_keeps_sportsdata_conference() {
    let mut server = mockito::Server::new_async().await;
    serve(&mut server, "/teams", site_teams(vec![mil()])).await;
    serve(&mut server, "/scores/json/AllTeams", sportsdata_teams()).await;
    let store = Arc::new(MemoryStore::new());
    let scope = SyncScope::for_season(2025);
    let espn = TeamSync::new(EspnSiteClient::new(&server.url(), &http_config()).unwrap());

    orchestrator(&store).run(&espn, &scope).await.unwrap();
    orchestrator(&store)
        .run(&SportsDataTeamSync::new(sportsdata(&server)), &scope)
        .await
        .unwrap();
    let filled = store.get_team("15").await.unwrap().unwrap();
    assert_eq!(filled.conference.as_deref(), Some("Eastern"));

    let report = orchestrator(&store).run(&espn, &scope).await.unwrap();
    assert_eq!(report.stats.updated, 1);

    let bucks = store.get_team("15").await.unwrap().unwrap();
    assert_eq!(bucks.source, Provider::EspnSite);
    assert_eq!(bucks.display_name.as_deref(), Some("Milwaukee Bucks"));
    assert_eq!(bucks.conference.as_deref(), Some("Eastern"));
    assert_eq!(bucks.division.as_deref(), Some("Central"));
}

#[tokio::test]
async fn test_sportsdata_players_resolve_by_name() {
    let mut server = mockito::Server::new_async().await;
    serve(&mut server, "/scores/json/AllTeams", sportsdata_teams()).await;
    serve(
        &mut server,
        "/scores/json/Players",
        json!([
            {
                "PlayerID": 20000441, "FirstName": "Giannis", "LastName": "Antetokounmpo",
                "TeamID": 29, "Position": "PF", "Jersey": 34, "Height": 83, "Weight": 243,
                "BirthDate": "1994-12-06T00:00:00", "Status": "Active"
            },
            { "PlayerID": 20000999, "FirstName": "Unsigned", "LastName": "Prospect", "TeamID": 29, "Status": "Active" },
            { "PlayerID": 20000777, "FirstName": "Sonic", "LastName": "Guard", "TeamID": 99, "Status": "Active" }
        ]),
    )
    .await;
    let store = espn_seeded_store().await;
    let scope = SyncScope::for_season(2025);
    orchestrator(&store)
        .run(&SportsDataTeamSync::new(sportsdata(&server)), &scope)
        .await
        .unwrap();

    let report = orchestrator(&store)
        .run(&SportsDataPlayerSync::new(sportsdata(&server)), &scope)
        .await
        .unwrap();

    assert_eq!(report.stats.updated, 1);
    assert_eq!(report.stats.skipped, 2);
    assert_eq!(store.count(EntityKind::Player).await.unwrap(), 1);
    assert!(store.get_player("20000999").await.unwrap().is_none());

    let giannis = store.get_player("3032977").await.unwrap().unwrap();
    assert_eq!(giannis.source, Provider::EspnCore);
    assert_eq!(giannis.team_id.as_deref(), Some("15"));
    assert_eq!(giannis.height_inches, Some(83));
    assert_eq!(giannis.height_display.as_deref(), Some("6'11\""));
    assert_eq!(giannis.jersey.as_deref(), Some("34"));
    assert_eq!(
        store
            .lookup_external_id(Provider::SportsData, EntityKind::Player, "20000441")
            .await
            .unwrap()
            .as_deref(),
        Some("3032977")
    );
}

#[tokio::test]
async fn test_sportsdata_games_fill_espn_game() {
    let mut server = mockito::Server::new_async().await;
    serve(&mut server, "/scores/json/AllTeams", sportsdata_teams()).await;
    serve(
        &mut server,
        "/scores/json/Games/2025",
        json!([
            {
                "GameID": 21000, "Season": 2025, "SeasonType": 1, "Status": "Final",
                "DateTimeUTC": "2024-10-22T23:30:00", "HomeTeamID": 29, "AwayTeamID": 9,
                "HomeTeamScore": 132, "AwayTeamScore": 109
            },
            {
                "GameID": 21001, "Season": 2025, "SeasonType": 1, "Status": "Scheduled",
                "DateTimeUTC": "2024-10-30T02:00:00", "HomeTeamID": 21, "AwayTeamID": 29
            }
        ]),
    )
    .await;
    let store = espn_seeded_store().await;
    let espn_game = game::from_espn_site(
        &scoreboard_event("401584793", "2024-10-22T23:30Z", "15", "2", None),
        Utc::now(),
    )
    .unwrap();
    store.upsert_game(&espn_game).await.unwrap();

    let scope = SyncScope::for_season(2025);
    orchestrator(&store)
        .run(&SportsDataTeamSync::new(sportsdata(&server)), &scope)
        .await
        .unwrap();
    let report = orchestrator(&store)
        .run(&SportsDataGameSync::new(sportsdata(&server)), &scope)
        .await
        .unwrap();

    assert_eq!(report.stats.updated, 1);
    assert_eq!(report.stats.skipped, 1);
    assert_eq!(store.count(EntityKind::Game).await.unwrap(), 1);

    let stored = store.get_game("401584793").await.unwrap().unwrap();
    assert_eq!(stored.source, Provider::EspnSite);
    assert_eq!(stored.status, GameStatus::Scheduled);
    assert_eq!(stored.home_score, Some(132));
    assert_eq!(stored.away_score, Some(109));
}

fn game_row(id: &str, home: &str, away: &str, day: u32, scores: Option<(i32, i32)>) -> Game {
    Game {
        id: id.to_string(),
        season: 2025,
        season_type: SeasonType::Regular,
        scheduled_at: Some(Utc.with_ymd_and_hms(2024, 11, day, 1, 0, 0).unwrap()),
        status: if scores.is_some() { GameStatus::Finished } else { GameStatus::Scheduled },
        home_team_id: home.to_string(),
        away_team_id: away.to_string(),
        home_score: scores.map(|s| s.0),
        away_score: scores.map(|s| s.1),
        venue: None,
        source: Provider::SportsData,
        last_synced_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_migration_folds_legacy_games() {
    let store = espn_seeded_store().await;
    store.upsert_game(&game_row("401585000", "15", "2", 3, None)).await.unwrap();
    store.upsert_game(&game_row("21050", "15", "2", 3, Some((118, 111)))).await.unwrap();
    store.upsert_game(&game_row("21051", "21", "15", 9, Some((101, 99)))).await.unwrap();

    let migrator = IdentityMigrator::new(
        store.clone(),
        IdSchemeRule { current_min_len: 9 },
        RetryPolicy::no_retry(),
    );
    let cancel = CancelToken::new();

    let dry = migrator
        .migrate(&MigrationScope { season: Some(2025), dry_run: true }, &cancel)
        .await
        .unwrap();
    assert!(dry.dry_run);
    assert_eq!(dry.migrated, 1);
    assert_eq!(store.count(EntityKind::Game).await.unwrap(), 3);

    let report = migrator.migrate(&MigrationScope::default(), &cancel).await.unwrap();
    assert_eq!(report.migrated, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.unmappable.len(), 1);
    assert_eq!(report.unmappable[0].0, "21051");
    assert!(report.errors.is_empty());

    assert!(store.get_game("21050").await.unwrap().is_none());
    let current = store.get_game("401585000").await.unwrap().unwrap();
    assert_eq!(current.home_score, Some(118));
    assert_eq!(current.away_score, Some(111));
    assert_eq!(
        store
            .lookup_external_id(Provider::SportsData, EntityKind::Game, "21050")
            .await
            .unwrap()
            .as_deref(),
        Some("401585000")
    );

    let again = migrator.migrate(&MigrationScope::default(), &cancel).await.unwrap();
    assert_eq!(again.migrated, 0);
    assert_eq!(again.unmappable.len(), 1);
    assert_eq!(store.count(EntityKind::Game).await.unwrap(), 2);
}
