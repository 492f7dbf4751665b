mod config;

use crate::config::Config;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use hoopsync_core::clients::{EspnCoreClient, EspnSiteClient, SportsDataClient};
use hoopsync_core::db::{create_pool, wait_for_pool};
use hoopsync_core::sync::jobs::{
    GameSync, NewsSync, PlayerStatsSync, PlayerSync, SportsDataGameSync, SportsDataPlayerSync,
    SportsDataTeamSync, TeamStatsSync, TeamSync,
};
use hoopsync_core::sync::IssueKind;
use hoopsync_core::{
    CancelToken, EntitySync, IdentityMigrator, MigrationReport, MigrationScope, PgSyncStore,
    RetryPolicy, SeasonType, SyncOrchestrator, SyncReport, SyncScope, SyncStore,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hoopsync", version, about = "Sync external basketball data into the local database")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Season by its ending year (2025 is 2024-25); defaults to the current one
    #[arg(long, global = true)]
    season: Option<i32>,

    /// pre, regular, post or play-in
    #[arg(long, global = true, value_parser = parse_season_type, default_value = "regular")]
    season_type: SeasonType,

    #[arg(long, global = true, value_enum, default_value_t = Source::Espn)]
    provider: Source,

    /// Restrict players, games and statistics to one canonical team id
    #[arg(long, global = true)]
    team: Option<String>,

    /// Scoreboard dates for games, `YYYYMMDD` or `YYYYMMDD-YYYYMMDD`
    #[arg(long, global = true)]
    dates: Option<String>,

    /// Report what migrate-ids would do without writing
    #[arg(long, global = true)]
    dry_run: bool,

    /// Apply the bundled schema before running
    #[arg(long, global = true)]
    ensure_schema: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Teams,
    Players,
    Games,
    PlayerStats,
    TeamStats,
    News,
    /// Every ESPN job, in dependency order
    All,
    /// Fold legacy game ids into their current-scheme rows
    MigrateIds,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Espn,
    Sportsdata,
}

fn parse_season_type(s: &str) -> Result<SeasonType, String> {
    SeasonType::parse(s).ok_or_else(|| format!("unknown season type: {}", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Database
    let pool = create_pool(&config.database_url, &config.db_pool.clone().with_min_capacity(2))
        .await
        .context("Failed to connect to database")?;
    wait_for_pool(&pool, &RetryPolicy::default())
        .await
        .context("Database health check failed")?;
    let pg = PgSyncStore::new(pool);
    if cli.ensure_schema {
        pg.ensure_schema().await.context("Failed to apply schema")?;
        info!("Schema applied");
    }
    let store: Arc<dyn SyncStore> = Arc::new(pg);

    let cancel = CancelToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, finishing the in-flight record and stopping");
            ctrl_c_token.cancel();
        }
    });

    if cli.command == Command::MigrateIds {
        let migrator = IdentityMigrator::new(store, config.id_scheme, RetryPolicy::default());
        let scope = MigrationScope {
            season: cli.season,
            dry_run: cli.dry_run,
        };
        let report = migrator.migrate(&scope, &cancel).await?;
        print_migration(&report);
        return Ok(());
    }

    let mut scope = cli.season.map(SyncScope::for_season).unwrap_or_default();
    scope.season_type = cli.season_type;
    scope.team = cli.team.clone();
    scope.dates = cli.dates.clone();
    scope.news_limit = config.news_limit;

    let jobs = build_jobs(&cli, &config)?;
    let orchestrator = SyncOrchestrator::new(store, RetryPolicy::default(), cancel.clone());

    info!(
        "Running {} job(s) for season {} ({:?})",
        jobs.len(),
        scope.season,
        scope.season_type
    );

    let mut first_error = None;
    for job in &jobs {
        if cancel.is_cancelled() {
            warn!("Cancelled, not starting {}", job.name());
            break;
        }
        match orchestrator.run(job.as_ref(), &scope).await {
            Ok(report) => print_report(&report),
            Err(e) => {
                error!("{} sync aborted: {}", job.name(), e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e).context("One or more sync runs aborted"),
        None => Ok(()),
    }
}

fn build_jobs(cli: &Cli, config: &Config) -> Result<Vec<Box<dyn EntitySync>>> {
    let jobs = match cli.provider {
        Source::Espn => {
            // Built once and cloned, so every job in a run shares one breaker per provider
            let site = EspnSiteClient::new(&config.espn_site_base_url, &config.http)
                .context("Failed to build ESPN Site client")?;
            let core = EspnCoreClient::new(&config.espn_core_base_url, &config.http)
                .context("Failed to build ESPN Core client")?;
            espn_jobs(cli.command, config, &site, &core)
        }
        Source::Sportsdata => {
            let key = config.require_sportsdata_key()?;
            let client = SportsDataClient::new(&config.sportsdata_base_url, key, &config.http)
                .context("Failed to build sportsdata client")?;
            match cli.command {
                Command::Teams => vec![boxed(SportsDataTeamSync::new(client))],
                Command::Players => vec![boxed(SportsDataPlayerSync::new(client))],
                Command::Games => vec![boxed(SportsDataGameSync::new(client))],
                other => bail!("{:?} is not available from sportsdata", other),
            }
        }
    };
    Ok(jobs)
}

fn espn_jobs(
    command: Command,
    config: &Config,
    site: &EspnSiteClient,
    core: &EspnCoreClient,
) -> Vec<Box<dyn EntitySync>> {
    match command {
        Command::Teams => vec![boxed(TeamSync::new(site.clone()))],
        Command::Players => vec![boxed(PlayerSync::new(core.clone()))],
        Command::Games => vec![boxed(GameSync::new(site.clone()).with_id_scheme(config.id_scheme))],
        Command::PlayerStats => vec![boxed(PlayerStatsSync::new(core.clone()))],
        Command::TeamStats => vec![boxed(TeamStatsSync::new(core.clone()))],
        Command::News => vec![boxed(NewsSync::new(site.clone()))],
        Command::All => vec![
            boxed(TeamSync::new(site.clone())),
            boxed(PlayerSync::new(core.clone())),
            boxed(GameSync::new(site.clone()).with_id_scheme(config.id_scheme)),
            boxed(TeamStatsSync::new(core.clone())),
            boxed(PlayerStatsSync::new(core.clone())),
            boxed(NewsSync::new(site.clone())),
        ],
        Command::MigrateIds => Vec::new(),
    }
}

fn boxed<J: EntitySync + 'static>(job: J) -> Box<dyn EntitySync> {
    Box::new(job)
}

fn print_report(report: &SyncReport) {
    println!("{}", report.summary_line());
    for issue in &report.issues {
        let label = match issue.kind {
            IssueKind::Failed => "FAILED",
            IssueKind::Skipped => "SKIPPED",
        };
        println!(
            "  {} {} {}: {}",
            label, issue.entity, issue.external_id, issue.message
        );
    }
}

fn print_migration(report: &MigrationReport) {
    println!(
        "migrate-ids: migrated={} skipped={} unmappable={} errors={}{}{}",
        report.migrated,
        report.skipped,
        report.unmappable.len(),
        report.errors.len(),
        if report.dry_run { " [dry run]" } else { "" },
        if report.cancelled { " [cancelled]" } else { "" }
    );
    for (id, reason) in &report.unmappable {
        println!("  UNMAPPABLE game {}: {}", id, reason);
    }
    for (id, message) in &report.errors {
        println!("  FAILED game {}: {}", id, message);
    }
}
