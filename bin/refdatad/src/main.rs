//! ---
//! refdata_section: "01-core-functionality"
//! refdata_subsection: "binary"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Binary entrypoint for the reference data daemon."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use refdata_api::{bootstrap_admin, spawn_api_server, ApiServer, ApiState};
use refdata_common::config::AppConfig;
use refdata_common::logging::init_tracing;
use refdata_common::version::VersionInfo;
use refdata_metrics::{new_registry, spawn_http_server, DaemonMetrics, SharedRegistry};
use refdata_persistence::Database;
use refdata_rights::RightsMetrics;
use refdata_security::SecurityMetrics;
use tokio::signal;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    version = concat!("refdatad ", env!("CARGO_PKG_VERSION")),
    about = "Reference data daemon",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print extended version information and exit"
    )]
    version: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Serve the REST API")]
    Run,
    #[command(about = "Rebuild the right assignment table and exit")]
    GenerateRightAssignments {
        #[arg(long, help = "Only regenerate the rows of this user")]
        username: Option<String>,
    },
    #[command(about = "Create or repair the administrator account and print a token")]
    BootstrapAdmin {
        #[arg(long, default_value = "administrator")]
        username: String,
    },
    #[command(about = "Issue a bearer token for an existing user")]
    IssueToken {
        #[arg(long)]
        username: String,
        #[arg(long)]
        label: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let version = VersionInfo::current();
    if cli.version {
        println!("{}", version.extended());
        return Ok(());
    }
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/refdata.toml"));
    candidates.push(PathBuf::from("configs/refdata.dev.toml"));

    let load_started = Instant::now();
    let loaded = AppConfig::load_with_source(&candidates)?;
    let config = loaded.config;
    let load_duration = load_started.elapsed();

    let registry = new_registry();
    let daemon_metrics = DaemonMetrics::new(registry.clone())?;
    daemon_metrics.observe_config_load(load_duration.as_secs_f64());
    daemon_metrics.set_build_info(&version.version, &version.git_sha, &version.profile);

    init_tracing("refdatad", &config.logging)?;
    info!(config_path = %loaded.source.display(), version = %version.banner(), "configuration loaded");

    let database = Database::connect(&config.database)
        .await
        .with_context(|| format!("failed to open database {}", config.database.path.display()))?;
    let state = ApiState::new(database.clone(), &config)
        .with_security_metrics(SecurityMetrics::new(registry.clone())?)
        .with_rights_metrics(RightsMetrics::new(registry.clone())?);
    let state = Arc::new(state);

    let outcome = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            daemon_metrics.inc_start();
            run_daemon(&config, state, registry).await
        }
        Commands::GenerateRightAssignments { username } => {
            generate(&state, username.as_deref()).await
        }
        Commands::BootstrapAdmin { username } => {
            let token = bootstrap_admin(&state, &username).await?;
            println!("{}", serde_json::to_string_pretty(&token)?);
            Ok(())
        }
        Commands::IssueToken { username, label } => {
            let user = state
                .repositories()
                .users
                .find_by_username(&username)
                .await?
                .with_context(|| format!("user {username} does not exist"))?;
            let token = state.tokens().issue(user.id, label).await?;
            info!(user_id = %user.id, "token issued");
            println!("{}", serde_json::to_string_pretty(&token)?);
            Ok(())
        }
    };

    database.close().await;
    outcome
}

async fn generate(state: &ApiState, username: Option<&str>) -> Result<()> {
    let report = match username {
        Some(username) => {
            let user = state
                .repositories()
                .users
                .find_by_username(username)
                .await?
                .with_context(|| format!("user {username} does not exist"))?;
            state.generator().generate_for_user(user.id).await?
        }
        None => state.generator().generate_all().await?,
    };
    println!(
        "{}: {} right assignments written in {:?}",
        report.scope, report.rows_written, report.elapsed
    );
    Ok(())
}

async fn run_daemon(
    config: &AppConfig,
    state: Arc<ApiState>,
    registry: SharedRegistry,
) -> Result<()> {
    let metrics_server = if config.metrics.enabled {
        info!(address = %config.metrics.listen, "metrics exporter enabled");
        Some(spawn_http_server(registry, config.metrics.listen).await?)
    } else {
        info!("metrics exporter disabled by configuration");
        None
    };

    if config.right_assignments.generate_on_startup {
        let report = state
            .generator()
            .generate_all()
            .await
            .context("startup right assignment generation failed")?;
        info!(rows = report.rows_written, elapsed = ?report.elapsed, "right assignments generated on startup");
    }

    let mut api_server: Option<ApiServer> = None;
    if config.api.enabled {
        match spawn_api_server(state, config.api.listen).await {
            Ok(server) => {
                info!(address = %server.addr(), "api server listening");
                api_server = Some(server);
            }
            Err(err) => {
                warn!(error = %err, "failed to start api server");
            }
        }
    } else {
        info!("api server disabled by configuration");
    }

    info!("daemon running; waiting for termination signal");
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");

    if let Some(server) = api_server {
        server.shutdown().await?;
    }
    if let Some(server) = metrics_server {
        server.shutdown().await?;
    }
    Ok(())
}
