use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use modkit::runtime::{
    compose_within, run, stop_modules, AppOptions, ComposedApp, RunOptions, ShutdownOptions,
};
use modkit_bootstrap::{AppConfig, CliArgs};
use serde_json::{Map, Value};

use std::path::{Path, PathBuf};
use std::time::Duration;

mod registered_modules;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Commerce Server - composes domain modules behind one query façade
#[derive(Parser)]
#[command(name = "commerce-server")]
#[command(about = "Commerce Server - composes domain modules behind one query façade")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Separate YAML file with the modules config (overrides config)
    #[arg(short, long)]
    modules_config: Option<PathBuf>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose the application and serve until a shutdown signal
    Run,
    /// Compose once, report the merged schema and exit
    Check,
    /// Compose once and run a single query
    Query {
        /// GraphQL query document
        query: String,
        /// Variables as a JSON object
        #[arg(long)]
        variables: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        modules_config: cli
            .modules_config
            .as_ref()
            .map(|p| p.to_string_lossy().to_string()),
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    // 1) defaults -> 2) YAML (if provided) -> 3) env (APP__*) -> 4) CLI overrides
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    let logging_config = config.logging.as_ref().cloned().unwrap_or_default();
    modkit_bootstrap::logging::init_logging(&logging_config, Path::new(&config.server.home_dir));

    tracing::info!("Commerce Server starting");

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Check => check_config(config).await,
        Commands::Query { query, variables } => run_query(config, query, variables).await,
    }
}

async fn run_server(config: AppConfig) -> Result<()> {
    tracing::info!("Composing modules…");
    let app = AppOptions::from_app_config(&config).context("Invalid application config")?;

    run(RunOptions {
        app,
        shutdown: ShutdownOptions::Signals,
        startup_timeout: startup_timeout(&config),
    })
    .await
}

/// `server.startup_timeout_sec`, where 0 waits forever.
fn startup_timeout(config: &AppConfig) -> Option<Duration> {
    match config.server.startup_timeout_sec {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    }
}

async fn compose_with_timeout(config: &AppConfig) -> Result<ComposedApp> {
    let options = AppOptions::from_app_config(config).context("Invalid application config")?;
    compose_within(options, startup_timeout(config)).await
}

async fn check_config(config: AppConfig) -> Result<()> {
    tracing::info!("Checking configuration…");
    let app = compose_with_timeout(&config).await?;

    println!("Configuration is valid");
    println!("Modules: {}", app.modules.names().collect::<Vec<_>>().join(", "));
    if let Some(link) = &app.link {
        println!("Links: {}", link.service_names().join(", "));
    }
    println!(
        "Entities: {}",
        app.entities_map().keys().cloned().collect::<Vec<_>>().join(", ")
    );
    for (service, entries) in &app.not_found {
        for (entry, reason) in entries {
            println!("  unresolved in {service}: {entry}: {reason}");
        }
    }
    println!("{}", app.schema.to_sdl());

    stop_modules(&app).await;
    Ok(())
}

async fn run_query(config: AppConfig, query: String, variables: Option<String>) -> Result<()> {
    let variables = variables
        .map(|raw| serde_json::from_str::<Map<String, Value>>(&raw))
        .transpose()
        .context("--variables must be a JSON object")?;

    let app = compose_with_timeout(&config).await?;
    let result = app.query(query, variables).await;
    stop_modules(&app).await;

    let data = result.context("Query failed")?;
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}
