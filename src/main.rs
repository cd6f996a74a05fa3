//! Appwall CLI - per-application firewall gateway.

use std::sync::Arc;

use clap::Parser;
use tokio::signal;

use appwall::cli::{AppArgs, Cli, Commands, ConfigArgs, RunArgs};
use appwall::config::{init_logging, Config};
use appwall::controller::{GatewayController, PrivilegeAuthorizer};
use appwall::error::Result;
use appwall::store::{BlockListStore, JsonFileBackend};
use appwall::types::AppId;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_config = appwall::config::LoggingConfig {
        level: cli.log_level.clone(),
        color: !cli.no_color,
        ..Default::default()
    };
    init_logging(&log_config)?;

    // Load config if specified
    let config = if let Some(ref path) = cli.config {
        Config::load(path)?
    } else if Config::default_path().exists() {
        Config::load(Config::default_path())?
    } else {
        Config::default()
    };

    // Dispatch command
    match cli.command {
        Commands::Run(args) => run_gateway(args, config).await,
        Commands::Block(args) => set_blocked(&args, &config, true),
        Commands::Unblock(args) => set_blocked(&args, &config, false),
        Commands::List => list_blocked(&config),
        Commands::Config(args) => show_config(&args),
    }
}

/// Run the gateway until Ctrl+C.
async fn run_gateway(args: RunArgs, mut config: Config) -> Result<()> {
    if let Some(session) = args.session {
        config.interface.session = session;
    }
    config.validate()?;

    if !appwall::gateway::check_privileges()? {
        eprintln!("Virtual interfaces require elevated privileges.");
        eprintln!("  Linux: sudo appwall run, or");
        eprintln!("         sudo setcap cap_net_admin+ep $(which appwall)");
    }

    let store = Arc::new(BlockListStore::open(
        Box::new(JsonFileBackend::new(config.store.resolved_path())),
        config.interface.own_app.clone(),
    )?);

    let platform = build_platform(&config)?;
    let controller = GatewayController::new(
        config.interface.clone(),
        Arc::clone(&store),
        platform,
        Arc::new(PrivilegeAuthorizer),
    );

    controller.request_start().await?;

    println!(
        "Gateway active: blocking {} application(s). Press Ctrl+C to stop.",
        controller.blocked_count()
    );

    signal::ctrl_c().await?;

    println!();
    println!("Stopping gateway...");
    controller.request_stop().await;
    println!("Gateway stopped.");

    Ok(())
}

#[cfg(target_os = "linux")]
fn build_platform(config: &Config) -> Result<Arc<dyn appwall::gateway::Platform>> {
    Ok(Arc::new(appwall::gateway::TunPlatform::new(
        config.interface.session.clone(),
    )))
}

#[cfg(not(target_os = "linux"))]
fn build_platform(_config: &Config) -> Result<Arc<dyn appwall::gateway::Platform>> {
    Err(appwall::Error::Config(
        "No virtual-interface platform available on this OS".into(),
    ))
}

/// Mutate the persisted block list.
fn set_blocked(args: &AppArgs, config: &Config, blocked: bool) -> Result<()> {
    let store = BlockListStore::open(
        Box::new(JsonFileBackend::new(config.store.resolved_path())),
        config.interface.own_app.clone(),
    )?;

    let id = AppId::from(args.app.as_str());
    let changed = store.set_blocked(&id, blocked)?;

    match (blocked, changed) {
        (true, true) => println!("Blocked {id}"),
        (true, false) => println!("{id} is already blocked (or not blockable)"),
        (false, true) => println!("Unblocked {id}"),
        (false, false) => println!("{id} was not blocked"),
    }

    if changed {
        println!("A running gateway picks the change up on its next start.");
    }

    Ok(())
}

/// Print the current block list.
fn list_blocked(config: &Config) -> Result<()> {
    let store = BlockListStore::open(
        Box::new(JsonFileBackend::new(config.store.resolved_path())),
        config.interface.own_app.clone(),
    )?;

    let snapshot = store.snapshot();
    if snapshot.is_empty() {
        println!("Block list is empty.");
    } else {
        println!("Blocked applications ({}):", snapshot.len());
        for id in snapshot.iter() {
            println!("  {id}");
        }
    }

    Ok(())
}

/// Show example configuration.
fn show_config(args: &ConfigArgs) -> Result<()> {
    let config = Config::example();
    let output = toml::to_string_pretty(&config)
        .map_err(|e| appwall::Error::Config(format!("Failed to serialize config: {e}")))?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &output)?;
        println!("Configuration written to {}", path.display());
    } else {
        println!("{output}");
    }

    Ok(())
}
