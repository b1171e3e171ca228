//! devlease - host resource injection for container-creation requests
//!
//! Thin CLI over the injection library: `discover` shows the device
//! pool a daemon embedding the injector would start with, `apply`
//! dry-runs the injection for a create request read from a JSON file.

mod cli;

use crate::cli::{Cli, Commands};
use clap::Parser;
use devlease_config::Config;
use devlease_errors::{Error, InjectError};
use devlease_inject::Injector;
use devlease_types::CreateRequest;
use std::process;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.debug);

    if let Err(e) = run(cli).await {
        error!("application error: {e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), Error> {
    let config = Config::load(&cli.global.config).await?;
    info!(config = %cli.global.config.display(), "loaded configuration");

    let injector = Injector::discover(config).await?;

    match cli.command {
        Commands::Discover => discover(&injector, cli.global.json),
        Commands::Apply { request } => apply(&injector, &request, cli.global.json).await,
    }
}

fn discover(injector: &Injector, json: bool) -> Result<(), Error> {
    let pool = injector.pool();
    let reserved = pool.list_reserved();

    if json {
        let summary = serde_json::json!({
            "devices": pool.len(),
            "available": pool.available(),
            "reserved": reserved,
        });
        println!("{}", render_json(&summary)?);
        return Ok(());
    }

    println!(
        "discovered {} device(s) under {} ({} available)",
        pool.len(),
        injector.config().device.source_path.display(),
        pool.available()
    );
    for snapshot in reserved {
        println!(
            "  {} reserved by {} since {}",
            snapshot.id, snapshot.holder, snapshot.reserved_at
        );
    }
    Ok(())
}

async fn apply(injector: &Injector, request_path: &std::path::Path, json: bool) -> Result<(), Error> {
    let content = tokio::fs::read_to_string(request_path)
        .await
        .map_err(|e| InjectError::InvalidRequest {
            message: format!("cannot read {}: {e}", request_path.display()),
        })?;
    let request: CreateRequest =
        serde_json::from_str(&content).map_err(|e| InjectError::InvalidRequest {
            message: format!("invalid create request: {e}"),
        })?;

    let processed = injector.process(request).await?;

    if json {
        println!("{}", render_json(&processed)?);
    } else {
        println!("container: {}", processed.name);
        if let Some(user) = &processed.user {
            println!("user: {user}");
        }
        println!("privileged: {}", processed.privileged);
        println!("auto_remove: {}", processed.auto_remove);
        for env in &processed.env {
            println!("env: {env}");
        }
        for bind in &processed.binds {
            println!("bind: {bind}");
        }
        for device in &processed.devices {
            println!(
                "device: {}:{}:{}",
                device.path_on_host, device.path_in_container, device.cgroup_permissions
            );
        }
    }
    Ok(())
}

fn render_json(value: &impl serde::Serialize) -> Result<String, Error> {
    serde_json::to_string_pretty(value).map_err(|e| Error::internal(e.to_string()))
}
