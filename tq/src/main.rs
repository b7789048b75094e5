//! tq - task queue daemon and client CLI

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::{Context, Result};
use tracing::{info, warn};

use taskqueue::api::QueueApi;
use taskqueue::cli::{Cli, Command};
use taskqueue::clients::{DummyClient, create_client};
use taskqueue::config::Config;
use taskqueue::ipc::{self, QueueClient, cleanup_socket, create_listener_at, serve};
use taskqueue::registry::TaskRegistry;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level).map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    let socket_path = cli
        .socket
        .clone()
        .or_else(|| config.ipc.socket_path.clone())
        .unwrap_or_else(ipc::get_socket_path);

    match cli.command {
        Command::Serve => cmd_serve(&config, socket_path).await,
        Command::Queue {
            task_type,
            payload,
            task_id,
        } => cmd_queue(socket_path, &task_type, &payload, task_id.as_deref()).await,
        Command::Status { task_id } => cmd_status(socket_path, &task_id).await,
        Command::Watch { task_id } => cmd_watch(socket_path, &task_id).await,
        Command::Ping => cmd_ping(socket_path).await,
        Command::Shutdown => cmd_shutdown(socket_path).await,
    }
}

/// Build the task-kind registry from configuration
///
/// "dummy" is always available; "generate" is registered when the configured
/// backend can be constructed (e.g. its API key is present).
fn build_registry(config: &Config) -> Result<TaskRegistry> {
    let mut registry = TaskRegistry::new();
    registry.register(
        "dummy",
        Arc::new(DummyClient::new(Duration::from_millis(config.backend.delay_ms))),
    )?;

    match create_client(&config.backend) {
        Ok(client) => registry.register("generate", client)?,
        Err(e) => warn!(error = %e, "'generate' task type unavailable"),
    }

    Ok(registry)
}

/// Run the daemon in the foreground until shutdown or ctrl-c
async fn cmd_serve(config: &Config, socket_path: PathBuf) -> Result<()> {
    config.validate()?;

    let registry = build_registry(config)?;
    info!(kinds = ?registry.kinds(), "registry built");

    let api = Arc::new(QueueApi::build(config, registry));
    let listener = create_listener_at(&socket_path)?;
    println!("taskqueue serving on {}", socket_path.display());

    tokio::select! {
        result = serve(listener, Arc::clone(&api)) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
        }
    }

    cleanup_socket(&socket_path);
    api.shutdown().await;
    info!("taskqueue stopped");
    Ok(())
}

async fn cmd_queue(socket_path: PathBuf, task_type: &str, payload: &str, task_id: Option<&str>) -> Result<()> {
    let client = QueueClient::with_socket_path(socket_path);
    let (task_id, status) = client.queue(task_type, payload, task_id).await?;
    println!("{task_id} {status}");
    Ok(())
}

async fn cmd_status(socket_path: PathBuf, task_id: &str) -> Result<()> {
    let client = QueueClient::with_socket_path(socket_path);
    let (status, result) = client.status(task_id).await?;
    match result {
        Some(result) => println!("{status} {}", serde_json::to_string(&result)?),
        None => println!("{status}"),
    }
    Ok(())
}

async fn cmd_watch(socket_path: PathBuf, task_id: &str) -> Result<()> {
    let client = QueueClient::with_socket_path(socket_path);
    client
        .watch(task_id, |response| {
            if let ipc::Response::Event { event, data } = response {
                println!("{event} {data}");
            }
        })
        .await
}

async fn cmd_ping(socket_path: PathBuf) -> Result<()> {
    let client = QueueClient::with_socket_path(socket_path);
    match client.ping().await {
        Ok(version) => {
            println!("taskqueue is running (version: {version})");
            Ok(())
        }
        Err(e) => {
            println!("taskqueue is not responding: {e}");
            Ok(())
        }
    }
}

async fn cmd_shutdown(socket_path: PathBuf) -> Result<()> {
    let client = QueueClient::with_socket_path(socket_path);
    client.shutdown().await?;
    println!("taskqueue stopped");
    Ok(())
}
