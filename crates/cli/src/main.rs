mod metrics;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use walnut_core::simulation::{Scene, SimulatedScreen};
use walnut_core::{
    create_event_channel, load_config, validate_config, Config, EventEnvelope,
    SessionOrchestrator,
};

/// Buffer size for the session event channel
const EVENT_BUFFER_SIZE: usize = 256;

/// Exit status of a session that ended in an abort
const EXIT_ABORTED: i32 = 2;

#[derive(Parser)]
#[command(name = "walnut")]
#[command(version, about = "Unattended round runner for walnut-opening sessions")]
struct Cli {
    /// Log as JSON lines instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rehearse a session against a scripted scene and print the report
    Run {
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,

        /// Scene script driving the simulated screen
        #[arg(short, long)]
        scene: PathBuf,

        /// Override session.round_limit (0 = unbounded)
        #[arg(long)]
        rounds: Option<u32>,

        /// Write Prometheus metrics to this file when the session ends
        #[arg(long)]
        metrics_out: Option<PathBuf>,
    },
    /// Load and validate a configuration file
    Check {
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.json);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Logs go to stderr; stdout carries the report.
fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Check { config } => {
            let (config, config_hash) = load(&config)?;
            let summary = serde_json::json!({
                "config_hash": config_hash,
                "task": config.session.task,
                "round_limit": config.session.round_limit,
                "max_attempts": config.session.max_attempts,
                "alternative": config.session.alternative,
                "branch_policy": config.session.branch_policy,
                "escape": config.escape.enabled,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(0)
        }
        Commands::Run {
            config,
            scene,
            rounds,
            metrics_out,
        } => {
            let (mut config, _) = load(&config)?;
            if let Some(rounds) = rounds {
                info!("Round limit overridden to {}", rounds);
                config.session.round_limit = rounds;
            }
            rehearse(&config, &scene, metrics_out.as_deref()).await
        }
    }
}

/// Load and validate configuration. Returns it with its short hash.
fn load(path: &Path) -> Result<(Config, String)> {
    info!("Loading configuration from {:?}", path);
    let config = load_config(path)
        .with_context(|| format!("Failed to load config from {:?}", path))?;
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let config_hash_short = config_hash[..16].to_string();
    info!(config_hash = %config_hash_short, "Configuration loaded successfully");

    Ok((config, config_hash_short))
}

async fn rehearse(config: &Config, scene_path: &Path, metrics_out: Option<&Path>) -> Result<i32> {
    let scene = Scene::load(scene_path)
        .with_context(|| format!("Failed to load scene from {:?}", scene_path))?;
    info!(
        elements = scene.elements.len(),
        reactions = scene.reactions.len(),
        "Scene loaded"
    );
    let screen = Arc::new(SimulatedScreen::from_scene(scene));

    let cancel = CancellationToken::new();
    let (events, rx) = create_event_channel(EVENT_BUFFER_SIZE);
    let orchestrator = SessionOrchestrator::new(config, screen.clone(), screen.clone())
        .with_events(events)
        .with_cancellation(cancel.clone());

    let interrupt = tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Interrupted, stopping at the next polling boundary");
        cancel.cancel();
    });

    // The orchestrator holds the last event sender; dropping it ends the log task.
    let session = async move {
        let report = orchestrator.run().await;
        drop(orchestrator);
        report
    };
    let (report, ()) = futures::future::join(session, log_events(rx)).await;
    interrupt.abort();

    info!(
        clicks = screen.clicks().len(),
        keys = screen.keys().len(),
        "Rehearsal finished"
    );

    if let Some(path) = metrics_out {
        metrics::write_metrics(path)?;
        info!("Metrics written to {:?}", path);
    }

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(if report.terminal.is_aborted() {
        EXIT_ABORTED
    } else {
        0
    })
}

async fn log_events(mut rx: mpsc::Receiver<EventEnvelope>) {
    while let Some(envelope) = rx.recv().await {
        match serde_json::to_string(&envelope.event) {
            Ok(payload) => info!(
                event = envelope.event.name(),
                at = %envelope.timestamp.to_rfc3339(),
                payload = %payload,
                "Session event"
            ),
            Err(e) => warn!("Failed to serialize session event: {}", e),
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_arguments() {
        let cli = Cli::parse_from([
            "walnut", "--json", "run", "--config", "c.toml", "--scene", "s.toml", "--rounds", "3",
        ]);
        assert!(cli.json);
        match cli.command {
            Commands::Run {
                config,
                scene,
                rounds,
                metrics_out,
            } => {
                assert_eq!(config, PathBuf::from("c.toml"));
                assert_eq!(scene, PathBuf::from("s.toml"));
                assert_eq!(rounds, Some(3));
                assert!(metrics_out.is_none());
            }
            Commands::Check { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn test_check_defaults_config_path() {
        let cli = Cli::parse_from(["walnut", "check"]);
        match cli.command {
            Commands::Check { config } => assert_eq!(config, PathBuf::from("config.toml")),
            Commands::Run { .. } => panic!("expected check"),
        }
    }
}
