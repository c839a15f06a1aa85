mod config;
mod database;
mod monitoring;
mod pool;
mod sink;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use crate::config::{Config, SinkMode};
use crate::database::{LibsqlRegistry, StreamRegistry};
use crate::monitoring::{LoudnessProbe, MonitorWorker, MonitoringExecutor, StreamCapture};
use crate::sink::{DatabaseSink, QueueSink, ResultSink};

/// Audio stream liveness monitor: periodically samples every registered
/// stream, measures its loudness and records whether it is online or down.
#[derive(Parser)]
#[command(name = "aircheck-service", version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single monitoring round and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logger::init();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_deref())
        .map_err(|error| anyhow::anyhow!("failed to load configuration: {error:?}"))?;
    info!("{config}");

    let pool = pool::build_pool(&config.registry.db_path)
        .await
        .with_context(|| format!("failed to open registry at {}", config.registry.db_path))?;

    let conn = pool.get().await?;
    database::initialize_database(&conn).await?;
    drop(conn);

    let registry: Arc<dyn StreamRegistry> =
        Arc::new(LibsqlRegistry::new_from_pool(pool));

    let sink: Arc<dyn ResultSink> = match config.sink.mode {
        SinkMode::Database => Arc::new(DatabaseSink::new(registry.clone())),
        SinkMode::Queue => Arc::new(
            QueueSink::new(&config.zeromq.endpoint)
                .with_context(|| format!("failed to connect queue at {}", config.zeromq.endpoint))?,
        ),
    };

    let capture = StreamCapture::new(
        &config.capture.user_agent,
        config.capture.byte_budget,
        Duration::from_secs(config.capture.read_timeout_secs),
    )
    .context("failed to build capture client")?;

    let probe = LoudnessProbe::new(
        &config.probe.ffmpeg_path,
        Duration::from_secs(config.probe.timeout_secs),
    );

    let checker = Arc::new(MonitoringExecutor::new(
        capture,
        probe,
        config.classifier.silence_threshold_db,
    ));

    let worker = MonitorWorker::new(
        registry,
        checker,
        sink,
        Duration::from_secs(config.scheduler.interval_secs),
    );

    if cli.once {
        worker.run_round().await;
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    worker.run(shutdown_rx).await;
    Ok(())
}
