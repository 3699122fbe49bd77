//! Binary entry point for the party-finder matchmaking service
//!
//! Wires configuration, the notification sink, the matchmaking engine and the
//! monitoring server together, then runs until a termination signal arrives.

use anyhow::{Context, Result};
use clap::Parser;
use party_finder::config::AppConfig;
use party_finder::metrics::{HealthServer, HealthServerConfig};
use party_finder::service::{AppState, HealthCheck, HealthStatus};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

/// Matchmaking service that assembles fixed-composition parties from
/// named role queues
#[derive(Parser)]
#[command(
    name = "party-finder",
    version,
    about = "Role-queue matchmaking: one tank, one healer, four dps",
    long_about = "party-finder tracks named role queues, forms a party the moment every \
                  role slot fills, expires queues that never complete, and publishes \
                  lifecycle events to an AMQP broker."
)]
struct Args {
    /// TOML configuration file; environment variables override its values
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Override the AMQP broker host
    #[arg(long, value_name = "HOST")]
    amqp_host: Option<String>,

    /// Override the monitoring server port
    #[arg(long, value_name = "PORT")]
    health_port: Option<u16>,

    /// Run without a broker; events are logged instead of published
    #[arg(long)]
    no_amqp: bool,

    /// Shorthand for --log-level debug
    #[arg(short, long)]
    debug: bool,

    /// Validate configuration and exit without starting the service
    #[arg(long)]
    dry_run: bool,

    /// Run a one-shot health check and exit nonzero if unhealthy
    #[arg(long)]
    health_check: bool,
}

/// Resolve configuration: file or env first, then CLI overrides on top
fn resolve_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env()?,
    };

    if let Some(level) = &args.log_level {
        config.service.log_level = level.clone();
    }
    if args.debug {
        config.service.log_level = "debug".to_string();
    }
    if let Some(host) = &args.amqp_host {
        config.amqp.host = host.clone();
    }
    if let Some(port) = args.health_port {
        config.service.health_port = port;
    }
    if args.no_amqp {
        config.amqp.enabled = false;
    }

    Ok(config)
}

fn init_logging(default_level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

fn log_startup_summary(config: &AppConfig) {
    info!("party-finder {}", env!("CARGO_PKG_VERSION"));
    info!("  service name:  {}", config.service.name);
    info!("  monitoring:    port {}", config.service.health_port);
    match config.amqp.enabled {
        true => info!("  amqp broker:   {}:{}", config.amqp.host, config.amqp.port),
        false => info!("  amqp broker:   disabled (logging sink)"),
    }
    info!("  queue expiry:  {}s", config.matchmaking.expiry_seconds);
    match config.matchmaking.post_completion_grace_seconds {
        0 => info!("  grace delete:  disabled"),
        secs => info!("  grace delete:  {}s after party formation", secs),
    }
    let slots: Vec<String> = config
        .matchmaking
        .roles
        .roles()
        .map(|slot| format!("{} x{}", slot.name, slot.capacity))
        .collect();
    info!("  composition:   {}", slots.join(", "));
}

/// One-shot health check for container orchestration probes
async fn run_health_check(config: AppConfig) -> Result<()> {
    let app_state = Arc::new(AppState::new(config).await?);
    app_state.start().await?;

    let health = HealthCheck::check(app_state).await?;
    println!("status: {}", health.status);
    println!("active queues: {}", health.stats.active_queues);
    println!("participants waiting: {}", health.stats.participants_waiting);
    println!("parties formed: {}", health.stats.parties_formed);

    if health.status == HealthStatus::Unhealthy {
        std::process::exit(1);
    }
    Ok(())
}

/// Block until SIGINT or SIGTERM
async fn await_termination() {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        tokio::select! {
            _ = signal::ctrl_c() => info!("SIGINT received"),
            _ = sigterm.recv() => info!("SIGTERM received"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
        info!("Ctrl+C received");
    }
}

/// Periodically log engine statistics while the service runs
async fn stats_heartbeat(app_state: Arc<AppState>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(60));
    ticker.tick().await; // first tick fires immediately

    while app_state.is_running().await {
        ticker.tick().await;
        match app_state.engine_stats() {
            Ok(stats) => info!(
                "Heartbeat: {} active queues, {} waiting, {} parties formed",
                stats.active_queues, stats.participants_waiting, stats.parties_formed
            ),
            Err(e) => warn!("Heartbeat stats read failed: {}", e),
        }
    }
}

async fn run(config: AppConfig) -> Result<()> {
    let app_state = Arc::new(
        AppState::new(config.clone())
            .await
            .context("Service initialization failed")?,
    );
    app_state.start().await.context("Service start failed")?;

    let health_server = Arc::new(
        HealthServer::new(
            HealthServerConfig {
                port: config.service.health_port,
                ..HealthServerConfig::default()
            },
            app_state.metrics(),
        )
        .with_app_state(app_state.clone()),
    );

    let server_task = {
        let health_server = health_server.clone();
        tokio::spawn(async move {
            if let Err(e) = health_server.start().await {
                error!("Monitoring server failed: {}", e);
            }
        })
    };
    let heartbeat_task = tokio::spawn(stats_heartbeat(app_state.clone()));

    info!("party-finder is accepting queue operations; Ctrl+C to stop");
    await_termination().await;

    info!("Shutting down...");
    heartbeat_task.abort();
    if let Err(e) = health_server.stop().await {
        warn!("Monitoring server stop failed: {}", e);
    }

    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(())) => info!("Shutdown complete"),
        Ok(Err(e)) => warn!("Shutdown finished with error: {}", e),
        Err(_) => warn!("Shutdown timed out, exiting anyway"),
    }

    server_task.abort();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = resolve_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    init_logging(&config.service.log_level)?;

    if args.health_check {
        return run_health_check(config).await;
    }

    log_startup_summary(&config);

    if args.dry_run {
        info!("Configuration is valid; dry run complete");
        return Ok(());
    }

    run(config).await
}
