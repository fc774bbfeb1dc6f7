use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use feedhook::config::{load_dotenv, parse_since, Config};
use feedhook::dispatch::DiscordSink;
use feedhook::feed::{load_feed_list, HttpFeedSource};
use feedhook::logging::init_logging;
use feedhook::monitor::Monitor;
use feedhook::ui::{self, StatusBoard};
use feedhook::util::validate_webhook_url;
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser, Debug)]
#[command(
    name = "feedhook",
    about = "Polls RSS feeds and posts updates to Discord via a webhook.",
    after_help = "Good bye!"
)]
struct Args {
    /// Path to a file containing URLs to RSS feeds, separated by new lines
    #[arg(value_name = "FILE")]
    filename: PathBuf,

    /// Discord webhook URL. Generate one for a channel under
    /// Edit Channel / Integrations / Webhooks
    #[arg(short = 'w', long, env = "DISCORD_WEBHOOK", hide_env_values = true)]
    webhook: Option<String>,

    /// Cutoff for new posts (yyyy-mm-dd HH:MM), always UTC. Defaults to now
    #[arg(short, long, value_name = "DATETIME")]
    since: Option<String>,

    /// Show a live status table of all feeds
    #[arg(short, long)]
    render: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Configuration file (default: ~/.config/feedhook/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

/// Resolves when SIGINT or SIGTERM (Ctrl-C elsewhere) arrives.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down gracefully"),
            _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down gracefully"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl-C, shutting down gracefully");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before parsing, so DISCORD_WEBHOOK can come from .env
    let dotenv = load_dotenv(None);
    let args = Args::parse();

    let config_path = args.config.clone().or_else(Config::default_path);
    let config = match &config_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    let log_file = args.log_file.as_deref().or(config.log_file.as_deref());
    let _log_guard = init_logging(log_file, args.render && log_file.is_none())?;
    match dotenv {
        Ok(Some(path)) => tracing::debug!(path = %path.display(), "Loaded .env"),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Ignoring .env file"),
    }
    tracing::debug!(?config, "Effective configuration");

    let since = match &args.since {
        Some(s) => parse_since(s)?,
        None => Utc::now(),
    };

    let webhook = args
        .webhook
        .map(SecretString::from)
        .or_else(|| config.webhook_url.clone())
        .context("No webhook URL: pass --webhook, set DISCORD_WEBHOOK, or set webhook_url in the config file")?;
    validate_webhook_url(webhook.expose_secret()).context("Invalid webhook URL")?;

    let urls = load_feed_list(&args.filename)
        .await
        .with_context(|| format!("Failed to load feed list from {}", args.filename.display()))?;

    let source = HttpFeedSource::new(config.fetch_timeout()).context("Failed to build HTTP client")?;
    let sink = DiscordSink::with_timeout(webhook, config.webhook_timeout())
        .context("Failed to build webhook client")?;

    let monitor = Monitor::new(
        urls,
        Arc::new(source),
        Arc::new(sink),
        since,
        config.poll_interval(),
    )
    .with_max_concurrent(config.max_concurrent_checks);

    let shutdown = CancellationToken::new();

    let renderer = args.render.then(|| {
        let board = StatusBoard::new(monitor.watchers(), since);
        tokio::spawn(ui::run(board, config.render_interval(), shutdown.clone()))
    });

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            tracing::error!(error = %e, "Failed to install signal handlers");
        }
        signal_token.cancel();
    });

    let stats = monitor.run(shutdown.clone()).await;

    if let Some(renderer) = renderer {
        match renderer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Status table failed"),
            Err(e) => tracing::error!(error = %e, "Status table task failed"),
        }
    }

    tracing::info!(
        delivered = stats.delivered,
        failed = stats.failed,
        "Shut down"
    );
    Ok(())
}
