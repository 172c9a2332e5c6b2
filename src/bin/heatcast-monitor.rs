//! Headless heatmap monitor
//!
//! Seeds the offline cache, connects to the broker and logs every change of
//! the view state until interrupted.
//!
//! ```bash
//! heatcast-monitor --config heatcast.yaml --max-rate 5
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use heatcast::config::ReconnectPolicy;
use heatcast::{Config, ConnectionStatus, Heatcast, UpdateRate, logging};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "heatcast-monitor")]
#[command(about = "Headless monitor for the heatmap image feed", long_about = None)]
struct Cli {
    /// YAML configuration file; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log at most this many image updates per second (0 = every image)
    #[arg(long, default_value_t = 0)]
    max_rate: u32,

    /// Skip cache install and activation
    #[arg(long)]
    no_cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    logging::init(config.log_filter.as_deref().unwrap_or(logging::DEFAULT_FILTER));

    let viewport = &config.viewport;
    info!(
        "Overlay bounds {:?} at opacity {} (center {:?}, zoom {})",
        viewport.bounds, viewport.overlay_opacity, viewport.center, viewport.zoom
    );

    if !cli.no_cache {
        let gateway = Heatcast::gateway(&config)?;
        match gateway.on_install().await {
            Ok(report) => {
                info!("Cached {} resources in '{}'", report.cached.len(), report.generation);
                if let Err(e) = gateway.on_activate().await {
                    warn!("Cache activation failed: {}", e);
                }
            }
            Err(e) => {
                // Older generations stay in place until an install succeeds
                warn!("Cache install failed, skipping activation: {}", e);
                for hint in e.recovery_suggestions() {
                    warn!("  hint: {}", hint);
                }
            }
        }
    }

    let mut connection = Heatcast::connect(&config).await?;
    let mut view = Box::pin(connection.view_updates(UpdateRate::Max(cli.max_rate)));
    let mut gave_up = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            state = view.next() => match state {
                Some(state) => {
                    let snapshot = state.snapshot();
                    info!(
                        status = %snapshot.status_text,
                        image = %snapshot.image_status_text,
                        uri_len = snapshot.current_image_uri.as_ref().map_or(0, String::len),
                        "View updated"
                    );

                    let status = connection.status();
                    if status.is_terminal() {
                        break;
                    }
                    if status.is_failure() {
                        warn!("Connection reports: {}", status);
                        if status == ConnectionStatus::ConnectionFailed
                            && config.broker.reconnect == ReconnectPolicy::Never
                        {
                            gave_up = true;
                            break;
                        }
                    }
                }
                None => break,
            },
        }
    }

    connection.teardown().await;
    info!("Final status: {}", connection.status());
    if gave_up {
        anyhow::bail!("could not connect to {}", config.broker.url);
    }
    Ok(())
}
