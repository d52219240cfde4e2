//! wifi-watch - Router presence monitor
//!
//! Polls the router's online host table on a fixed interval and sends a
//! push notification whenever a device joins or leaves the network.

mod config;
mod error;
mod models;
mod monitor;
mod notify;
mod presence;
mod router;

use std::process::ExitCode;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::monitor::{Monitor, MonitorSettings};
use crate::notify::BarkNotifier;
use crate::router::RouterClient;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wifi_watch=info".into()),
        )
        .init();

    tracing::info!("Starting wifi-watch...");

    let monitor = match build_monitor() {
        Ok(monitor) => monitor,
        Err(e) => {
            tracing::error!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    tokio::select! {
        result = monitor.run() => {
            // The loop only returns on an unrecoverable error
            if let Err(e) = result {
                tracing::error!("Error: {}", e);
            }
            ExitCode::FAILURE
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, shutting down");
            ExitCode::FAILURE
        }
    }
}

fn build_monitor() -> anyhow::Result<Monitor> {
    let config = config::Config::load().context("Failed to load configuration")?;
    tracing::info!(
        "Configuration loaded (router: {}, push: {})",
        config.router_addr,
        config.push_url
    );

    let router = RouterClient::new(&config.router_addr, config.router_timeout())
        .context("Failed to create router HTTP client")?;

    let push_url = url::Url::parse(&config.push_url).context("Invalid push URL")?;
    let notifier = BarkNotifier::new(
        push_url,
        config.bark_key.clone(),
        config.push_group.clone(),
        config.push_timeout(),
    )
    .context("Failed to create push HTTP client")?;

    let settings = MonitorSettings {
        tick_interval: config.tick_interval(),
        offline_ticks: config.offline_ticks,
        max_auth_failures: config.max_auth_failures,
    };

    Ok(Monitor::new(
        Box::new(router),
        Box::new(notifier),
        config.router_password,
        settings,
    ))
}
