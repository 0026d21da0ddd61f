//! `striker-watch` -- follow jobs and entity health from the command line.
//!
//! # Environment variables
//!
//! | Variable               | Required | Default                     | Description                          |
//! |------------------------|----------|-----------------------------|--------------------------------------|
//! | `STRIKER_API_URL`      | no       | `http://localhost:8080/api` | Executor base URL                    |
//! | `POLL_INTERVAL_MS`     | no       | `5000`                      | Poll cadence                         |
//! | `REQUEST_TIMEOUT_SECS` | no       | `30`                        | Per-request timeout (`0` disables)   |
//! | `WATCH_JOB_UUID`       | no       | --                          | Tail this job until it completes     |
//! | `WATCH_ANVIL_UUID`     | no       | --                          | Only report this anvil and members   |

use striker_client::api::StrikerApi;
use striker_client::config::ClientConfig;
use striker_watch::{inventory, job};
use tokio_util::sync::CancellationToken;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "striker_watch=info,striker_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    let api = StrikerApi::new(&config).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build HTTP client");
        std::process::exit(1);
    });

    let job_uuid = optional_var("WATCH_JOB_UUID");
    let anvil_uuid = optional_var("WATCH_ANVIL_UUID");

    tracing::info!(
        api_url = %config.api_url,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "Starting striker-watch"
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, stopping");
            }
            cancel.cancel();
        }
    });

    match job_uuid {
        Some(uuid) => {
            tokio::select! {
                result = job::run(api, config.poll_interval, &uuid) => {
                    if let Err(e) = result {
                        tracing::error!(job_uuid = %uuid, error = %e, "Job watch failed");
                        std::process::exit(1);
                    }
                }
                _ = cancel.cancelled() => {}
            }
        }
        None => {
            if let Err(e) = inventory::run(api, config.poll_interval, anvil_uuid, cancel).await {
                tracing::error!(error = %e, "Inventory watch failed");
                std::process::exit(1);
            }
        }
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
