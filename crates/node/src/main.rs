//! Device binary: bridges the board's sensor/actuator and status LED to the
//! cloud control server, reconnecting forever.
//!
//! Usage:
//!   cb-node [config.toml]
//!
//! With no argument the stock config path is used; a missing file runs on
//! defaults. Identity comes from `/var/lb/mac` and `/var/lb/id` unless the
//! config overrides it. `RUST_LOG` controls verbosity.

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cb_client::{ClientBuilder, ClientError, Config};

/// Stock config location on the device image.
const DEFAULT_CONFIG_PATH: &str = "/usr/local/lb/cloud_client/config.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.into());
    let config = Config::load(&config_path)?;

    tracing::info!(url = %config.cloud.url, "starting cloud client");

    let supervisor = ClientBuilder::from_config(&config).build()?;

    let shutdown = CancellationToken::new();
    let ctrlc = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received");
            ctrlc.cancel();
        }
    });

    match supervisor.run(shutdown).await {
        Err(ClientError::Shutdown) => {
            tracing::info!("stopped");
            Ok(())
        }
        other => other.map_err(Into::into),
    }
}
