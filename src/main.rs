use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use atomic_trader::bridge::BridgeClient;
use atomic_trader::config::Config;
use atomic_trader::controller::Controller;
use atomic_trader::logger;
use atomic_trader::time::SystemClock;

#[tokio::main]
async fn main() -> Result<()> {
    // Load local .env if present (no-op in prod/systemd envs)
    let _ = dotenvy::dotenv();

    logger::init_tracing(Config::log_json_from_env());

    let cfg = Config::from_env().inspect_err(|e| error!(error = %e, "config rejected"))?;
    info!(?cfg, "boot");

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupted by user");
                token.cancel();
            }
            Err(e) => warn!(error = %e, "ctrl_c handler unavailable"),
        }
    });

    let platform = Arc::new(BridgeClient::new(cfg.bridge_url.clone()));
    let controller = Controller::new(cfg, platform, Arc::new(SystemClock));
    let throttle = controller.run(shutdown).await?;
    info!(last_trade = ?throttle.last_trade, "shutdown complete");

    Ok(())
}
