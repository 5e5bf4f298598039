//! FLock Harvester - reward collection and reinvestment for FLock delegators
//!
//! Claims FLOCK delegation rewards for every configured wallet, collects them
//! in one wallet, prices FLOCK against WETH, EURC and USDC, and then either
//! exchanges and delegates the rewards or sells them for ETH.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

mod chain;
mod config;
mod contracts;
mod error;
mod metrics;
mod quote;
mod shutdown;
mod tx;
mod workflow;

use chain::wallet::wallet_from_mnemonic;
use chain::{ChainClient, WalletClient};
use config::Settings;
use workflow::{Harvester, RunReport};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting FLock Harvester v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for {} wallets on {} (chain {})",
        settings.wallets.len(),
        settings.network.name,
        settings.network.chain_id
    );
    if settings.executor.dry_run {
        warn!("Dry run: transactions are estimated, never broadcast");
    }

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            warn!("Shutdown signal received, cancelling pending waits");
            shutdown.cancel();
        }
    });

    // Connect every wallet, in configuration order
    let mut wallets: Vec<Arc<dyn ChainClient>> = Vec::with_capacity(settings.wallets.len());
    for wallet in &settings.wallets {
        let signer = wallet_from_mnemonic(&wallet.mnemonic)
            .with_context(|| format!("Failed to load wallet {}", wallet.name))?;
        let client = WalletClient::connect(
            &wallet.name,
            signer,
            &settings.network,
            settings.executor.receipt_poll_interval(),
        )?;
        info!("Wallet {} ready at {:?}", wallet.name, client.address());
        wallets.push(Arc::new(client));
    }

    let harvester = Harvester::from_settings(&settings, wallets, shutdown)?;

    let run_id = Uuid::new_v4();
    let mut report = RunReport::new(run_id.to_string(), settings.executor.dry_run);
    let result = harvester
        .run(&mut report)
        .instrument(tracing::info_span!("run", run_id = %run_id))
        .await;

    match report.to_json() {
        Ok(json) => info!("Run report: {}", json),
        Err(e) => warn!("{}", e),
    }

    if settings.metrics.report {
        info!("Metrics:\n{}", metrics::render());
    }

    if let Err(e) = result {
        error!("Run {} failed: {}", run_id, e);
        return Err(e.into());
    }

    info!("FLock Harvester finished");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,flock_harvester=debug"));

    let json = std::env::var("HARVESTER_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

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
                error!("Failed to install signal handler: {}", e);
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
