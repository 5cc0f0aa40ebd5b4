//! shed-bot — load-shedding alert bot.
//!
//! Wires the engine together: durable stores, the eskom-calendar
//! client, the messaging gateway, the alert scheduler, and the
//! reconciler loop, plus the webhook the gateway delivers inbound
//! chat commands to.

mod api;
mod commands;
mod state;

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use shed_core::config::{load_dotenv, Config};
use shed_engine::{AlertScheduler, Reconciler};
use shed_notify::{HttpGatewayMessenger, LogMessenger, Messenger};
use shed_source::{EskomCalendarClient, OutageSource};
use shed_store::{NotificationLedger, SubscriptionStore};

use crate::state::AppState;

/// Load-shedding alert bot.
#[derive(Parser, Debug)]
#[command(name = "shed-bot", version, about)]
struct Cli {
    /// Run startup recovery plus a single reconciliation pass, then exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let subscriptions = Arc::new(SubscriptionStore::open(&config.storage.subscriptions_path())?);
    let ledger = Arc::new(NotificationLedger::open(&config.storage.ledger_path())?);
    let source: Arc<dyn OutageSource> = Arc::new(EskomCalendarClient::new(&config.source)?);

    let messenger: Arc<dyn Messenger> = match HttpGatewayMessenger::from_config(&config.gateway) {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            warn!(error = %e, "no messaging gateway configured, texts go to the log");
            Arc::new(LogMessenger::new())
        }
    };

    let scheduler = Arc::new(AlertScheduler::new(
        Arc::clone(&ledger),
        Arc::clone(&messenger),
    ));
    let reconciler = Arc::new(Reconciler::new(
        Arc::clone(&subscriptions),
        Arc::clone(&ledger),
        Arc::clone(&source),
        Arc::clone(&scheduler),
        config.engine.clone(),
        config.source.fetch_concurrency,
    ));

    if cli.once {
        reconciler.recover().await;
        let stats = reconciler.reconcile_once().await;
        info!(?stats, "single pass done");
        return Ok(());
    }

    {
        let reconciler = Arc::clone(&reconciler);
        tokio::spawn(async move { reconciler.run().await });
    }

    let app = api::router(Arc::new(AppState {
        subscriptions,
        ledger,
        source,
        messenger,
        scheduler: Arc::clone(&scheduler),
    }));

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    info!(addr = %config.server.bind_addr, "shed-bot listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Timers are rebuilt from the ledger on the next start.
    scheduler.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
    }
    info!("shutdown requested");
}
