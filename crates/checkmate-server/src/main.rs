//! Checkmate Server - library management backend.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkmate_core::CredentialLedger;
use checkmate_server::{
    Args, AuthenticationService, LibraryContinuity, LibraryService, MemoryAccountStore,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "checkmate_server=info,checkmate_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting Checkmate server");

    let config = Args::parse().into_config()?;

    tracing::info!(
        heartbeat = ?config.continuity.heartbeat_interval,
        write_timeout = ?config.continuity.write_timeout,
        add_user_lifespan = ?config.add_user_lifespan,
        bootstrap = config.bootstrap,
        "configuration loaded"
    );

    let accounts = Arc::new(MemoryAccountStore::new());
    let credentials = Arc::new(CredentialLedger::new(config.credentials.clone()));
    let continuity = Arc::new(LibraryContinuity::new(&config.continuity));

    // No network transport is attached: the services run in-process until
    // a transport crate drives them.
    let _auth = AuthenticationService::new(
        accounts.clone(),
        credentials.clone(),
        continuity.clone(),
        &config,
    )
    .await?;
    let _library = LibraryService::new(accounts, continuity.clone(), credentials.clone(), &config);

    tracing::info!("services built in-process, no transport attached; waiting for shutdown signal");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl+c");
    } else {
        tracing::info!("received shutdown signal");
    }

    continuity.shutdown();
    credentials.shutdown();
    tracing::info!("server shutdown complete");

    Ok(())
}
