//!
//! src/main.rs
//!
//! Loads configuration, starts logging and serves the now-playing
//! endpoint until Ctrl-C.
//!

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use nowplaying_resolver::{NowPlayingResolver, ResolverError, config, logging, server};

#[tokio::main]
async fn main() -> Result<(), ResolverError> {
    let cfgs = config::load_config()?;
    let _guard = logging::init_logging(&cfgs.logging)?;

    tracing::info!(
        service="nowplaying-resolver",
        version=%env!("CARGO_PKG_VERSION"),
        "starting"
    );

    let resolver = Arc::new(NowPlayingResolver::from_config(&cfgs)?);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown.signal");
        }
        signal.cancel();
    });

    server::serve(&cfgs.server, resolver, shutdown).await?;
    tracing::info!("server.exit");
    Ok(())
}
