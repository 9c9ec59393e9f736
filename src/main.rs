use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rangeproxy::conn::handle_connection;
use rangeproxy::config::Config;
use rangeproxy::stats::Stats;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::parse().context("failed to load configuration")?;
    let listen_addr = config.listen_addr().context("invalid listen address")?;

    let stats = Arc::new(Stats::new());

    // for the moment, we just fail if the socket is in use
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;

    info!(%listen_addr, "rangeproxy listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer_addr)) => {
                        let stats = Arc::clone(&stats);
                        tokio::task::spawn(handle_connection(stream, peer_addr, listen_addr, stats));
                    }
                    Err(err) => warn!(%err, "failed to accept connection"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal, exiting");
                break;
            }
        }
    }

    Ok(())
}
