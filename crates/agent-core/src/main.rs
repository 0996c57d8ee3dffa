mod config;
mod lifecycle;
mod scan;
mod transport;

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::AgentConfig;
use lifecycle::AgentRuntime;
use transport::{spawn_stdin_reader, write_outbound, ChannelSink};

const INBOUND_QUEUE_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the outbound JSON lines, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = AgentConfig::load()?;
    info!(
        agent_id = %config.agent_id,
        log_channel = %config.log_channel,
        scan_interval_minutes = config.scan_interval_minutes,
        autonomous = config.autonomous_response,
        durable_watermark = config.state_path.is_some(),
        "iocguard-agent core started"
    );

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_outbound(outbound_rx, tokio::io::stdout()));
    let runtime = AgentRuntime::new(config, Arc::new(ChannelSink::new(outbound_tx)))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed listening for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let inbound = spawn_stdin_reader(INBOUND_QUEUE_CAPACITY)?;
    runtime.run(inbound, shutdown_rx).await?;

    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %format!("{err:#}"), "outbound writer failed"),
        Err(err) => warn!(error = %err, "outbound writer task failed"),
    }
    info!("iocguard-agent stopped");
    Ok(())
}
