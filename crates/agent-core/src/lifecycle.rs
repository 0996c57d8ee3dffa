use std::sync::Arc;

use anyhow::Result;
use detection::IocStore;
use platform_windows::{LogSource, SystemLogSource};
use response::{select_host_actions, Dispatcher, HostActions, HostOptions};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::AgentConfig;
use crate::scan::{MatchResponder, ScanController, ScanScheduler, Watermark};
use crate::transport::ReportSink;

mod async_workers;
mod command_pipeline;
mod threat_intel_pipeline;

/// Owns the long-lived agent state and drives the scan and command paths.
pub struct AgentRuntime {
    config: AgentConfig,
    store: Arc<IocStore>,
    dispatcher: Dispatcher,
    sink: Arc<dyn ReportSink>,
    scheduler: Option<ScanScheduler>,
    command_tasks: JoinSet<()>,
}

impl AgentRuntime {
    /// Runtime on the host's native log channel and platform host actions.
    pub fn new(config: AgentConfig, sink: Arc<dyn ReportSink>) -> Result<Self> {
        let host = select_host_actions(&HostOptions {
            hosts_file: config.hosts_file.clone(),
            kill_grace: config.kill_grace(),
        });
        let source = Arc::new(SystemLogSource::new(config.log_channel.clone()));
        Self::with_parts(config, sink, host, source)
    }

    pub fn with_parts(
        config: AgentConfig,
        sink: Arc<dyn ReportSink>,
        host: Arc<dyn HostActions>,
        source: Arc<dyn LogSource>,
    ) -> Result<Self> {
        let store = Arc::new(IocStore::new());
        if let Some(path) = config.intel_seed_path.as_deref() {
            threat_intel_pipeline::seed_indicators(&store, path)?;
        }

        let dispatcher = Dispatcher::new(host);
        let responder = MatchResponder::new(
            dispatcher.clone(),
            Arc::clone(&sink),
            config.agent_id.clone(),
            config.autonomous_response,
        );
        let watermark = Arc::new(Watermark::load(config.state_path.clone()));
        let controller = ScanController::new(source, Arc::clone(&store), responder, watermark)
            .with_limits(config.scan_batch_size, config.cold_start_window);
        let scheduler = ScanScheduler::new(Arc::new(controller), config.scan_interval());

        Ok(Self {
            config,
            store,
            dispatcher,
            sink,
            scheduler: Some(scheduler),
            command_tasks: JoinSet::new(),
        })
    }

    pub fn store(&self) -> Arc<IocStore> {
        Arc::clone(&self.store)
    }

    /// Serve inbound messages and scheduled scans until `shutdown` is set.
    ///
    /// On shutdown the scheduler lets an in-flight cycle finish its batch and
    /// every running command completes before this returns.
    pub async fn run(
        mut self,
        mut inbound: mpsc::Receiver<String>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let scan_task = self
            .scheduler
            .take()
            .map(|scheduler| tokio::spawn(scheduler.run(shutdown.clone())));

        info!(
            agent_id = %self.config.agent_id,
            platform = self.dispatcher.platform(),
            autonomous = self.config.autonomous_response,
            "agent runtime started"
        );

        let mut inbound_open = true;
        while !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                line = inbound.recv(), if inbound_open => match line {
                    Some(line) => self.handle_inbound_line(&line),
                    None => {
                        info!("inbound stream closed; continuing with scheduled scans");
                        inbound_open = false;
                    }
                },
                Some(joined) = self.command_tasks.join_next(), if !self.command_tasks.is_empty() => {
                    self.log_command_join(joined);
                }
            }
        }

        info!("shutdown requested");
        if let Some(task) = scan_task {
            if let Err(err) = task.await {
                warn!(error = %err, "scan scheduler task failed");
            }
        }
        self.drain_command_tasks().await;
        Ok(())
    }
}
