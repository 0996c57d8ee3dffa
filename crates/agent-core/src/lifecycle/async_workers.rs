use tokio::task::JoinError;
use tracing::{info, warn};

use super::AgentRuntime;

impl AgentRuntime {
    pub(super) fn log_command_join(&self, joined: Result<(), JoinError>) {
        if let Err(err) = joined {
            warn!(error = %err, "remote command worker task join failed");
        }
    }

    /// Wait for every in-flight remote command. Commands are never aborted.
    pub(super) async fn drain_command_tasks(&mut self) {
        if !self.command_tasks.is_empty() {
            info!(
                pending = self.command_tasks.len(),
                "waiting for in-flight commands"
            );
        }
        while let Some(joined) = self.command_tasks.join_next().await {
            self.log_command_join(joined);
        }
    }
}
