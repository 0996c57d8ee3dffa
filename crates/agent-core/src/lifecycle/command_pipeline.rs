use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use response::CommandResult;
use tracing::{info, warn};

use super::AgentRuntime;
use crate::transport::{parse_inbound, CommandEnvelope, CommandResultEnvelope, Inbound};

impl AgentRuntime {
    pub(super) fn handle_inbound_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        match parse_inbound(line) {
            Ok(Inbound::Command(envelope)) => self.handle_command(envelope),
            Ok(Inbound::Indicators(update)) => self.apply_indicator_update(update),
            Err(err) => warn!(error = %format!("{err:#}"), "ignoring inbound message"),
        }
    }

    /// Run a remote command on its own blocking task. Exactly one result is
    /// reported per command.
    pub(super) fn handle_command(&mut self, envelope: CommandEnvelope) {
        let agent_id = self.config.agent_id.clone();
        let sink = Arc::clone(&self.sink);

        if let Some(target) = envelope.agent_id.as_deref() {
            if target != agent_id {
                warn!(
                    command_id = %envelope.command_id,
                    target,
                    "command addressed to another agent"
                );
                let result = CommandResult {
                    command_id: envelope.command_id,
                    kind: envelope.kind,
                    success: false,
                    message: format!("command addressed to agent {target}"),
                    duration: Duration::ZERO,
                };
                sink.command_result(CommandResultEnvelope::from_result(
                    &agent_id,
                    result,
                    Utc::now(),
                ));
                return;
            }
        }

        let command = envelope.into_command();
        info!(command_id = %command.command_id, kind = %command.kind, "remote command received");
        let dispatcher = self.dispatcher.clone();
        self.command_tasks.spawn_blocking(move || {
            let result = dispatcher.execute(&command);
            sink.command_result(CommandResultEnvelope::from_result(
                &agent_id,
                result,
                Utc::now(),
            ));
        });
    }
}
