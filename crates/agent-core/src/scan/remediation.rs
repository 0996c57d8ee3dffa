use std::sync::Arc;

use chrono::Utc;
use response::dispatcher::{PARAM_PATH, PARAM_PID};
use response::{Command, CommandKind, Dispatcher};
use tracing::{info, warn};

use super::evaluate::{IocMatch, Subject};
use crate::transport::{CommandResultEnvelope, IocMatchReport, ReportSink};

const NO_ACTION: &str = "none";

/// Turns matches into remediation and reports.
pub struct MatchResponder {
    dispatcher: Dispatcher,
    sink: Arc<dyn ReportSink>,
    agent_id: String,
    autonomous: bool,
}

impl MatchResponder {
    pub fn new(
        dispatcher: Dispatcher,
        sink: Arc<dyn ReportSink>,
        agent_id: impl Into<String>,
        autonomous: bool,
    ) -> Self {
        Self {
            dispatcher,
            sink,
            agent_id: agent_id.into(),
            autonomous,
        }
    }

    /// Remediate (when autonomous) and report one match. `seq` numbers the
    /// matches of a record. Returns whether remediation failed.
    pub fn respond(&self, found: &IocMatch, seq: usize) -> bool {
        warn!(
            record_number = found.record_number,
            event_kind = %found.event_kind,
            subject = found.subject.path(),
            indicator = %found.indicator.value,
            severity = found.indicator.severity.as_str(),
            "indicator of compromise matched"
        );

        let (action_taken, action_success, action_message) = if self.autonomous {
            let command = synthesize_command(found, seq);
            let result = self.dispatcher.execute(&command);
            let outcome = (
                command.kind.as_str().to_string(),
                result.success,
                result.message.clone(),
            );
            self.sink.command_result(CommandResultEnvelope::from_result(
                &self.agent_id,
                result,
                Utc::now(),
            ));
            outcome
        } else {
            info!(record_number = found.record_number, "autonomous response disabled");
            (
                NO_ACTION.to_string(),
                false,
                "autonomous response disabled".to_string(),
            )
        };

        let failed = self.autonomous && !action_success;
        self.sink.ioc_match(IocMatchReport {
            agent_id: self.agent_id.clone(),
            timestamp: Utc::now(),
            record_number: found.record_number,
            indicator_kind: found.indicator.kind,
            indicator_value: found.indicator.value.clone(),
            severity: found.indicator.severity,
            matched_file_or_process: found.subject.path().to_string(),
            action_taken,
            action_success,
            action_message,
        });
        failed
    }
}

/// Kill a process subject when its pid is known, otherwise delete the file.
pub fn synthesize_command(found: &IocMatch, seq: usize) -> Command {
    let command_id = format!("auto-{}-{}", found.record_number, seq);
    match &found.subject {
        Subject::Process { pid, .. } if *pid != 0 => {
            Command::new(command_id, CommandKind::KillProcess).with_param(PARAM_PID, pid.to_string())
        }
        subject => Command::new(command_id, CommandKind::DeleteFile)
            .with_param(PARAM_PATH, subject.path()),
    }
}
