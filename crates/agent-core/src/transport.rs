//! Wire types and the reporting seam between the agent and its controller.
//!
//! The shipped adapter speaks JSON lines: inbound messages on stdin, outbound
//! reports on stdout. [`ReportSink`] is the only thing the scan and command
//! paths see, so a networked transport can replace it.

use std::collections::BTreeMap;
use std::io::BufRead;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use detection::{Indicator, IndicatorKind, Severity};
use response::{Command, CommandKind, CommandResult};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Inbound controller message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    Command(CommandEnvelope),
    Indicators(IndicatorUpdate),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandEnvelope {
    pub command_id: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    pub kind: CommandKind,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl CommandEnvelope {
    pub fn into_command(self) -> Command {
        Command {
            command_id: self.command_id,
            kind: self.kind,
            params: self.params,
        }
    }
}

/// Full replacement of one indicator kind.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IndicatorUpdate {
    pub kind: IndicatorKind,
    #[serde(default)]
    pub indicators: Vec<IndicatorEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IndicatorEntry {
    pub value: String,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_severity() -> Severity {
    Severity::Medium
}

impl IndicatorUpdate {
    pub fn into_indicators(self) -> (IndicatorKind, Vec<Indicator>) {
        let kind = self.kind;
        let indicators = self
            .indicators
            .into_iter()
            .map(|entry| Indicator {
                kind,
                value: entry.value,
                severity: entry.severity,
                description: entry.description,
            })
            .collect();
        (kind, indicators)
    }
}

pub fn parse_inbound(line: &str) -> Result<Inbound> {
    serde_json::from_str(line).context("invalid inbound message")
}

/// Outbound message, tagged the same way as [`Inbound`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    CommandResult(CommandResultEnvelope),
    IocMatch(IocMatchReport),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResultEnvelope {
    pub command_id: String,
    pub agent_id: String,
    pub kind: CommandKind,
    pub success: bool,
    pub message: String,
    pub duration_ms: u64,
    pub execution_time: DateTime<Utc>,
}

impl CommandResultEnvelope {
    pub fn from_result(agent_id: &str, result: CommandResult, finished_at: DateTime<Utc>) -> Self {
        Self {
            command_id: result.command_id,
            agent_id: agent_id.to_string(),
            kind: result.kind,
            success: result.success,
            message: result.message,
            duration_ms: u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX),
            execution_time: finished_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IocMatchReport {
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub record_number: u32,
    pub indicator_kind: IndicatorKind,
    pub indicator_value: String,
    pub severity: Severity,
    pub matched_file_or_process: String,
    /// Wire name of the remediation command, or `"none"`.
    pub action_taken: String,
    pub action_success: bool,
    pub action_message: String,
}

/// Where command results and match reports go. Delivery is fire-and-forget.
pub trait ReportSink: Send + Sync {
    fn command_result(&self, envelope: CommandResultEnvelope);
    fn ioc_match(&self, report: IocMatchReport);
}

/// Forwards reports to an outbound writer task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { tx }
    }

    fn send(&self, message: Outbound) {
        if self.tx.send(message).is_err() {
            warn!("outbound channel closed; dropping report");
        }
    }
}

impl ReportSink for ChannelSink {
    fn command_result(&self, envelope: CommandResultEnvelope) {
        self.send(Outbound::CommandResult(envelope));
    }

    fn ioc_match(&self, report: IocMatchReport) {
        self.send(Outbound::IocMatch(report));
    }
}

/// Read inbound lines from stdin on a plain thread.
///
/// A blocking stdin read cannot be cancelled, so it stays off the async
/// runtime; the thread simply ends with the process.
pub fn spawn_stdin_reader(capacity: usize) -> Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    std::thread::Builder::new()
        .name("inbound-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "stdin read failed");
                        break;
                    }
                }
            }
            debug!("stdin reader finished");
        })
        .context("failed spawning stdin reader")?;
    Ok(rx)
}

/// Drain `rx` as JSON lines into `out` until every sender is gone.
pub async fn write_outbound<W>(mut rx: mpsc::UnboundedReceiver<Outbound>, mut out: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line = match serde_json::to_vec(&message) {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "failed encoding outbound message");
                continue;
            }
        };
        line.push(b'\n');
        out.write_all(&line)
            .await
            .context("failed writing outbound message")?;
        out.flush().await.context("failed flushing outbound stream")?;
    }
    debug!("outbound channel drained");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn command_messages_parse_with_defaults() {
        let line = r#"{"type":"command","command_id":"c-1","kind":"block_ip","params":{"ip":"10.0.0.9"}}"#;
        let Inbound::Command(envelope) = parse_inbound(line).expect("parse") else {
            panic!("expected a command");
        };
        assert_eq!(envelope.agent_id, None);
        let command = envelope.into_command();
        assert_eq!(command.command_id, "c-1");
        assert_eq!(command.kind, CommandKind::BlockIp);
        assert_eq!(command.optional("ip"), Some("10.0.0.9"));
    }

    #[test]
    fn indicator_updates_carry_kind_onto_entries() {
        let line = r#"{"type":"indicators","kind":"hash","indicators":[
            {"value":"AA11","severity":"high"},{"value":"bb22"}]}"#;
        let Inbound::Indicators(update) = parse_inbound(line).expect("parse") else {
            panic!("expected indicators");
        };
        let (kind, indicators) = update.into_indicators();
        assert_eq!(kind, IndicatorKind::Hash);
        assert_eq!(indicators.len(), 2);
        assert!(indicators.iter().all(|i| i.kind == IndicatorKind::Hash));
        assert_eq!(indicators[0].severity, Severity::High);
        assert_eq!(indicators[1].severity, Severity::Medium);
    }

    #[test]
    fn unknown_message_types_are_rejected() {
        assert!(parse_inbound(r#"{"type":"heartbeat"}"#).is_err());
        assert!(parse_inbound("not json").is_err());
        assert!(parse_inbound(r#"{"type":"command","command_id":"x","kind":"reboot"}"#).is_err());
    }

    #[tokio::test]
    async fn outbound_messages_are_written_as_json_lines() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = ChannelSink::new(tx);
        let finished_at = Utc::now();
        sink.command_result(CommandResultEnvelope::from_result(
            "agent-1",
            CommandResult {
                command_id: "c-9".into(),
                kind: CommandKind::NetworkRestore,
                success: true,
                message: "network access restored".into(),
                duration: Duration::from_millis(12),
            },
            finished_at,
        ));
        drop(sink);

        let mut out = Vec::new();
        write_outbound(rx, &mut out).await.expect("write");
        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1);

        let value: serde_json::Value = serde_json::from_str(lines[0]).expect("json");
        assert_eq!(value["type"], "command_result");
        assert_eq!(value["command_id"], "c-9");
        assert_eq!(value["agent_id"], "agent-1");
        assert_eq!(value["kind"], "network_restore");
        assert_eq!(value["duration_ms"], 12);
        assert_eq!(value["success"], true);
    }
}
