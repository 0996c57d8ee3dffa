//! Validates and executes remediation commands.
//!
//! Every [`Command`] produces exactly one [`CommandResult`]. Parameters are
//! checked before anything touches the host; failures are reported, never
//! retried. The dispatcher holds no mutable state, so clones can run
//! commands concurrently from the scan path and the remote-command path.

use std::net::IpAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::command::{Command, CommandKind, CommandResult};
use crate::errors::{ResponseError, ResponseResult};
use crate::host::HostActions;
use crate::hosts_file::extract_domain;
use crate::ProtectedPids;

pub const PARAM_PATH: &str = "path";
pub const PARAM_PID: &str = "pid";
pub const PARAM_IP: &str = "ip";
pub const PARAM_URL: &str = "url";
pub const PARAM_ALLOWED_IPS: &str = "allowed_ips";

/// A command whose parameters have been parsed and checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedAction {
    DeleteFile(PathBuf),
    KillProcess(u32),
    KillProcessTree(u32),
    BlockIp(IpAddr),
    BlockUrl(String),
    NetworkIsolate(Vec<IpAddr>),
    NetworkRestore,
}

#[derive(Clone)]
pub struct Dispatcher {
    host: Arc<dyn HostActions>,
    protected: ProtectedPids,
}

impl Dispatcher {
    pub fn new(host: Arc<dyn HostActions>) -> Self {
        Self::with_protected(host, ProtectedPids::for_current_process())
    }

    pub fn with_protected(host: Arc<dyn HostActions>, protected: ProtectedPids) -> Self {
        Self { host, protected }
    }

    pub fn platform(&self) -> &'static str {
        self.host.platform()
    }

    pub fn validate(&self, command: &Command) -> ResponseResult<ValidatedAction> {
        match command.kind {
            CommandKind::DeleteFile => {
                let path = command.required(PARAM_PATH)?;
                Ok(ValidatedAction::DeleteFile(PathBuf::from(path)))
            }
            CommandKind::KillProcess => Ok(ValidatedAction::KillProcess(self.target_pid(command)?)),
            CommandKind::KillProcessTree => {
                Ok(ValidatedAction::KillProcessTree(self.target_pid(command)?))
            }
            CommandKind::BlockIp => {
                let raw = command.required(PARAM_IP)?;
                Ok(ValidatedAction::BlockIp(parse_ip(PARAM_IP, raw)?))
            }
            CommandKind::BlockUrl => {
                let raw = command.required(PARAM_URL)?;
                Ok(ValidatedAction::BlockUrl(extract_domain(raw)?))
            }
            CommandKind::NetworkIsolate => {
                let allowed = match command.optional(PARAM_ALLOWED_IPS) {
                    Some(list) => list
                        .split(',')
                        .map(str::trim)
                        .filter(|ip| !ip.is_empty())
                        .map(|ip| parse_ip(PARAM_ALLOWED_IPS, ip))
                        .collect::<ResponseResult<Vec<_>>>()?,
                    None => Vec::new(),
                };
                Ok(ValidatedAction::NetworkIsolate(allowed))
            }
            CommandKind::NetworkRestore => Ok(ValidatedAction::NetworkRestore),
        }
    }

    fn target_pid(&self, command: &Command) -> ResponseResult<u32> {
        let raw = command.required(PARAM_PID)?;
        let pid = raw
            .parse::<u32>()
            .map_err(|_| ResponseError::invalid(PARAM_PID, format!("'{raw}' is not a process id")))?;
        if self.protected.is_protected(pid) {
            return Err(ResponseError::invalid(
                PARAM_PID,
                format!("process {pid} is protected"),
            ));
        }
        Ok(pid)
    }

    fn perform(&self, action: ValidatedAction) -> ResponseResult<String> {
        match action {
            ValidatedAction::DeleteFile(path) => self.host.delete_file(&path),
            ValidatedAction::KillProcess(pid) => self.host.kill_process(pid),
            ValidatedAction::KillProcessTree(pid) => self.host.kill_process_tree(pid),
            ValidatedAction::BlockIp(ip) => self.host.block_ip(ip),
            ValidatedAction::BlockUrl(domain) => self.host.block_url(&domain),
            ValidatedAction::NetworkIsolate(allowed) => self.host.isolate(&allowed),
            ValidatedAction::NetworkRestore => self.host.restore(),
        }
    }

    pub fn run(&self, command: &Command) -> ResponseResult<String> {
        let action = self.validate(command)?;
        self.perform(action)
    }

    /// Execute `command` and report its outcome.
    pub fn execute(&self, command: &Command) -> CommandResult {
        let started = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| self.run(command))).unwrap_or_else(|_| {
            Err(ResponseError::execution(
                command.kind.as_str(),
                "internal error while executing command",
            ))
        });
        let duration = started.elapsed();

        let (success, message) = match outcome {
            Ok(message) => {
                info!(
                    command_id = %command.command_id,
                    kind = %command.kind,
                    elapsed_ms = duration.as_millis() as u64,
                    "command succeeded"
                );
                (true, message)
            }
            Err(err) => {
                warn!(
                    command_id = %command.command_id,
                    kind = %command.kind,
                    error = %err,
                    "command failed"
                );
                (false, err.to_string())
            }
        };

        CommandResult {
            command_id: command.command_id.clone(),
            kind: command.kind,
            success,
            message,
            duration,
        }
    }
}

fn parse_ip(name: &'static str, raw: &str) -> ResponseResult<IpAddr> {
    detection::normalize_ip(raw)
        .and_then(|canonical| canonical.parse().ok())
        .ok_or_else(|| ResponseError::invalid(name, format!("'{raw}' is not an IP address")))
}
