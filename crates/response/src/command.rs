use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{ResponseError, ResponseResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    DeleteFile,
    KillProcess,
    KillProcessTree,
    BlockIp,
    BlockUrl,
    NetworkIsolate,
    NetworkRestore,
}

impl CommandKind {
    pub const ALL: [CommandKind; 7] = [
        Self::DeleteFile,
        Self::KillProcess,
        Self::KillProcessTree,
        Self::BlockIp,
        Self::BlockUrl,
        Self::NetworkIsolate,
        Self::NetworkRestore,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DeleteFile => "delete_file",
            Self::KillProcess => "kill_process",
            Self::KillProcessTree => "kill_process_tree",
            Self::BlockIp => "block_ip",
            Self::BlockUrl => "block_url",
            Self::NetworkIsolate => "network_isolate",
            Self::NetworkRestore => "network_restore",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of remediation work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub command_id: String,
    pub kind: CommandKind,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl Command {
    pub fn new(command_id: impl Into<String>, kind: CommandKind) -> Self {
        Self {
            command_id: command_id.into(),
            kind,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Non-empty trimmed value of a required parameter.
    pub fn required(&self, name: &'static str) -> ResponseResult<&str> {
        self.optional(name)
            .ok_or(ResponseError::MissingParameter(name))
    }

    pub fn optional(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }
}

/// Outcome of exactly one [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub command_id: String,
    pub kind: CommandKind,
    pub success: bool,
    pub message: String,
    pub duration: Duration,
}
