//! Remediation for the IOCGuard agent.
//!
//! [`Dispatcher`] turns a [`Command`] into host actions through the
//! [`HostActions`] capability trait, with POSIX and Windows implementations.

use std::collections::HashSet;

pub mod command;
pub mod dispatcher;
pub mod errors;
pub mod host;
pub mod hosts_file;
pub mod kill;
pub mod runner;

pub use command::{Command, CommandKind, CommandResult};
pub use dispatcher::{Dispatcher, ValidatedAction};
pub use errors::{ResponseError, ResponseResult};
pub use host::{select_host_actions, HostActions, HostOptions, PosixHost, WindowsHost};
pub use runner::{CommandRunner, SystemCommandRunner};

/// Process ids kill commands must never target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedPids {
    pids: HashSet<u32>,
}

impl ProtectedPids {
    /// Idle (0), init (1) and the Windows System process (4).
    pub const SYSTEM: [u32; 3] = [0, 1, 4];

    pub fn new(pids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            pids: pids.into_iter().collect(),
        }
    }

    /// System pids plus the agent's own.
    pub fn for_current_process() -> Self {
        let mut protected = Self::new(Self::SYSTEM);
        protected.pids.insert(std::process::id());
        protected
    }

    pub fn is_protected(&self, pid: u32) -> bool {
        self.pids.contains(&pid)
    }
}

#[cfg(test)]
mod tests;
