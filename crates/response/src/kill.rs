use std::collections::HashSet;
use std::time::{Duration, Instant};

#[cfg(target_os = "linux")]
use std::fs;

#[cfg(unix)]
use nix::sys::signal::{kill, Signal as NixSignal};
#[cfg(unix)]
use nix::unistd::Pid;

use crate::errors::{ResponseError, ResponseResult};
use crate::ProtectedPids;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    SIGTERM,
    SIGKILL,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillReport {
    pub target_pid: u32,
    /// Every pid sent SIGTERM, deepest descendants first, target last.
    pub terminated_pids: Vec<u32>,
    /// Pids still alive after the grace period and sent SIGKILL.
    pub force_killed_pids: Vec<u32>,
    pub skipped_protected_pids: Vec<u32>,
}

pub trait ProcessIntrospector: Send + Sync {
    fn children_of(&self, pid: u32) -> Vec<u32>;
    fn is_alive(&self, pid: u32) -> bool;
}

pub trait SignalSender: Send + Sync {
    fn send(&self, pid: u32, signal: Signal) -> ResponseResult<()>;
}

pub struct ProcfsIntrospector;

#[cfg(target_os = "linux")]
impl ProcessIntrospector for ProcfsIntrospector {
    fn children_of(&self, pid: u32) -> Vec<u32> {
        let path = format!("/proc/{}/task/{}/children", pid, pid);
        match fs::read_to_string(path) {
            Ok(content) => content
                .split_whitespace()
                .filter_map(|raw| raw.parse::<u32>().ok())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        // Zombies keep their /proc entry but are already dead.
        match fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.split_whitespace().next())
                .map(|state| state != "Z" && state != "X")
                .unwrap_or(true),
            Err(_) => false,
        }
    }
}

#[cfg(not(target_os = "linux"))]
impl ProcessIntrospector for ProcfsIntrospector {
    fn children_of(&self, _pid: u32) -> Vec<u32> {
        Vec::new()
    }

    fn is_alive(&self, pid: u32) -> bool {
        #[cfg(unix)]
        {
            kill(Pid::from_raw(pid as i32), None).is_ok()
        }
        #[cfg(not(unix))]
        {
            let _ = pid;
            false
        }
    }
}

#[cfg(unix)]
pub struct NixSignalSender;

#[cfg(unix)]
impl SignalSender for NixSignalSender {
    fn send(&self, pid: u32, signal: Signal) -> ResponseResult<()> {
        let nix_signal = match signal {
            Signal::SIGTERM => NixSignal::SIGTERM,
            Signal::SIGKILL => NixSignal::SIGKILL,
        };
        let raw = i32::try_from(pid)
            .map_err(|_| ResponseError::invalid("pid", format!("{pid} out of range")))?;

        kill(Pid::from_raw(raw), nix_signal).map_err(|err| {
            ResponseError::execution("kill", format!("send {:?} to {}: {}", signal, pid, err))
        })
    }
}

/// Terminate `pid` and its descendants.
///
/// Children are sent SIGTERM deepest-first, then the root. Anything still
/// alive once `grace` has elapsed is sent SIGKILL. The root signal failing
/// fails the whole operation; descendant failures are tolerated since a
/// child may exit on its own while the tree is being walked.
pub fn kill_process_tree_with(
    pid: u32,
    protected: &ProtectedPids,
    introspector: &dyn ProcessIntrospector,
    sender: &dyn SignalSender,
    grace: Duration,
) -> ResponseResult<KillReport> {
    if protected.is_protected(pid) {
        return Err(ResponseError::ProtectedProcess(pid));
    }

    let mut descendants = Vec::new();
    let mut seen = HashSet::new();
    let _ = seen.insert(pid);
    collect_descendants(pid, introspector, &mut descendants, &mut seen);

    let mut terminated = Vec::new();
    let mut skipped = Vec::new();

    for child in descendants.iter().rev() {
        if protected.is_protected(*child) {
            skipped.push(*child);
            continue;
        }
        if let Err(err) = sender.send(*child, Signal::SIGTERM) {
            tracing::debug!(pid = *child, error = %err, "descendant signal failed");
            continue;
        }
        terminated.push(*child);
    }

    sender.send(pid, Signal::SIGTERM)?;
    terminated.push(pid);

    let deadline = Instant::now() + grace;
    let mut survivors: Vec<u32> = terminated.clone();
    loop {
        survivors.retain(|p| introspector.is_alive(*p));
        if survivors.is_empty() || Instant::now() >= deadline {
            break;
        }
        std::thread::sleep(POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now())));
    }

    let mut force_killed = Vec::new();
    for survivor in survivors {
        if sender.send(survivor, Signal::SIGKILL).is_ok() {
            force_killed.push(survivor);
        }
    }

    Ok(KillReport {
        target_pid: pid,
        terminated_pids: terminated,
        force_killed_pids: force_killed,
        skipped_protected_pids: skipped,
    })
}

fn collect_descendants(
    pid: u32,
    introspector: &dyn ProcessIntrospector,
    out: &mut Vec<u32>,
    seen: &mut HashSet<u32>,
) {
    for child in introspector.children_of(pid) {
        if !seen.insert(child) {
            continue;
        }
        out.push(child);
        collect_descendants(child, introspector, out, seen);
    }
}
