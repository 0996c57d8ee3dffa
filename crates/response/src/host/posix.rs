use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::{HostActions, HostOptions, ISOLATION_TAG};
use crate::errors::{ResponseError, ResponseResult};
use crate::hosts_file::append_block_entry;
use crate::kill::{kill_process_tree_with, ProcessIntrospector, Signal, SignalSender};
use crate::runner::{args, CommandRunner};
use crate::ProtectedPids;

const IPTABLES: &str = "iptables";
const IP6TABLES: &str = "ip6tables";

pub struct PosixHost {
    runner: Arc<dyn CommandRunner>,
    signals: Arc<dyn SignalSender>,
    introspector: Arc<dyn ProcessIntrospector>,
    hosts_file: PathBuf,
    kill_grace: Duration,
    protected: ProtectedPids,
}

impl PosixHost {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        signals: Arc<dyn SignalSender>,
        introspector: Arc<dyn ProcessIntrospector>,
        options: &HostOptions,
    ) -> Self {
        Self {
            runner,
            signals,
            introspector,
            hosts_file: options.hosts_file.clone(),
            kill_grace: options.kill_grace,
            protected: ProtectedPids::for_current_process(),
        }
    }

    #[cfg(unix)]
    pub fn system(options: &HostOptions) -> Self {
        Self::new(
            Arc::new(crate::runner::SystemCommandRunner),
            Arc::new(crate::kill::NixSignalSender),
            Arc::new(crate::kill::ProcfsIntrospector),
            options,
        )
    }

    fn iptables(&self, ip: Option<&IpAddr>, rule: Vec<String>) -> ResponseResult<String> {
        let tool = match ip {
            Some(IpAddr::V6(_)) => IP6TABLES,
            _ => IPTABLES,
        };
        self.runner.run(tool, &rule)
    }

    /// Both address families. A host without `ip6tables` gets v4 rules only.
    fn both_families(&self, rule: Vec<String>) -> ResponseResult<()> {
        self.runner.run(IPTABLES, &rule)?;
        self.ip6tables_if_present(&rule)
    }

    fn ip6tables_if_present(&self, rule: &[String]) -> ResponseResult<()> {
        match self.runner.run(IP6TABLES, rule) {
            Ok(_) => Ok(()),
            Err(ResponseError::ToolNotFound(tool)) => {
                warn!(tool = %tool, "ip6tables not installed; skipping IPv6 rule");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn apply_isolation(&self, allowed: &[IpAddr]) -> ResponseResult<()> {
        for chain in ["INPUT", "OUTPUT", "FORWARD"] {
            self.both_families(args(["-P", chain, "DROP"]))?;
        }
        self.both_families(tagged(args(["-A", "INPUT", "-i", "lo", "-j", "ACCEPT"])))?;
        self.both_families(tagged(args(["-A", "OUTPUT", "-o", "lo", "-j", "ACCEPT"])))?;

        for ip in allowed {
            let addr = ip.to_string();
            for rule in [
                tagged(args(["-A", "INPUT", "-s", &addr, "-j", "ACCEPT"])),
                tagged(args(["-A", "OUTPUT", "-d", &addr, "-j", "ACCEPT"])),
            ] {
                match ip {
                    IpAddr::V4(_) => {
                        self.runner.run(IPTABLES, &rule)?;
                    }
                    IpAddr::V6(_) => self.ip6tables_if_present(&rule)?,
                }
            }
        }
        Ok(())
    }

    fn reset_policies(&self) -> ResponseResult<()> {
        for chain in ["INPUT", "OUTPUT", "FORWARD"] {
            self.both_families(args(["-P", chain, "ACCEPT"]))?;
        }
        self.both_families(args(["-F"]))
    }
}

fn tagged(mut rule: Vec<String>) -> Vec<String> {
    rule.extend(args(["-m", "comment", "--comment", ISOLATION_TAG]));
    rule
}

impl HostActions for PosixHost {
    fn platform(&self) -> &'static str {
        "posix"
    }

    fn kill_process(&self, pid: u32) -> ResponseResult<String> {
        self.signals.send(pid, Signal::SIGTERM)?;
        Ok(format!("sent SIGTERM to process {pid}"))
    }

    fn kill_process_tree(&self, pid: u32) -> ResponseResult<String> {
        let report = kill_process_tree_with(
            pid,
            &self.protected,
            self.introspector.as_ref(),
            self.signals.as_ref(),
            self.kill_grace,
        )?;
        info!(
            pid,
            terminated = report.terminated_pids.len(),
            force_killed = report.force_killed_pids.len(),
            "process tree terminated"
        );
        let mut message = format!(
            "terminated process tree of {} ({} processes",
            pid,
            report.terminated_pids.len()
        );
        if !report.force_killed_pids.is_empty() {
            message.push_str(&format!(
                ", {} force killed",
                report.force_killed_pids.len()
            ));
        }
        if !report.skipped_protected_pids.is_empty() {
            message.push_str(&format!(
                ", {} protected skipped",
                report.skipped_protected_pids.len()
            ));
        }
        message.push(')');
        Ok(message)
    }

    fn block_ip(&self, ip: IpAddr) -> ResponseResult<String> {
        let addr = ip.to_string();
        self.iptables(Some(&ip), args(["-A", "INPUT", "-s", &addr, "-j", "DROP"]))?;
        Ok(format!("blocked inbound traffic from {addr}"))
    }

    fn block_url(&self, domain: &str) -> ResponseResult<String> {
        append_block_entry(&self.hosts_file, domain)?;
        Ok(format!(
            "blocked {} via {}",
            domain,
            self.hosts_file.display()
        ))
    }

    fn isolate(&self, allowed: &[IpAddr]) -> ResponseResult<String> {
        if let Err(err) = self.apply_isolation(allowed) {
            warn!(error = %err, "isolation failed; rolling back");
            if let Err(rollback) = self.reset_policies() {
                warn!(error = %rollback, "isolation rollback failed");
            }
            return Err(err);
        }
        Ok(format!(
            "host isolated ({} allowed addresses)",
            allowed.len()
        ))
    }

    fn restore(&self) -> ResponseResult<String> {
        self.reset_policies()?;
        Ok("network access restored".to_string())
    }
}
