use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{HostActions, HostOptions, ISOLATION_TAG};
use crate::errors::{ResponseError, ResponseResult};
use crate::hosts_file::append_block_entry;
use crate::runner::{args, CommandRunner};

// Absolute system paths avoid PATH-search hijacking from the agent service.
pub const NETSH_EXE: &str = r"C:\Windows\System32\netsh.exe";
pub const TASKKILL_EXE: &str = r"C:\Windows\System32\taskkill.exe";

pub const BLOCK_RULE_PREFIX: &str = "IOCGuard-Block-";
pub const ISOLATION_ALLOW_RULE: &str = "IOCGuard-Isolate-Allow";

const NO_MATCHING_RULES: &str = "No rules match";

pub struct WindowsHost {
    runner: Arc<dyn CommandRunner>,
    hosts_file: PathBuf,
}

impl WindowsHost {
    pub fn new(runner: Arc<dyn CommandRunner>, options: &HostOptions) -> Self {
        Self {
            runner,
            hosts_file: options.hosts_file.clone(),
        }
    }

    pub fn system(options: &HostOptions) -> Self {
        Self::new(Arc::new(crate::runner::SystemCommandRunner), options)
    }

    fn netsh(&self, rule: Vec<String>) -> ResponseResult<String> {
        self.runner.run(NETSH_EXE, &rule)
    }

    fn add_allow_rule(&self, dir: &str, ip: &str) -> ResponseResult<String> {
        self.netsh(vec![
            "advfirewall".into(),
            "firewall".into(),
            "add".into(),
            "rule".into(),
            format!("name={ISOLATION_ALLOW_RULE}"),
            format!("dir={dir}"),
            "action=allow".into(),
            format!("remoteip={ip}"),
        ])
    }

    fn apply_isolation(&self, allowed: &[IpAddr]) -> ResponseResult<()> {
        self.netsh(args(["advfirewall", "set", "allprofiles", "state", "on"]))?;
        // Block rules outrank allow rules in Windows Firewall, so default-deny
        // is expressed as profile policy and the allow rules carve exceptions.
        self.netsh(args([
            "advfirewall",
            "set",
            "allprofiles",
            "firewallpolicy",
            "blockinbound,blockoutbound",
        ]))?;
        for ip in allowed {
            let addr = ip.to_string();
            self.add_allow_rule("out", &addr)?;
            self.add_allow_rule("in", &addr)?;
        }
        Ok(())
    }

    fn remove_isolation(&self) -> ResponseResult<()> {
        match self.netsh(vec![
            "advfirewall".into(),
            "firewall".into(),
            "delete".into(),
            "rule".into(),
            format!("name={ISOLATION_ALLOW_RULE}"),
        ]) {
            Ok(_) => {}
            Err(ResponseError::ExecutionFailure { detail, .. })
                if detail.contains(NO_MATCHING_RULES) =>
            {
                debug!("no isolation allow rules to remove");
            }
            Err(err) => return Err(err),
        }
        self.netsh(args([
            "advfirewall",
            "set",
            "allprofiles",
            "firewallpolicy",
            "blockinbound,allowoutbound",
        ]))?;
        Ok(())
    }
}

impl HostActions for WindowsHost {
    fn platform(&self) -> &'static str {
        "windows"
    }

    #[cfg(target_os = "windows")]
    fn kill_process(&self, pid: u32) -> ResponseResult<String> {
        terminate_process(pid)?;
        Ok(format!("terminated process {pid}"))
    }

    #[cfg(not(target_os = "windows"))]
    fn kill_process(&self, pid: u32) -> ResponseResult<String> {
        let pid_arg = pid.to_string();
        self.runner
            .run(TASKKILL_EXE, &args(["/PID", &pid_arg, "/F"]))?;
        Ok(format!("terminated process {pid}"))
    }

    fn kill_process_tree(&self, pid: u32) -> ResponseResult<String> {
        let pid_arg = pid.to_string();
        self.runner
            .run(TASKKILL_EXE, &args(["/PID", &pid_arg, "/T", "/F"]))?;
        Ok(format!("terminated process tree of {pid}"))
    }

    fn block_ip(&self, ip: IpAddr) -> ResponseResult<String> {
        let addr = ip.to_string();
        let rule_name = format!("{BLOCK_RULE_PREFIX}{addr}");
        self.netsh(vec![
            "advfirewall".into(),
            "firewall".into(),
            "add".into(),
            "rule".into(),
            format!("name={rule_name}"),
            "dir=in".into(),
            "action=block".into(),
            format!("remoteip={addr}"),
        ])?;
        Ok(format!("blocked inbound traffic from {addr} (rule {rule_name})"))
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
            warn!(error = %err, tag = ISOLATION_TAG, "isolation failed; rolling back");
            if let Err(rollback) = self.remove_isolation() {
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
        self.remove_isolation()?;
        Ok("network access restored".to_string())
    }
}

#[cfg(target_os = "windows")]
fn terminate_process(pid: u32) -> ResponseResult<()> {
    use ::windows::Win32::Foundation::CloseHandle;
    use ::windows::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

    // SAFETY: the handle is checked before use and closed on every path.
    unsafe {
        let handle = OpenProcess(PROCESS_TERMINATE, false, pid)
            .map_err(|err| ResponseError::execution("OpenProcess", format!("pid {pid}: {err}")))?;
        let result = TerminateProcess(handle, 1);
        let _ = CloseHandle(handle);
        result.map_err(|err| {
            ResponseError::execution("TerminateProcess", format!("pid {pid}: {err}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::host::recording::RecordingRunner;

    fn host(runner: Arc<RecordingRunner>) -> WindowsHost {
        WindowsHost::new(runner, &HostOptions::default())
    }

    /// Replays netsh calls against a set of rule names.
    fn rules_after(calls: &[String]) -> HashSet<String> {
        let mut rules = HashSet::new();
        for call in calls {
            let name = call
                .split(' ')
                .find_map(|part| part.strip_prefix("name="))
                .map(str::to_string);
            match name {
                Some(name) if call.contains(" add rule ") => {
                    rules.insert(name);
                }
                Some(name) if call.contains(" delete rule ") => {
                    rules.remove(&name);
                }
                _ => {}
            }
        }
        rules
    }

    #[test]
    fn isolate_then_restore_leaves_no_isolation_rules() {
        let runner = Arc::new(RecordingRunner::default());
        let host = host(Arc::clone(&runner));
        let allowed: Vec<IpAddr> = vec![
            "1.1.1.1".parse().expect("ip"),
            "8.8.8.8".parse().expect("ip"),
        ];

        host.isolate(&allowed).expect("isolate");
        let isolated = rules_after(&runner.calls());
        assert!(isolated.contains(ISOLATION_ALLOW_RULE));
        assert!(runner
            .calls()
            .iter()
            .any(|c| c.ends_with("firewallpolicy blockinbound,blockoutbound")));

        host.restore().expect("restore");
        let calls = runner.calls();
        assert!(rules_after(&calls)
            .iter()
            .all(|name| !name.starts_with(ISOLATION_TAG)));
        assert!(calls
            .last()
            .is_some_and(|c| c.ends_with("firewallpolicy blockinbound,allowoutbound")));
    }

    #[test]
    fn block_ip_rule_is_named_after_address() {
        let runner = Arc::new(RecordingRunner::default());
        let host = host(Arc::clone(&runner));

        let message = host.block_ip("203.0.113.9".parse().expect("ip")).expect("block");
        assert!(message.contains("IOCGuard-Block-203.0.113.9"));
        assert_eq!(
            runner.calls(),
            vec![format!(
                "{NETSH_EXE} advfirewall firewall add rule name=IOCGuard-Block-203.0.113.9 \
                 dir=in action=block remoteip=203.0.113.9"
            )]
        );
    }

    #[test]
    fn kill_tree_uses_taskkill_with_tree_and_force() {
        let runner = Arc::new(RecordingRunner::default());
        let host = host(Arc::clone(&runner));

        host.kill_process_tree(1234).expect("kill tree");
        assert_eq!(
            runner.calls(),
            vec![format!("{TASKKILL_EXE} /PID 1234 /T /F")]
        );
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn kill_single_process_uses_taskkill_without_tree() {
        let runner = Arc::new(RecordingRunner::default());
        let host = host(Arc::clone(&runner));

        let message = host.kill_process(4321).expect("kill");
        assert_eq!(message, "terminated process 4321");
        assert_eq!(runner.calls(), vec![format!("{TASKKILL_EXE} /PID 4321 /F")]);
    }

    #[test]
    fn taskkill_failure_carries_tool_output() {
        let runner = Arc::new(RecordingRunner::failing_on("/PID 77"));
        let host = host(runner);

        let err = host.kill_process_tree(77).expect_err("taskkill fails");
        match err {
            ResponseError::ExecutionFailure { tool, detail } => {
                assert_eq!(tool, TASKKILL_EXE);
                assert_eq!(detail, "simulated failure");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
