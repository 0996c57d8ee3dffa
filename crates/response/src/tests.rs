use std::net::IpAddr;
use std::path::Path;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use super::*;

/// Records host calls; kills of `failing_pid` fail.
#[derive(Default)]
struct MockHost {
    calls: Mutex<Vec<String>>,
    failing_pid: Option<u32>,
    barrier: Option<Arc<Barrier>>,
}

impl MockHost {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

impl HostActions for MockHost {
    fn platform(&self) -> &'static str {
        "mock"
    }

    fn kill_process(&self, pid: u32) -> ResponseResult<String> {
        if let Some(barrier) = &self.barrier {
            barrier.wait();
        }
        self.record(format!("kill {pid}"));
        if self.failing_pid == Some(pid) {
            return Err(ResponseError::ExecutionFailure {
                tool: "kill".to_string(),
                detail: format!("no such process {pid}"),
            });
        }
        Ok(format!("sent SIGTERM to process {pid}"))
    }

    fn kill_process_tree(&self, pid: u32) -> ResponseResult<String> {
        self.record(format!("kill_tree {pid}"));
        Ok(format!("terminated process tree of {pid}"))
    }

    fn block_ip(&self, ip: IpAddr) -> ResponseResult<String> {
        self.record(format!("block_ip {ip}"));
        Ok(format!("blocked {ip}"))
    }

    fn block_url(&self, domain: &str) -> ResponseResult<String> {
        self.record(format!("block_url {domain}"));
        Ok(format!("blocked {domain}"))
    }

    fn isolate(&self, allowed: &[IpAddr]) -> ResponseResult<String> {
        let list: Vec<String> = allowed.iter().map(IpAddr::to_string).collect();
        self.record(format!("isolate {}", list.join(",")));
        Ok("isolated".to_string())
    }

    fn restore(&self) -> ResponseResult<String> {
        self.record("restore".to_string());
        Ok("restored".to_string())
    }
}

fn dispatcher(host: Arc<MockHost>) -> Dispatcher {
    Dispatcher::with_protected(host, ProtectedPids::new([0, 1, 4, 999]))
}

#[test]
fn delete_missing_file_reports_file_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("x");
    let host = Arc::new(MockHost::default());

    let cmd = Command::new("del-1", CommandKind::DeleteFile)
        .with_param("path", missing.to_string_lossy());
    let result = dispatcher(host).execute(&cmd);

    assert_eq!(result.command_id, "del-1");
    assert!(!result.success);
    assert!(result.message.contains("file not found"), "{}", result.message);
}

#[test]
fn delete_existing_file_removes_it() {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = dir.path().join("payload.bin");
    std::fs::write(&target, b"MZ").expect("write");

    let cmd = Command::new("del-2", CommandKind::DeleteFile)
        .with_param("path", target.to_string_lossy());
    let result = dispatcher(Arc::new(MockHost::default())).execute(&cmd);

    assert!(result.success, "{}", result.message);
    assert!(!Path::new(&target).exists());
}

#[test]
fn delete_refuses_directories() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cmd = Command::new("del-3", CommandKind::DeleteFile)
        .with_param("path", dir.path().to_string_lossy());
    let result = dispatcher(Arc::new(MockHost::default())).execute(&cmd);

    assert!(!result.success);
    assert!(dir.path().exists());
}

#[test]
fn missing_parameters_are_rejected_before_execution() {
    let host = Arc::new(MockHost::default());
    let dispatcher = dispatcher(Arc::clone(&host));

    for (kind, param) in [
        (CommandKind::DeleteFile, "path"),
        (CommandKind::KillProcess, "pid"),
        (CommandKind::KillProcessTree, "pid"),
        (CommandKind::BlockIp, "ip"),
        (CommandKind::BlockUrl, "url"),
    ] {
        let cmd = Command::new(format!("missing-{kind}"), kind);
        let err = dispatcher.run(&cmd).expect_err("missing parameter");
        assert!(
            matches!(err, ResponseError::MissingParameter(name) if name == param),
            "{kind}: {err}"
        );
    }
    assert!(host.calls().is_empty());
}

#[test]
fn invalid_and_protected_parameters_are_rejected() {
    let host = Arc::new(MockHost::default());
    let dispatcher = dispatcher(Arc::clone(&host));

    let cases = [
        Command::new("a", CommandKind::KillProcess).with_param("pid", "abc"),
        Command::new("b", CommandKind::KillProcess).with_param("pid", "4"),
        Command::new("c", CommandKind::KillProcessTree).with_param("pid", "999"),
        Command::new("d", CommandKind::BlockIp).with_param("ip", "300.1.1.1"),
        Command::new("e", CommandKind::BlockUrl).with_param("url", "https://"),
        Command::new("f", CommandKind::NetworkIsolate).with_param("allowed_ips", "1.1.1.1,nope"),
    ];
    for cmd in cases {
        let err = dispatcher.run(&cmd).expect_err("invalid parameter");
        assert!(
            matches!(err, ResponseError::InvalidParameter { .. }),
            "{}: {err}",
            cmd.command_id
        );
    }
    assert!(host.calls().is_empty());
}

#[test]
fn valid_commands_reach_the_host() {
    let host = Arc::new(MockHost::default());
    let dispatcher = dispatcher(Arc::clone(&host));

    let commands = [
        Command::new("1", CommandKind::KillProcessTree).with_param("pid", "321"),
        Command::new("2", CommandKind::BlockIp).with_param("ip", " 2001:DB8::1 "),
        Command::new("3", CommandKind::BlockUrl).with_param("url", "http://Evil.Example/x"),
        Command::new("4", CommandKind::NetworkIsolate)
            .with_param("allowed_ips", "1.1.1.1, 8.8.8.8"),
        Command::new("5", CommandKind::NetworkIsolate),
        Command::new("6", CommandKind::NetworkRestore),
    ];
    for cmd in &commands {
        let result = dispatcher.execute(cmd);
        assert!(result.success, "{}: {}", cmd.command_id, result.message);
    }

    assert_eq!(
        host.calls(),
        vec![
            "kill_tree 321",
            "block_ip 2001:db8::1",
            "block_url evil.example",
            "isolate 1.1.1.1,8.8.8.8",
            "isolate ",
            "restore",
        ]
    );
}

#[test]
fn concurrent_kills_complete_and_report_independently() {
    let barrier = Arc::new(Barrier::new(2));
    let host = Arc::new(MockHost {
        failing_pid: Some(2002),
        barrier: Some(Arc::clone(&barrier)),
        ..MockHost::default()
    });
    let dispatcher = dispatcher(Arc::clone(&host));

    let handles: Vec<_> = [("k-1", 1001u32), ("k-2", 2002u32)]
        .into_iter()
        .map(|(id, pid)| {
            let dispatcher = dispatcher.clone();
            thread::spawn(move || {
                let cmd = Command::new(id, CommandKind::KillProcess).with_param("pid", pid.to_string());
                dispatcher.execute(&cmd)
            })
        })
        .collect();

    let mut results: Vec<CommandResult> = handles
        .into_iter()
        .map(|h| h.join().expect("worker thread"))
        .collect();
    results.sort_by(|a, b| a.command_id.cmp(&b.command_id));

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].command_id, "k-1");
    assert!(results[0].success);
    assert_eq!(results[1].command_id, "k-2");
    assert!(!results[1].success);
    assert!(results[1].message.contains("no such process 2002"));
}

#[test]
fn panicking_host_still_yields_one_failed_result() {
    struct PanickingHost;

    impl HostActions for PanickingHost {
        fn platform(&self) -> &'static str {
            "panic"
        }
        fn kill_process(&self, _pid: u32) -> ResponseResult<String> {
            panic!("host implementation bug")
        }
        fn kill_process_tree(&self, _pid: u32) -> ResponseResult<String> {
            unreachable!()
        }
        fn block_ip(&self, _ip: IpAddr) -> ResponseResult<String> {
            unreachable!()
        }
        fn block_url(&self, _domain: &str) -> ResponseResult<String> {
            unreachable!()
        }
        fn isolate(&self, _allowed: &[IpAddr]) -> ResponseResult<String> {
            unreachable!()
        }
        fn restore(&self) -> ResponseResult<String> {
            unreachable!()
        }
    }

    let dispatcher = Dispatcher::with_protected(Arc::new(PanickingHost), ProtectedPids::new([]));
    let cmd = Command::new("p-1", CommandKind::KillProcess).with_param("pid", "55");
    let result = dispatcher.execute(&cmd);

    assert!(!result.success);
    assert_eq!(result.command_id, "p-1");
    assert!(result.message.contains("internal error"));
}

#[test]
fn own_pid_is_protected_by_default() {
    let protected = ProtectedPids::for_current_process();
    assert!(protected.is_protected(std::process::id()));
    assert!(protected.is_protected(4));
    assert!(!protected.is_protected(31337));
}
