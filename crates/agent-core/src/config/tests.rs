use super::paths::resolve_config_path;
use super::util::parse_bool;
use super::*;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn clear_env() {
    let vars = [
        "IOCGUARD_AGENT_CONFIG",
        "IOCGUARD_AGENT_ID",
        "IOCGUARD_SCAN_INTERVAL_MINUTES",
        "IOCGUARD_SCAN_BATCH_SIZE",
        "IOCGUARD_COLD_START_WINDOW",
        "IOCGUARD_LOG_CHANNEL",
        "IOCGUARD_STATE_PATH",
        "IOCGUARD_AUTONOMOUS_RESPONSE",
        "IOCGUARD_HOSTS_FILE",
        "IOCGUARD_KILL_GRACE_MS",
        "IOCGUARD_INTEL_SEED",
    ];
    for v in vars {
        std::env::remove_var(v);
    }
}

fn temp_config(contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "iocguard-agent-config-{}.toml",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default()
    ));
    let mut f = std::fs::File::create(&path).expect("create file");
    f.write_all(contents.as_bytes()).expect("write file");
    path
}

#[test]
fn defaults_apply_without_file_or_env() {
    let _guard = env_lock().lock().expect("env lock");
    clear_env();

    let cfg = AgentConfig::default();
    assert_eq!(cfg.scan_interval_minutes, 5);
    assert_eq!(cfg.scan_batch_size, 100);
    assert_eq!(cfg.cold_start_window, 1000);
    assert_eq!(cfg.log_channel, "Microsoft-Windows-Sysmon/Operational");
    assert!(cfg.autonomous_response);
    assert_eq!(cfg.kill_grace(), Duration::from_secs(2));
    assert!(cfg.state_path.is_none());
    assert!(!cfg.agent_id.trim().is_empty());
}

#[test]
fn file_config_is_loaded() {
    let _guard = env_lock().lock().expect("env lock");
    clear_env();

    let path = temp_config(
        "[agent]\nid=\"host-42\"\n\
         [scan]\ninterval_minutes=10\nbatch_size=50\ncold_start_window=200\n\
         log_channel=\"Security\"\nstate_path=\"/var/lib/iocguard/state.json\"\n\
         [response]\nautonomous=false\nhosts_file=\"/tmp/hosts\"\nkill_grace_ms=500\n\
         [intel]\nseed_path=\"/etc/iocguard-agent/ioc.json\"\n",
    );
    std::env::set_var("IOCGUARD_AGENT_CONFIG", &path);
    let cfg = AgentConfig::load().expect("load config");

    assert_eq!(cfg.agent_id, "host-42");
    assert_eq!(cfg.scan_interval(), Duration::from_secs(600));
    assert_eq!(cfg.scan_batch_size, 50);
    assert_eq!(cfg.cold_start_window, 200);
    assert_eq!(cfg.log_channel, "Security");
    assert_eq!(
        cfg.state_path.as_deref(),
        Some(std::path::Path::new("/var/lib/iocguard/state.json"))
    );
    assert!(!cfg.autonomous_response);
    assert_eq!(cfg.hosts_file, PathBuf::from("/tmp/hosts"));
    assert_eq!(cfg.kill_grace_ms, 500);
    assert_eq!(
        cfg.intel_seed_path,
        Some(PathBuf::from("/etc/iocguard-agent/ioc.json"))
    );

    clear_env();
    let _ = std::fs::remove_file(path);
}

#[test]
fn env_overrides_take_precedence_over_file() {
    let _guard = env_lock().lock().expect("env lock");
    clear_env();

    let path = temp_config("[agent]\nid=\"from-file\"\n[scan]\nbatch_size=50\n");
    std::env::set_var("IOCGUARD_AGENT_CONFIG", &path);
    std::env::set_var("IOCGUARD_AGENT_ID", "from-env");
    std::env::set_var("IOCGUARD_SCAN_BATCH_SIZE", "25");
    std::env::set_var("IOCGUARD_AUTONOMOUS_RESPONSE", "off");
    std::env::set_var("IOCGUARD_STATE_PATH", "/tmp/iocguard-state.json");

    let cfg = AgentConfig::load().expect("load config");
    assert_eq!(cfg.agent_id, "from-env");
    assert_eq!(cfg.scan_batch_size, 25);
    assert!(!cfg.autonomous_response);
    assert_eq!(
        cfg.state_path,
        Some(PathBuf::from("/tmp/iocguard-state.json"))
    );

    clear_env();
    let _ = std::fs::remove_file(path);
}

#[test]
fn unparsable_env_values_are_ignored_and_zero_limits_clamped() {
    let _guard = env_lock().lock().expect("env lock");
    clear_env();

    let path = temp_config("[scan]\ninterval_minutes=0\nbatch_size=0\n");
    std::env::set_var("IOCGUARD_AGENT_CONFIG", &path);
    std::env::set_var("IOCGUARD_KILL_GRACE_MS", "soon");

    let cfg = AgentConfig::load().expect("load config");
    assert_eq!(cfg.scan_interval_minutes, 1);
    assert_eq!(cfg.scan_batch_size, 1);
    assert_eq!(cfg.kill_grace_ms, 2000);

    clear_env();
    let _ = std::fs::remove_file(path);
}

#[test]
fn missing_explicit_config_path_is_an_error() {
    let _guard = env_lock().lock().expect("env lock");
    clear_env();

    std::env::set_var(
        "IOCGUARD_AGENT_CONFIG",
        std::env::temp_dir().join("iocguard-does-not-exist.toml"),
    );
    let err = resolve_config_path().expect_err("missing path");
    assert!(err.to_string().contains("IOCGUARD_AGENT_CONFIG"));

    clear_env();
}

#[test]
fn malformed_toml_reports_the_file() {
    let _guard = env_lock().lock().expect("env lock");
    clear_env();

    let path = temp_config("[scan\nbatch_size=");
    std::env::set_var("IOCGUARD_AGENT_CONFIG", &path);
    let err = AgentConfig::load().expect_err("bad toml");
    assert!(format!("{err:#}").contains("failed parsing TOML config"));

    clear_env();
    let _ = std::fs::remove_file(path);
}

#[test]
fn parse_bool_accepts_common_truthy_spellings() {
    for raw in ["1", "true", "YES", " enabled ", "on"] {
        assert!(parse_bool(raw), "{raw}");
    }
    for raw in ["0", "false", "off", "nope", ""] {
        assert!(!parse_bool(raw), "{raw}");
    }
}
