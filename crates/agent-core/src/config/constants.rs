#[cfg(target_os = "windows")]
pub(super) const AGENT_CONFIG_CANDIDATES: [&str; 3] = [
    r"C:\ProgramData\IOCGuard\agent.toml",
    r".\conf\agent.toml",
    r".\agent.toml",
];

#[cfg(not(target_os = "windows"))]
pub(super) const AGENT_CONFIG_CANDIDATES: [&str; 3] = [
    "/etc/iocguard-agent/agent.toml",
    "./conf/agent.toml",
    "./agent.toml",
];

pub(super) const DEFAULT_SCAN_INTERVAL_MINUTES: u64 = 5;
pub(super) const DEFAULT_SCAN_BATCH_SIZE: usize = 100;
pub(super) const DEFAULT_COLD_START_WINDOW: u32 = 1000;
pub(super) const DEFAULT_KILL_GRACE_MS: u64 = 2000;

pub(super) const ENV_CONFIG_PATH: &str = "IOCGUARD_AGENT_CONFIG";
