use std::path::PathBuf;
use std::time::Duration;

/// Effective agent settings after defaults, the TOML file and `IOCGUARD_*`
/// environment overrides have been layered.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub agent_id: String,

    pub scan_interval_minutes: u64,
    pub scan_batch_size: usize,
    pub cold_start_window: u32,
    pub log_channel: String,
    /// Where the watermark is persisted; `None` keeps it in memory only.
    pub state_path: Option<PathBuf>,

    pub autonomous_response: bool,
    pub hosts_file: PathBuf,
    pub kill_grace_ms: u64,

    pub intel_seed_path: Option<PathBuf>,
}

impl AgentConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_minutes.max(1).saturating_mul(60))
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}
