use platform_windows::DEFAULT_LOG_CHANNEL;
use response::hosts_file::default_hosts_path;

use super::constants::{
    DEFAULT_COLD_START_WINDOW, DEFAULT_KILL_GRACE_MS, DEFAULT_SCAN_BATCH_SIZE,
    DEFAULT_SCAN_INTERVAL_MINUTES,
};
use super::types::AgentConfig;
use super::util::default_agent_id;

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_id: default_agent_id(),
            scan_interval_minutes: DEFAULT_SCAN_INTERVAL_MINUTES,
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
            cold_start_window: DEFAULT_COLD_START_WINDOW,
            log_channel: DEFAULT_LOG_CHANNEL.to_string(),
            state_path: None,
            autonomous_response: true,
            hosts_file: default_hosts_path(),
            kill_grace_ms: DEFAULT_KILL_GRACE_MS,
            intel_seed_path: None,
        }
    }
}
