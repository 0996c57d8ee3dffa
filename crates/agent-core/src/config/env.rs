use std::path::PathBuf;

use super::types::AgentConfig;
use super::util::{default_agent_id, env_non_empty, env_parse, parse_bool};

impl AgentConfig {
    pub(super) fn apply_env_overrides(&mut self) {
        self.apply_env_agent_identity();
        self.apply_env_scan();
        self.apply_env_response();
        self.apply_env_intel();
        self.ensure_valid_agent_id();
    }

    fn apply_env_agent_identity(&mut self) {
        if let Some(v) = env_non_empty("IOCGUARD_AGENT_ID") {
            self.agent_id = v;
        }
    }

    fn apply_env_scan(&mut self) {
        if let Some(v) = env_parse::<u64>("IOCGUARD_SCAN_INTERVAL_MINUTES") {
            self.scan_interval_minutes = v;
        }
        if let Some(v) = env_parse::<usize>("IOCGUARD_SCAN_BATCH_SIZE") {
            self.scan_batch_size = v;
        }
        if let Some(v) = env_parse::<u32>("IOCGUARD_COLD_START_WINDOW") {
            self.cold_start_window = v;
        }
        if let Some(v) = env_non_empty("IOCGUARD_LOG_CHANNEL") {
            self.log_channel = v;
        }
        if let Some(v) = env_non_empty("IOCGUARD_STATE_PATH") {
            self.state_path = Some(PathBuf::from(v));
        }
    }

    fn apply_env_response(&mut self) {
        if let Some(v) = env_non_empty("IOCGUARD_AUTONOMOUS_RESPONSE") {
            self.autonomous_response = parse_bool(&v);
        }
        if let Some(v) = env_non_empty("IOCGUARD_HOSTS_FILE") {
            self.hosts_file = PathBuf::from(v);
        }
        if let Some(v) = env_parse::<u64>("IOCGUARD_KILL_GRACE_MS") {
            self.kill_grace_ms = v;
        }
    }

    fn apply_env_intel(&mut self) {
        if let Some(v) = env_non_empty("IOCGUARD_INTEL_SEED") {
            self.intel_seed_path = Some(PathBuf::from(v));
        }
    }

    fn ensure_valid_agent_id(&mut self) {
        if self.agent_id.trim().is_empty() {
            self.agent_id = default_agent_id();
        }
    }
}
