use anyhow::Result;

use super::types::AgentConfig;

impl AgentConfig {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_file_config()?;
        cfg.apply_env_overrides();
        cfg.clamp_limits();
        Ok(cfg)
    }

    fn clamp_limits(&mut self) {
        self.scan_interval_minutes = self.scan_interval_minutes.max(1);
        self.scan_batch_size = self.scan_batch_size.max(1);
    }
}
