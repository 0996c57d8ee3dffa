use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::paths::resolve_config_path;
use super::types::AgentConfig;
use super::util::non_empty;

impl AgentConfig {
    pub(super) fn apply_file_config(&mut self) -> Result<bool> {
        let Some(path) = resolve_config_path()? else {
            return Ok(false);
        };

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed reading config file {}", path.display()))?;
        let file_cfg: FileConfig = toml::from_str(&raw)
            .with_context(|| format!("failed parsing TOML config {}", path.display()))?;

        self.apply_file_agent(file_cfg.agent);
        self.apply_file_scan(file_cfg.scan);
        self.apply_file_response(file_cfg.response);
        self.apply_file_intel(file_cfg.intel);

        Ok(true)
    }

    fn apply_file_agent(&mut self, agent: Option<FileAgentConfig>) {
        let Some(agent) = agent else {
            return;
        };
        if let Some(v) = non_empty(agent.id) {
            self.agent_id = v;
        }
    }

    fn apply_file_scan(&mut self, scan: Option<FileScanConfig>) {
        let Some(scan) = scan else {
            return;
        };
        if let Some(v) = scan.interval_minutes {
            self.scan_interval_minutes = v;
        }
        if let Some(v) = scan.batch_size {
            self.scan_batch_size = v;
        }
        if let Some(v) = scan.cold_start_window {
            self.cold_start_window = v;
        }
        if let Some(v) = non_empty(scan.log_channel) {
            self.log_channel = v;
        }
        if let Some(v) = scan.state_path {
            self.state_path = Some(v);
        }
    }

    fn apply_file_response(&mut self, response: Option<FileResponseConfig>) {
        let Some(response) = response else {
            return;
        };
        if let Some(v) = response.autonomous {
            self.autonomous_response = v;
        }
        if let Some(v) = response.hosts_file {
            self.hosts_file = v;
        }
        if let Some(v) = response.kill_grace_ms {
            self.kill_grace_ms = v;
        }
    }

    fn apply_file_intel(&mut self, intel: Option<FileIntelConfig>) {
        let Some(intel) = intel else {
            return;
        };
        if let Some(v) = intel.seed_path {
            self.intel_seed_path = Some(v);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    agent: Option<FileAgentConfig>,
    #[serde(default)]
    scan: Option<FileScanConfig>,
    #[serde(default)]
    response: Option<FileResponseConfig>,
    #[serde(default)]
    intel: Option<FileIntelConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct FileAgentConfig {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct FileScanConfig {
    #[serde(default)]
    interval_minutes: Option<u64>,
    #[serde(default)]
    batch_size: Option<usize>,
    #[serde(default)]
    cold_start_window: Option<u32>,
    #[serde(default)]
    log_channel: Option<String>,
    #[serde(default)]
    state_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct FileResponseConfig {
    #[serde(default)]
    autonomous: Option<bool>,
    #[serde(default)]
    hosts_file: Option<PathBuf>,
    #[serde(default)]
    kill_grace_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct FileIntelConfig {
    #[serde(default)]
    seed_path: Option<PathBuf>,
}
