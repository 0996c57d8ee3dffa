use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Highest log record number already evaluated.
///
/// Only ever moves forward. `0` means nothing has been read yet and makes the
/// next cycle take the cold-start position.
#[derive(Debug, Default)]
pub struct Watermark {
    last_record_read: AtomicU32,
    path: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedScanState {
    last_record_read: u32,
}

impl Watermark {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Restore from `path`. A missing or unreadable file is a cold start.
    pub fn load(path: Option<PathBuf>) -> Self {
        let initial = path.as_deref().map(read_state).unwrap_or(0);
        if initial > 0 {
            info!(last_record_read = initial, "restored scan watermark");
        }
        Self {
            last_record_read: AtomicU32::new(initial),
            path,
        }
    }

    pub fn get(&self) -> u32 {
        self.last_record_read.load(Ordering::Acquire)
    }

    /// Raise the watermark to `record_number` if it is higher. Returns the
    /// resulting value.
    pub fn advance(&self, record_number: u32) -> u32 {
        let previous = self
            .last_record_read
            .fetch_max(record_number, Ordering::AcqRel);
        previous.max(record_number)
    }

    /// Write the current value if a state path is configured.
    pub fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let state = PersistedScanState {
            last_record_read: self.get(),
        };
        let body = serde_json::to_vec(&state).context("failed encoding scan state")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed creating {}", parent.display()))?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, body)
            .with_context(|| format!("failed writing scan state {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("failed replacing scan state {}", path.display()))?;
        Ok(())
    }
}

fn read_state(path: &Path) -> u32 {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cannot read scan state; cold start");
            return 0;
        }
    };
    match serde_json::from_slice::<PersistedScanState>(&raw) {
        Ok(state) => state.last_record_read,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "corrupt scan state; cold start");
            0
        }
    }
}

/// Record number the next cycle should start reading at.
///
/// A cold start skips to the last `cold_start_window` records so startup cost
/// stays bounded and old history is not replayed as live detections. A
/// watermark that fell behind the oldest retained record resumes at `oldest`.
pub fn start_record(last_record_read: u32, oldest: u32, total: u32, cold_start_window: u32) -> u32 {
    if last_record_read == 0 {
        let skip = total.saturating_sub(cold_start_window);
        return oldest.max(oldest.saturating_add(skip));
    }
    last_record_read.saturating_add(1).max(oldest)
}
