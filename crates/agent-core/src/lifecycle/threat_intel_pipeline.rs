use std::path::Path;

use anyhow::{Context, Result};
use detection::{load_indicator_file, IndicatorKind, IocStore};
use tracing::info;

use super::AgentRuntime;
use crate::transport::IndicatorUpdate;

impl AgentRuntime {
    pub(super) fn apply_indicator_update(&mut self, update: IndicatorUpdate) {
        let (kind, indicators) = update.into_indicators();
        let received = indicators.len();
        let stored = self.store.replace_all(kind, indicators);
        info!(kind = %kind, received, stored, "indicator update applied");
    }
}

/// Load the seed file into `store`, one whole-set replace per kind.
pub(super) fn seed_indicators(store: &IocStore, path: &Path) -> Result<()> {
    let indicators = load_indicator_file(path)
        .with_context(|| format!("failed seeding indicators from {}", path.display()))?;
    store.replace_from(&indicators);
    info!(
        path = %path.display(),
        hashes = store.len(IndicatorKind::Hash),
        ips = store.len(IndicatorKind::IpAddress),
        urls = store.len(IndicatorKind::Url),
        "indicator store seeded"
    );
    Ok(())
}
