//! In-memory indicator store.
//!
//! Each indicator kind is held as one immutable map behind an `Arc`. A
//! lookup clones the `Arc` under a read lock and works on that snapshot;
//! `replace_all` builds the new map without holding any lock and swaps the
//! `Arc` in one short write. Readers therefore see either the complete old
//! set or the complete new set.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::normalize::normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Hash,
    #[serde(alias = "ip")]
    IpAddress,
    #[serde(alias = "domain")]
    Url,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 3] = [Self::Hash, Self::IpAddress, Self::Url];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::IpAddress => "ip_address",
            Self::Url => "url",
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    pub kind: IndicatorKind,
    pub value: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Indicator {
    pub fn new(kind: IndicatorKind, value: impl Into<String>, severity: Severity) -> Self {
        Self {
            kind,
            value: value.into(),
            severity,
            description: None,
        }
    }
}

pub type IndicatorSet = HashMap<String, Indicator>;

#[derive(Debug, Default)]
pub struct IocStore {
    hashes: RwLock<Arc<IndicatorSet>>,
    ips: RwLock<Arc<IndicatorSet>>,
    urls: RwLock<Arc<IndicatorSet>>,
}

impl IocStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, kind: IndicatorKind) -> &RwLock<Arc<IndicatorSet>> {
        match kind {
            IndicatorKind::Hash => &self.hashes,
            IndicatorKind::IpAddress => &self.ips,
            IndicatorKind::Url => &self.urls,
        }
    }

    /// Current set for `kind`. Later replacements do not affect the snapshot.
    pub fn snapshot(&self, kind: IndicatorKind) -> Arc<IndicatorSet> {
        let guard = self
            .slot(kind)
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Look up `value` after normalising it the same way stored values are.
    pub fn check(&self, kind: IndicatorKind, value: &str) -> Option<Indicator> {
        let key = normalize(kind, value)?;
        self.snapshot(kind).get(&key).cloned()
    }

    /// First of `values` present in the set, checked against one snapshot.
    pub fn check_first<'a, I>(&self, kind: IndicatorKind, values: I) -> Option<Indicator>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let set = self.snapshot(kind);
        values
            .into_iter()
            .filter_map(|value| normalize(kind, value))
            .find_map(|key| set.get(&key).cloned())
    }

    /// Replace every indicator of `kind`. Entries of another kind or with a
    /// value that does not normalise are dropped. Returns the new set size.
    pub fn replace_all<I>(&self, kind: IndicatorKind, indicators: I) -> usize
    where
        I: IntoIterator<Item = Indicator>,
    {
        let mut next = IndicatorSet::new();
        let mut rejected = 0usize;
        for mut indicator in indicators {
            if indicator.kind != kind {
                rejected += 1;
                continue;
            }
            let Some(key) = normalize(kind, &indicator.value) else {
                debug!(kind = %kind, value = %indicator.value, "dropping unparsable indicator");
                rejected += 1;
                continue;
            };
            indicator.value = key.clone();
            next.insert(key, indicator);
        }

        let count = next.len();
        let next = Arc::new(next);
        {
            let mut guard = self
                .slot(kind)
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            *guard = next;
        }

        if rejected > 0 {
            warn!(kind = %kind, rejected, "indicator update contained invalid entries");
        }
        info!(kind = %kind, count, "indicator set replaced");
        count
    }

    pub fn len(&self, kind: IndicatorKind) -> usize {
        self.snapshot(kind).len()
    }

    pub fn is_empty(&self) -> bool {
        IndicatorKind::ALL.iter().all(|kind| self.len(*kind) == 0)
    }

    /// Replace each kind with the matching subset of `indicators`.
    /// Kinds with no entries are cleared.
    pub fn replace_from(&self, indicators: &[Indicator]) {
        for kind in IndicatorKind::ALL {
            let subset = indicators.iter().filter(|i| i.kind == kind).cloned();
            self.replace_all(kind, subset);
        }
    }
}

/// Indicator seed file: a JSON array, or `{ "indicators": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SeedFile {
    List(Vec<Indicator>),
    Wrapped { indicators: Vec<Indicator> },
}

pub fn load_indicator_file(path: &Path) -> Result<Vec<Indicator>, IntelError> {
    let raw = std::fs::read_to_string(path).map_err(|source| IntelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: SeedFile = serde_json::from_str(&raw).map_err(|source| IntelError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(match parsed {
        SeedFile::List(list) => list,
        SeedFile::Wrapped { indicators } => indicators,
    })
}

#[derive(Debug)]
pub enum IntelError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for IntelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed reading indicators {}: {}", path.display(), source)
            }
            Self::Parse { path, source } => {
                write!(f, "invalid indicator file {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for IntelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}
