use std::path::Path;

use detection::{parse_hash_blob, sha256_file, Indicator, IndicatorKind, IocStore};
use platform_windows::{EventKind, SecurityEvent};
use tracing::debug;

/// What a match is attributed to; decides the synthesised remediation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// A running image. `pid` is 0 when the event did not carry one.
    Process { pid: u32, image_path: String },
    /// A file on disk.
    File { path: String },
}

impl Subject {
    pub fn path(&self) -> &str {
        match self {
            Self::Process { image_path, .. } => image_path,
            Self::File { path } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IocMatch {
    pub record_number: u32,
    pub event_kind: EventKind,
    pub subject: Subject,
    pub indicator: Indicator,
}

/// Hash indicators hit by `event`, at most one per subject.
pub fn evaluate_event(store: &IocStore, event: &SecurityEvent) -> Vec<IocMatch> {
    let found = |subject: Subject, indicator: Option<Indicator>| {
        indicator.map(|indicator| IocMatch {
            record_number: event.record_number,
            event_kind: event.kind,
            subject,
            indicator,
        })
    };

    match event.kind {
        EventKind::ProcessCreate | EventKind::FileDelete => {
            let subject = Subject::Process {
                pid: event.process_id,
                image_path: event.image_path.clone(),
            };
            found(subject, check_blob(store, &event.hash_blob))
                .into_iter()
                .collect()
        }
        EventKind::FileCreateStreamHash => {
            let subject = Subject::File {
                path: event.target_file_path.clone(),
            };
            found(subject, check_blob(store, &event.hash_blob))
                .into_iter()
                .collect()
        }
        EventKind::FileCreate => {
            let subject = Subject::File {
                path: event.target_file_path.clone(),
            };
            found(subject, check_live_file(store, &event.target_file_path))
                .into_iter()
                .collect()
        }
        EventKind::RemoteThreadCreate => {
            let source = Subject::Process {
                pid: event.source_process_id,
                image_path: event.source_image_path.clone(),
            };
            let target = Subject::Process {
                pid: event.target_process_id,
                image_path: event.target_image_path.clone(),
            };
            let source_hit = check_live_file(store, &event.source_image_path);
            let target_hit = check_live_file(store, &event.target_image_path);
            [found(source, source_hit), found(target, target_hit)]
                .into_iter()
                .flatten()
                .collect()
        }
    }
}

fn check_blob(store: &IocStore, blob: &str) -> Option<Indicator> {
    let hashes = parse_hash_blob(blob);
    store.check_first(IndicatorKind::Hash, hashes.iter().map(String::as_str))
}

/// Hash the file as it is on disk now. Unreadable or vanished files never match.
fn check_live_file(store: &IocStore, path: &str) -> Option<Indicator> {
    if path.is_empty() {
        return None;
    }
    match sha256_file(Path::new(path)) {
        Ok(digest) => store.check(IndicatorKind::Hash, &digest),
        Err(err) => {
            debug!(path, error = %err, "cannot hash file for indicator check");
            None
        }
    }
}
