//! Platform-windows crate: native security event log ingestion.
//!
//! Reads raw `EVENTLOGRECORD` entries from the Sysmon channel, decodes the
//! five tracked event kinds into [`SecurityEvent`] values and exposes the
//! log behind the [`SecurityLog`] / [`LogSource`] seams so callers can swap
//! in other sources.

pub mod eventlog;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use eventlog::{
    decode_record, is_tracked_event_id, open_security_log, DecodeSkip, EventLogError,
    EventLogResult, FieldLayout, LogBatch, LogSource, RawRecord, SecurityLog, SystemLogSource,
    DEFAULT_LOG_CHANNEL,
};

// ── Shared event types ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    ProcessCreate,
    FileCreate,
    FileCreateStreamHash,
    FileDelete,
    RemoteThreadCreate,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessCreate => "process_create",
            Self::FileCreate => "file_create",
            Self::FileCreateStreamHash => "file_create_stream_hash",
            Self::FileDelete => "file_delete",
            Self::RemoteThreadCreate => "remote_thread_create",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded audit record. Fields a kind does not carry stay empty (or 0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub record_number: u32,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub process_id: u32,
    pub image_path: String,
    pub command_line: String,
    pub target_file_path: String,
    pub source_process_id: u32,
    pub source_image_path: String,
    pub target_process_id: u32,
    pub target_image_path: String,
    pub hash_blob: String,
}

impl SecurityEvent {
    pub(crate) fn empty(record_number: u32, kind: EventKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            record_number,
            kind,
            timestamp,
            process_id: 0,
            image_path: String::new(),
            command_line: String::new(),
            target_file_path: String::new(),
            source_process_id: 0,
            source_image_path: String::new(),
            target_process_id: 0,
            target_image_path: String::new(),
            hash_blob: String::new(),
        }
    }
}
