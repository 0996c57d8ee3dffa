//! Maps tracked Sysmon records to [`SecurityEvent`].
//!
//! Field extraction is positional: each kind has a [`FieldLayout`] naming
//! which insertion string holds which field. Indices follow the Sysmon
//! schema the agent was calibrated against and are best-effort; a schema
//! change only needs a new table here.

use chrono::{DateTime, Utc};

use super::record::RawRecord;
use crate::{EventKind, SecurityEvent};

pub const EVENT_PROCESS_CREATE: u32 = 1;
pub const EVENT_CREATE_REMOTE_THREAD: u32 = 8;
pub const EVENT_FILE_CREATE: u32 = 11;
pub const EVENT_FILE_CREATE_STREAM_HASH: u32 = 15;
pub const EVENT_FILE_DELETE: u32 = 23;
pub const EVENT_FILE_DELETE_DETECTED: u32 = 26;

/// Insertion-string index per field. `None` means the kind does not carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    pub process_id: Option<usize>,
    pub image_path: Option<usize>,
    pub command_line: Option<usize>,
    pub target_file_path: Option<usize>,
    pub hash_blob: Option<usize>,
    pub source_process_id: Option<usize>,
    pub source_image_path: Option<usize>,
    pub target_process_id: Option<usize>,
    pub target_image_path: Option<usize>,
}

impl FieldLayout {
    /// Schema revision the tables below were taken from.
    pub const VERSION: u32 = 4;

    const NONE: Self = Self {
        process_id: None,
        image_path: None,
        command_line: None,
        target_file_path: None,
        hash_blob: None,
        source_process_id: None,
        source_image_path: None,
        target_process_id: None,
        target_image_path: None,
    };

    pub const fn for_kind(kind: EventKind) -> Self {
        match kind {
            EventKind::ProcessCreate => Self {
                process_id: Some(3),
                image_path: Some(4),
                command_line: Some(10),
                hash_blob: Some(17),
                ..Self::NONE
            },
            EventKind::FileCreate => Self {
                process_id: Some(3),
                image_path: Some(4),
                target_file_path: Some(5),
                ..Self::NONE
            },
            EventKind::FileCreateStreamHash => Self {
                process_id: Some(3),
                image_path: Some(4),
                target_file_path: Some(5),
                hash_blob: Some(7),
                ..Self::NONE
            },
            EventKind::FileDelete => Self {
                process_id: Some(3),
                image_path: Some(5),
                target_file_path: Some(6),
                hash_blob: Some(7),
                ..Self::NONE
            },
            EventKind::RemoteThreadCreate => Self {
                source_process_id: Some(3),
                source_image_path: Some(4),
                target_process_id: Some(6),
                target_image_path: Some(7),
                ..Self::NONE
            },
        }
    }
}

/// Kind for a tracked event code, `None` for everything else.
pub fn event_kind_for(event_code: u32) -> Option<EventKind> {
    match event_code {
        EVENT_PROCESS_CREATE => Some(EventKind::ProcessCreate),
        EVENT_CREATE_REMOTE_THREAD => Some(EventKind::RemoteThreadCreate),
        EVENT_FILE_CREATE => Some(EventKind::FileCreate),
        EVENT_FILE_CREATE_STREAM_HASH => Some(EventKind::FileCreateStreamHash),
        EVENT_FILE_DELETE | EVENT_FILE_DELETE_DETECTED => Some(EventKind::FileDelete),
        _ => None,
    }
}

pub fn is_tracked_event_id(event_id: u32) -> bool {
    event_kind_for(event_id & 0xFFFF).is_some()
}

/// Decode one record. Returns `None` for untracked event ids.
pub fn decode_record(record: &RawRecord) -> Option<SecurityEvent> {
    let kind = event_kind_for(record.event_code())?;
    let strings = extract_strings(&record.strings, record.num_strings as usize);
    let layout = FieldLayout::for_kind(kind);
    let timestamp =
        DateTime::<Utc>::from_timestamp(i64::from(record.time_generated), 0).unwrap_or_default();

    let text = |slot: Option<usize>| -> String {
        slot.and_then(|idx| strings.get(idx))
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };
    let pid = |slot: Option<usize>| -> u32 {
        slot.and_then(|idx| strings.get(idx))
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    };

    let mut event = SecurityEvent::empty(record.record_number, kind, timestamp);
    event.process_id = pid(layout.process_id);
    event.image_path = text(layout.image_path);
    event.command_line = text(layout.command_line);
    event.target_file_path = text(layout.target_file_path);
    event.hash_blob = text(layout.hash_blob);
    event.source_process_id = pid(layout.source_process_id);
    event.source_image_path = text(layout.source_image_path);
    event.target_process_id = pid(layout.target_process_id);
    event.target_image_path = text(layout.target_image_path);
    Some(event)
}

/// Split a UTF-16LE block of NUL-terminated strings.
///
/// Stops after `expected` entries or at the end of the block, whichever
/// comes first. An unterminated trailing entry is kept.
pub fn extract_strings(block: &[u8], expected: usize) -> Vec<String> {
    let mut out = Vec::with_capacity(expected.min(64));
    let mut current: Vec<u16> = Vec::new();

    for pair in block.chunks_exact(2) {
        if out.len() >= expected {
            return out;
        }
        let unit = u16::from_le_bytes([pair[0], pair[1]]);
        if unit == 0 {
            out.push(String::from_utf16_lossy(&current));
            current.clear();
        } else {
            current.push(unit);
        }
    }

    if !current.is_empty() && out.len() < expected {
        out.push(String::from_utf16_lossy(&current));
    }
    out
}
