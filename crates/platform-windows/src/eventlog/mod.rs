//! Security event log access.
//!
//! `record` parses raw `EVENTLOGRECORD` bytes, `reader` turns seek reads into
//! bounded batches, `decoder` maps tracked records to [`crate::SecurityEvent`].
//! The Win32 binding lives in `win32` and only exists on Windows.

mod decoder;
mod reader;
mod record;
#[cfg(target_os = "windows")]
mod win32;

use std::fmt;

pub use decoder::{decode_record, is_tracked_event_id, FieldLayout};
pub use reader::{EventLogReader, RawLogApi, RawRead};
pub use record::{parse_records, DecodeSkip, RawRecord, RecordIter, SkipReason, RECORD_HEADER_LEN};

pub const DEFAULT_LOG_CHANNEL: &str = "Microsoft-Windows-Sysmon/Operational";

/// Records returned by one `read_batch` call.
///
/// `high_water` is the highest record number consumed, including records
/// that were skipped as malformed, so callers can move past them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogBatch {
    pub records: Vec<RawRecord>,
    pub skipped: u32,
    pub high_water: Option<u32>,
}

impl LogBatch {
    /// An empty batch means the reader has caught up with the log.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.high_water.is_none()
    }
}

/// An open security log.
pub trait SecurityLog: Send {
    fn event_count(&self) -> EventLogResult<u32>;
    fn oldest_record_number(&self) -> EventLogResult<u32>;
    fn read_batch(&mut self, start_record: u32, max_events: usize) -> EventLogResult<LogBatch>;
}

/// Opens a [`SecurityLog`]. Each scan cycle opens its own handle.
pub trait LogSource: Send + Sync {
    fn open(&self) -> EventLogResult<Box<dyn SecurityLog>>;
}

/// The host's native event log channel.
#[derive(Debug, Clone)]
pub struct SystemLogSource {
    log_name: String,
}

impl SystemLogSource {
    pub fn new(log_name: impl Into<String>) -> Self {
        Self {
            log_name: log_name.into(),
        }
    }

    pub fn log_name(&self) -> &str {
        &self.log_name
    }
}

impl LogSource for SystemLogSource {
    fn open(&self) -> EventLogResult<Box<dyn SecurityLog>> {
        let log = open_security_log(&self.log_name)?;
        Ok(Box::new(log))
    }
}

#[cfg(target_os = "windows")]
pub fn open_security_log(log_name: &str) -> EventLogResult<EventLogReader<win32::Win32EventLog>> {
    let api = win32::Win32EventLog::open(log_name)?;
    Ok(EventLogReader::new(api))
}

#[cfg(not(target_os = "windows"))]
pub fn open_security_log(log_name: &str) -> EventLogResult<EventLogReader<UnsupportedLog>> {
    tracing::warn!(log_name, "security event log is only available on Windows");
    Err(EventLogError::LogUnavailable(format!(
        "{log_name}: native event log requires Windows"
    )))
}

/// Placeholder API type for hosts without a native event log.
#[cfg(not(target_os = "windows"))]
#[derive(Debug)]
pub struct UnsupportedLog;

#[cfg(not(target_os = "windows"))]
impl RawLogApi for UnsupportedLog {
    fn event_count(&self) -> EventLogResult<u32> {
        Ok(0)
    }

    fn oldest_record_number(&self) -> EventLogResult<u32> {
        Ok(0)
    }

    fn seek_read(&self, _record_number: u32, _buf: &mut [u8]) -> RawRead {
        RawRead::EndOfLog
    }
}

/// Errors from event log operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventLogError {
    /// The channel could not be opened (permissions, missing channel, non-Windows host).
    LogUnavailable(String),
    /// A read failed before any record of the batch was returned.
    LogReadError(String),
}

impl fmt::Display for EventLogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LogUnavailable(msg) => write!(f, "event log unavailable: {msg}"),
            Self::LogReadError(msg) => write!(f, "event log read failed: {msg}"),
        }
    }
}

impl std::error::Error for EventLogError {}

pub type EventLogResult<T> = std::result::Result<T, EventLogError>;
