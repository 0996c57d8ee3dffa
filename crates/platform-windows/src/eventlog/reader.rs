//! Batch reads over a seekable event log.
//!
//! The OS call is abstracted as [`RawLogApi::seek_read`], which fills a
//! caller-owned buffer with whole records starting at a record number. The
//! reader grows the buffer when the OS reports it too small, parses the
//! records it got, and keeps seeking forward until the batch is full or the
//! log is exhausted.

use tracing::{debug, warn};

use super::record::parse_records;
use super::{EventLogError, EventLogResult, LogBatch, SecurityLog};

const INITIAL_BUFFER_BYTES: usize = 64 * 1024;
const MAX_BUFFER_BYTES: usize = 16 * 1024 * 1024;

/// Outcome of one raw seek read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRead {
    /// `n` bytes of whole records were written to the buffer.
    Filled(usize),
    /// The next record needs at least this many bytes.
    BufferTooSmall(u32),
    /// No record exists at or after the requested position.
    EndOfLog,
    Failed(String),
}

pub trait RawLogApi: Send {
    fn event_count(&self) -> EventLogResult<u32>;
    fn oldest_record_number(&self) -> EventLogResult<u32>;
    fn seek_read(&self, record_number: u32, buf: &mut [u8]) -> RawRead;
}

pub struct EventLogReader<A> {
    api: A,
    buffer: Vec<u8>,
}

impl<A: RawLogApi> EventLogReader<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            buffer: vec![0u8; INITIAL_BUFFER_BYTES],
        }
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    fn grow_buffer(&mut self, needed: u32) -> EventLogResult<()> {
        let needed = needed as usize;
        let target = if needed > self.buffer.len() {
            needed
        } else {
            self.buffer.len().saturating_mul(2)
        };
        if target > MAX_BUFFER_BYTES {
            return Err(EventLogError::LogReadError(format!(
                "record needs {target} bytes, above the {MAX_BUFFER_BYTES} byte read limit"
            )));
        }
        debug!(
            from = self.buffer.len(),
            to = target,
            "growing event log read buffer"
        );
        self.buffer.resize(target, 0);
        Ok(())
    }
}

impl<A: RawLogApi> SecurityLog for EventLogReader<A> {
    fn event_count(&self) -> EventLogResult<u32> {
        self.api.event_count()
    }

    fn oldest_record_number(&self) -> EventLogResult<u32> {
        self.api.oldest_record_number()
    }

    fn read_batch(&mut self, start_record: u32, max_events: usize) -> EventLogResult<LogBatch> {
        let mut batch = LogBatch::default();
        let mut next = start_record;

        while batch.records.len() < max_events {
            let filled = match self.api.seek_read(next, &mut self.buffer) {
                RawRead::Filled(n) => n.min(self.buffer.len()),
                RawRead::BufferTooSmall(needed) => {
                    if let Err(err) = self.grow_buffer(needed) {
                        if batch.is_empty() {
                            return Err(err);
                        }
                        warn!(error = %err, "ending event log batch early");
                        break;
                    }
                    continue;
                }
                RawRead::EndOfLog => break,
                RawRead::Failed(detail) => {
                    if batch.is_empty() {
                        return Err(EventLogError::LogReadError(detail));
                    }
                    warn!(
                        error = %detail,
                        records = batch.records.len(),
                        "transient event log read failure; ending batch early"
                    );
                    break;
                }
            };

            let before = batch.high_water;
            let skipped_before = batch.skipped;
            let read_limit = next.saturating_add(u32::try_from(max_events).unwrap_or(u32::MAX));
            for item in parse_records(&self.buffer[..filled]) {
                if batch.records.len() >= max_events {
                    break;
                }
                match item {
                    Ok(record) => {
                        batch.high_water = Some(
                            batch
                                .high_water
                                .map_or(record.record_number, |hw| hw.max(record.record_number)),
                        );
                        batch.records.push(record);
                    }
                    Err(skip) => {
                        debug!(reason = %skip, "skipping malformed event log record");
                        batch.skipped = batch.skipped.saturating_add(1);
                        // A corrupt header can carry any number; only trust one
                        // inside the window this read could have returned.
                        match skip.record_number {
                            Some(number) if (next..=read_limit).contains(&number) => {
                                batch.high_water =
                                    Some(batch.high_water.map_or(number, |hw| hw.max(number)));
                            }
                            Some(number) => {
                                warn!(
                                    record_number = number,
                                    start = next,
                                    "ignoring implausible record number of malformed record"
                                );
                            }
                            None => {}
                        }
                    }
                }
            }

            // A seek read starts at `next`, so a read that only produced skips
            // with untrusted numbers still consumed that record.
            if batch.high_water == before && batch.skipped > skipped_before {
                batch.high_water = Some(before.map_or(next, |hw| hw.max(next)));
            }

            match batch.high_water {
                Some(hw) if before != Some(hw) && hw >= next => {
                    next = match hw.checked_add(1) {
                        Some(n) => n,
                        None => break,
                    };
                }
                // No forward progress.
                _ => break,
            }
        }

        Ok(batch)
    }
}
