use std::sync::Arc;

use detection::IocStore;
use platform_windows::{decode_record, EventLogError, LogSource};
use tokio::sync::watch;
use tracing::{info, warn};

use super::evaluate::evaluate_event;
use super::remediation::MatchResponder;
use super::state::{start_record, Watermark};

/// Counters for one scan cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub start_record: u32,
    pub batches: usize,
    pub records_read: usize,
    pub events_decoded: usize,
    pub records_filtered: usize,
    pub records_skipped: u32,
    pub matches: usize,
    pub remediations_failed: usize,
}

pub struct ScanController {
    source: Arc<dyn LogSource>,
    store: Arc<IocStore>,
    responder: MatchResponder,
    watermark: Arc<Watermark>,
    batch_size: usize,
    cold_start_window: u32,
}

impl ScanController {
    pub fn new(
        source: Arc<dyn LogSource>,
        store: Arc<IocStore>,
        responder: MatchResponder,
        watermark: Arc<Watermark>,
    ) -> Self {
        Self {
            source,
            store,
            responder,
            watermark,
            batch_size: 100,
            cold_start_window: 1000,
        }
    }

    pub fn with_limits(mut self, batch_size: usize, cold_start_window: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self.cold_start_window = cold_start_window;
        self
    }

    pub fn watermark(&self) -> &Watermark {
        &self.watermark
    }

    /// Read everything new in the log, evaluating each tracked event.
    ///
    /// Blocking. Checks `shutdown` between batches: a requested stop lets the
    /// current batch finish and starts no further one.
    pub fn run_cycle(&self, shutdown: &watch::Receiver<bool>) -> Result<ScanStats, EventLogError> {
        let mut log = self.source.open()?;
        let oldest = log.oldest_record_number()?;
        let total = log.event_count()?;

        let before = self.watermark.get();
        let mut next = start_record(before, oldest, total, self.cold_start_window);
        if before != 0 && before.saturating_add(1) < oldest {
            warn!(
                last_record_read = before,
                oldest, "log rotated past the watermark; unread records were lost"
            );
        }

        let mut stats = ScanStats {
            start_record: next,
            ..ScanStats::default()
        };

        loop {
            if *shutdown.borrow() {
                info!(next_record = next, "shutdown requested; ending scan cycle");
                break;
            }

            let batch = match log.read_batch(next, self.batch_size) {
                Ok(batch) => batch,
                Err(err) if stats.batches == 0 => return Err(err),
                Err(err) => {
                    warn!(error = %err, next_record = next, "batch read failed; ending cycle early");
                    break;
                }
            };
            if batch.is_empty() {
                break;
            }

            stats.batches += 1;
            stats.records_read += batch.records.len();
            stats.records_skipped += batch.skipped;

            for record in &batch.records {
                match decode_record(record) {
                    Some(event) => {
                        stats.events_decoded += 1;
                        for (seq, found) in evaluate_event(&self.store, &event).iter().enumerate() {
                            stats.matches += 1;
                            if self.responder.respond(found, seq) {
                                stats.remediations_failed += 1;
                            }
                        }
                    }
                    None => stats.records_filtered += 1,
                }
                self.watermark.advance(record.record_number);
            }

            let Some(high_water) = batch.high_water else {
                break;
            };
            self.watermark.advance(high_water);
            match high_water.checked_add(1) {
                Some(following) if following > next => next = following,
                _ => break,
            }
        }

        let after = self.watermark.get();
        if after != before {
            if let Err(err) = self.watermark.persist() {
                warn!(error = %err, "failed persisting scan watermark");
            }
        }

        info!(
            start_record = stats.start_record,
            last_record_read = after,
            batches = stats.batches,
            records_read = stats.records_read,
            events_decoded = stats.events_decoded,
            records_filtered = stats.records_filtered,
            records_skipped = stats.records_skipped,
            matches = stats.matches,
            remediations_failed = stats.remediations_failed,
            "scan cycle complete"
        );
        Ok(stats)
    }
}
