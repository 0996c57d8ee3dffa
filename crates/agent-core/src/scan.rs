//! Incremental, resumable scanning of the security log.
//!
//! The controller reads everything after the watermark in bounded batches,
//! evaluates tracked events against the indicator store and hands matches to
//! the responder. The scheduler runs one cycle per period, never two at once.

mod controller;
mod evaluate;
mod remediation;
mod scheduler;
mod state;

pub use controller::{ScanController, ScanStats};
pub use evaluate::{evaluate_event, IocMatch, Subject};
pub use remediation::{synthesize_command, MatchResponder};
pub use scheduler::{CycleGate, CycleGuard, ScanScheduler};
pub use state::{start_record, Watermark};
