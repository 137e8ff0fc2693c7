//! Collect search results into CSV and JSON files.
//!
//! - [`session::authenticate`] restores a cached session or logs in and caches it.
//! - [`poll::Harvester`] pages through a query until it has enough records, runs
//!   dry, fails, or is asked to stop, pacing itself between pages and waiting
//!   out rate limits.
//! - [`sink::RecordSink`] appends each record to CSV as it arrives and rewrites
//!   the JSON snapshot after every page and once more on exit.
pub mod error;
pub mod poll;
pub mod record;
pub mod session;
pub mod sink;

pub use error::HarvestError;
pub use poll::{HarvestReport, HarvestSettings, Harvester, Pacing, PollStats, StopReason};
pub use record::Record;
pub use session::{AuthOutcome, authenticate};
pub use sink::{RecordSink, SinkError};
