//! Scheduling infrastructure
//!
//! - [`ScheduleTicker`]: cron tick that enqueues due recurring schedules
//! - [`SchedulerError`]: lifecycle errors shared with the worker pool

pub mod error;
pub mod schedule_ticker;

pub use error::{SchedulerError, SchedulerResult};
pub use schedule_ticker::{ScheduleTicker, ScheduleTickerConfig};
