//! Job runtime, handlers and recurring schedules

pub mod handlers;
pub mod ports;
pub mod runtime;
pub mod schedule;

pub use runtime::{queue_backoff, JobRuntime, RetryPolicy};
pub use schedule::{next_fire, RecurringCatalog, ScheduleSpec, StoreScheduleReport, FIXED_SCHEDULES};
