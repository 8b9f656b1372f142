//! Time utilities
//!
//! - **[`cron`]**: five-field cron expression parsing and next-fire lookup,
//!   used by the recurring job scheduler to compute `next_run_at`.

pub mod cron;

pub use cron::{CronExpression, CronParseError};
