//! Wall-clock helpers over the injected [`Clock`]

use chrono::{DateTime, Utc};
use storesync_common::Clock;

/// Current wall time of `clock` as a UTC timestamp
pub fn utc_now(clock: &dyn Clock) -> DateTime<Utc> {
    DateTime::<Utc>::from(clock.system_time())
}
