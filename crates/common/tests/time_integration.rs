//! Integration tests for cron schedules used by the recurring job catalogue

#![cfg(feature = "foundation")]

use chrono::{TimeZone, Timelike, Utc};
use storesync_common::time::CronExpression;

#[test]
fn catalogue_patterns_parse_and_fire_on_expected_minutes() {
    let start = Utc.with_ymd_and_hms(2024, 3, 10, 10, 7, 15).unwrap();

    let cases = [
        ("*/1 * * * *", (10, 8)),
        ("*/10 * * * *", (10, 10)),
        ("*/15 * * * *", (10, 15)),
        ("*/30 * * * *", (10, 30)),
        ("0 * * * *", (11, 0)),
        ("0 */6 * * *", (12, 0)),
    ];

    for (pattern, (hour, minute)) in cases {
        let cron = CronExpression::parse(pattern).unwrap();
        let next = cron.next_after(&start).unwrap();
        assert_eq!((next.hour(), next.minute()), (hour, minute), "pattern {pattern}");
        assert_eq!(next.second(), 0);
    }
}

#[test]
fn successive_fires_are_strictly_increasing() {
    let cron = CronExpression::parse("*/10 * * * *").unwrap();
    let mut at = Utc.with_ymd_and_hms(2024, 12, 31, 23, 41, 0).unwrap();
    let mut fires = Vec::new();
    for _ in 0..4 {
        at = cron.next_after(&at).unwrap();
        fires.push(at);
    }
    assert!(fires.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(fires[2], Utc.with_ymd_and_hms(2025, 1, 1, 0, 10, 0).unwrap());
}
