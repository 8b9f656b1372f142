//! Cron expression parsing and evaluation
//!
//! Standard five-field format: `minute hour day-of-month month weekday`.
//! Each field accepts `*`, single values, ranges (`a-b`), steps (`*/n`,
//! `a-b/n`, `a/n`) and comma separated lists of those terms. Weekday `7` is
//! accepted as an alias for Sunday.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use thiserror::Error;

/// Error type for cron parsing
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CronParseError {
    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Too many fields: expected 5, got {0}")]
    TooManyFields(usize),

    #[error("Too few fields: expected 5, got {0}")]
    TooFewFields(usize),
}

/// Upper bound on calendar steps taken by [`CronExpression::next_after`].
const MAX_SEARCH_STEPS: usize = 200_000;

/// A parsed cron expression
///
/// # Examples
///
/// ```
/// use storesync_common::time::CronExpression;
///
/// let every_ten = CronExpression::parse("*/10 * * * *").unwrap();
/// let hourly = CronExpression::parse("0 * * * *").unwrap();
/// assert_ne!(every_ten, hourly);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    source: String,
    minute: CronField,
    hour: CronField,
    day: CronField,
    month: CronField,
    weekday: CronField,
}

impl CronExpression {
    /// Parse a cron expression from a string
    pub fn parse(expr: &str) -> Result<Self, CronParseError> {
        let parts: Vec<&str> = expr.split_whitespace().collect();

        if parts.len() < 5 {
            return Err(CronParseError::TooFewFields(parts.len()));
        }
        if parts.len() > 5 {
            return Err(CronParseError::TooManyFields(parts.len()));
        }

        let mut weekday = CronField::parse(parts[4], 0, 7)?;
        if weekday.contains(7) {
            weekday.bits = (weekday.bits | 1) & !(1 << 7);
        }

        Ok(Self {
            source: parts.join(" "),
            minute: CronField::parse(parts[0], 0, 59)?,
            hour: CronField::parse(parts[1], 0, 23)?,
            day: CronField::parse(parts[2], 1, 31)?,
            month: CronField::parse(parts[3], 1, 12)?,
            weekday,
        })
    }

    /// Check if a datetime matches this cron expression (seconds ignored)
    pub fn matches(&self, dt: &DateTime<Utc>) -> bool {
        self.minute.contains(dt.minute())
            && self.hour.contains(dt.hour())
            && self.month.contains(dt.month())
            && self.day_matches(dt)
    }

    /// Day-of-month and weekday combine with OR when both are restricted.
    fn day_matches(&self, dt: &DateTime<Utc>) -> bool {
        let dom = self.day.contains(dt.day());
        let dow = self.weekday.contains(dt.weekday().num_days_from_sunday());
        match (self.day.any, self.weekday.any) {
            (true, true) => true,
            (true, false) => dow,
            (false, true) => dom,
            (false, false) => dom || dow,
        }
    }

    /// Next matching minute strictly after `dt`.
    pub fn next_after(&self, dt: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        let truncated = dt.with_second(0)?.with_nanosecond(0)?;
        let mut current = truncated + Duration::minutes(1);

        for _ in 0..MAX_SEARCH_STEPS {
            if !self.month.contains(current.month()) {
                current = start_of_next_month(&current)?;
                continue;
            }
            if !self.day_matches(&current) {
                current = start_of_day(&current)? + Duration::days(1);
                continue;
            }
            if !self.hour.contains(current.hour()) {
                current = current.with_minute(0)? + Duration::hours(1);
                continue;
            }
            if !self.minute.contains(current.minute()) {
                current += Duration::minutes(1);
                continue;
            }
            return Some(current);
        }

        None
    }

    /// The normalized source text of the expression.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for CronExpression {
    type Err = CronParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn start_of_day(dt: &DateTime<Utc>) -> Option<DateTime<Utc>> {
    dt.with_hour(0)?.with_minute(0)
}

fn start_of_next_month(dt: &DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (year, month) = if dt.month() == 12 { (dt.year() + 1, 1) } else { (dt.year(), dt.month() + 1) };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()
}

/// One cron field stored as a bitset of allowed values.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CronField {
    bits: u64,
    any: bool,
}

impl CronField {
    fn parse(s: &str, min: u32, max: u32) -> Result<Self, CronParseError> {
        if s == "*" {
            return Ok(Self { bits: range_bits(min, max, 1), any: true });
        }

        let mut bits = 0u64;
        for term in s.split(',') {
            bits |= Self::parse_term(term.trim(), min, max)?;
        }
        Ok(Self { bits, any: false })
    }

    fn parse_term(term: &str, min: u32, max: u32) -> Result<u64, CronParseError> {
        let invalid = || CronParseError::InvalidField(term.to_string());

        let (range, step) = match term.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step.parse().map_err(|_| invalid())?;
                if step == 0 {
                    return Err(invalid());
                }
                (range, Some(step))
            }
            None => (term, None),
        };

        let (start, end) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            let a: u32 = a.parse().map_err(|_| invalid())?;
            let b: u32 = b.parse().map_err(|_| invalid())?;
            (a, b)
        } else {
            let value: u32 = range.parse().map_err(|_| invalid())?;
            // `a/n` runs from `a` to the end of the field
            if step.is_some() {
                (value, max)
            } else {
                (value, value)
            }
        };

        if start < min || end > max || start > end {
            return Err(CronParseError::InvalidRange(format!(
                "{start}-{end} not valid in range {min}-{max}"
            )));
        }

        Ok(range_bits(start, end, step.unwrap_or(1)))
    }

    fn contains(&self, value: u32) -> bool {
        value < 64 && self.bits & (1 << value) != 0
    }
}

fn range_bits(start: u32, end: u32, step: u32) -> u64 {
    (start..=end).step_by(step as usize).fold(0u64, |acc, v| acc | (1 << v))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn parses_step_fields() {
        let cron = CronExpression::parse("*/10 * * * *").unwrap();
        for minute in [0, 10, 20, 30, 40, 50] {
            assert!(cron.minute.contains(minute));
        }
        assert!(!cron.minute.contains(5));
    }

    #[test]
    fn parses_ranges_lists_and_ranged_steps() {
        let cron = CronExpression::parse("0-30/15 9-17 * * 1,3,5").unwrap();
        assert!(cron.minute.contains(0));
        assert!(cron.minute.contains(15));
        assert!(cron.minute.contains(30));
        assert!(!cron.minute.contains(45));
        assert!(cron.hour.contains(9) && cron.hour.contains(17));
        assert!(!cron.hour.contains(18));
        assert!(cron.weekday.contains(3));
        assert!(!cron.weekday.contains(2));
    }

    #[test]
    fn weekday_seven_is_sunday() {
        let cron = CronExpression::parse("0 0 * * 7").unwrap();
        assert!(cron.weekday.contains(0));
        // 2024-01-07 is a Sunday
        assert!(cron.matches(&at(2024, 1, 7, 0, 0)));
    }

    #[test]
    fn rejects_invalid_expressions() {
        assert!(CronExpression::parse("invalid").is_err());
        assert!(CronExpression::parse("60 * * * *").is_err());
        assert!(CronExpression::parse("* 25 * * *").is_err());
        assert!(CronExpression::parse("*/0 * * * *").is_err());
        assert_eq!(
            CronExpression::parse("* * * * * *"),
            Err(CronParseError::TooManyFields(6))
        );
    }

    #[test]
    fn next_after_truncates_seconds() {
        let cron = CronExpression::parse("* * * * *").unwrap();
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 42).unwrap();
        assert_eq!(cron.next_after(&dt), Some(at(2024, 1, 1, 12, 1)));
    }

    #[test]
    fn next_after_rolls_over_hours_and_days() {
        let every_six_hours = CronExpression::parse("0 */6 * * *").unwrap();
        assert_eq!(every_six_hours.next_after(&at(2024, 1, 1, 19, 5)), Some(at(2024, 1, 2, 0, 0)));

        let every_thirty = CronExpression::parse("*/30 * * * *").unwrap();
        assert_eq!(every_thirty.next_after(&at(2024, 1, 1, 10, 30)), Some(at(2024, 1, 1, 11, 0)));
    }

    #[test]
    fn next_after_crosses_year_boundary() {
        let cron = CronExpression::parse("0 0 1 1 *").unwrap();
        assert_eq!(cron.next_after(&at(2024, 6, 15, 8, 0)), Some(at(2025, 1, 1, 0, 0)));
    }

    #[test]
    fn display_round_trips_normalized_source() {
        let cron: CronExpression = "  0   *  * * *".parse().unwrap();
        assert_eq!(cron.to_string(), "0 * * * *");
    }
}
