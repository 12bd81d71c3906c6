//! Cron expression parsing and evaluation.
//!
//! Supports the standard 5-field layout: `minute hour day month weekday`.
//! Month and weekday fields also accept three-letter names (`feb`, `Mon`),
//! which is what the schedule translator emits.

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const WEEKDAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Bounds and accepted names for one cron field.
#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    name_base: u32,
}

const MINUTE: FieldSpec = FieldSpec {
    name: "minute",
    min: 0,
    max: 59,
    names: &[],
    name_base: 0,
};

const HOUR: FieldSpec = FieldSpec {
    name: "hour",
    min: 0,
    max: 23,
    names: &[],
    name_base: 0,
};

const DAY: FieldSpec = FieldSpec {
    name: "day",
    min: 1,
    max: 31,
    names: &[],
    name_base: 0,
};

const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    names: &MONTH_NAMES,
    name_base: 1,
};

// 7 is accepted as a second spelling of Sunday.
const WEEKDAY: FieldSpec = FieldSpec {
    name: "weekday",
    min: 0,
    max: 7,
    names: &WEEKDAY_NAMES,
    name_base: 0,
};

impl FieldSpec {
    fn value(&self, token: &str) -> Result<u32> {
        if token.is_empty() {
            anyhow::bail!("Empty value in {} field", self.name);
        }

        let lower = token.to_ascii_lowercase();
        if let Some(pos) = self.names.iter().position(|name| *name == lower) {
            return Ok(self.name_base + pos as u32);
        }

        let value: u32 = token
            .parse()
            .with_context(|| format!("Invalid numeric value '{token}'"))?;
        if value < self.min || value > self.max {
            anyhow::bail!("Value must be {}-{}", self.min, self.max);
        }
        Ok(value)
    }

    fn full_mask(&self) -> u64 {
        (self.min..=self.max).fold(0, |mask, v| mask | (1u64 << v))
    }
}

/// A parsed cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    /// Minute (0-59).
    minute: CronField,
    /// Hour (0-23).
    hour: CronField,
    /// Day of month (1-31).
    day: CronField,
    /// Month (1-12).
    month: CronField,
    /// Day of week (0-6, Sunday = 0).
    weekday: CronField,
}

/// A single field in a cron expression, as the set of values it matches.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CronField {
    bits: u64,
    /// Written as a bare `*`.
    wildcard: bool,
}

impl CronField {
    fn matches(&self, value: u32) -> bool {
        self.bits & (1u64 << value) != 0
    }
}

/// Cron expression parser.
#[derive(Debug)]
pub struct CronParser;

impl CronParser {
    /// Parse a cron expression string.
    ///
    /// # Format
    ///
    /// Standard cron format: `minute hour day month weekday`. Each field is
    /// `*` or a comma-separated list of values, ranges (`a-b`) and steps
    /// (`*/n`, `a-b/n`, `a/n`).
    ///
    /// # Examples
    ///
    /// - `0 0 * * *` - Daily at midnight
    /// - `*/5 * * * *` - Every 5 minutes
    /// - `30 4 * * Mon` - Mondays at 04:30
    /// - `0 9 14 Feb *` - February 14th at 09:00
    ///
    /// # Errors
    ///
    /// Returns an error if the expression is invalid.
    pub fn parse(expr: &str) -> Result<CronExpression> {
        let parts: Vec<&str> = expr.split_whitespace().collect();
        if parts.len() != 5 {
            anyhow::bail!("Cron expression must have 5 fields: {}", expr);
        }

        let mut weekday = Self::parse_field(parts[4], &WEEKDAY).context("Invalid weekday field")?;
        if weekday.matches(7) {
            weekday.bits = (weekday.bits & !(1u64 << 7)) | 1;
        }

        Ok(CronExpression {
            minute: Self::parse_field(parts[0], &MINUTE).context("Invalid minute field")?,
            hour: Self::parse_field(parts[1], &HOUR).context("Invalid hour field")?,
            day: Self::parse_field(parts[2], &DAY).context("Invalid day field")?,
            month: Self::parse_field(parts[3], &MONTH).context("Invalid month field")?,
            weekday,
        })
    }

    fn parse_field(field: &str, spec: &FieldSpec) -> Result<CronField> {
        if field == "*" {
            return Ok(CronField {
                bits: spec.full_mask(),
                wildcard: true,
            });
        }

        let mut bits = 0;
        for item in field.split(',') {
            bits |= Self::parse_item(item, spec)?;
        }
        Ok(CronField {
            bits,
            wildcard: false,
        })
    }

    fn parse_item(item: &str, spec: &FieldSpec) -> Result<u64> {
        let (range, step) = match item.split_once('/') {
            Some((range, step_str)) => {
                let step: u32 = step_str.parse().context("Invalid step value")?;
                if step == 0 || step > spec.max {
                    anyhow::bail!("Step value must be 1-{}", spec.max);
                }
                (range, Some(step))
            }
            None => (item, None),
        };

        let (start, end) = if range == "*" {
            (spec.min, spec.max)
        } else if let Some((first, last)) = range.split_once('-') {
            let start = spec.value(first).context("Invalid range start")?;
            let end = spec.value(last).context("Invalid range end")?;
            if start > end {
                anyhow::bail!(
                    "Range values must be {}-{} with start <= end",
                    spec.min,
                    spec.max
                );
            }
            (start, end)
        } else {
            let value = spec.value(range)?;
            // `a/n` runs from `a` to the end of the field.
            (value, if step.is_some() { spec.max } else { value })
        };

        let step = step.unwrap_or(1);
        let mut bits = 0;
        let mut value = start;
        while value <= end {
            bits |= 1u64 << value;
            value += step;
        }
        Ok(bits)
    }
}

/// Check that `expr` is a well-formed 5-field cron expression.
pub fn validate_cron_string(expr: &str) -> Result<()> {
    CronParser::parse(expr).map(|_| ())
}

impl CronExpression {
    /// Check if the cron expression matches the given time.
    pub fn matches(&self, time: &DateTime<Utc>) -> bool {
        self.minute.matches(time.minute())
            && self.hour.matches(time.hour())
            && self.month.matches(time.month())
            && self.day_matches(time)
    }

    /// When both day fields are restricted, matching either one is enough.
    fn day_matches(&self, time: &DateTime<Utc>) -> bool {
        let day = self.day.matches(time.day());
        let weekday = self.weekday.matches(time.weekday().num_days_from_sunday());
        if self.day.wildcard || self.weekday.wildcard {
            day && weekday
        } else {
            day || weekday
        }
    }

    /// Calculate the next execution time strictly after the given time.
    ///
    /// Searches up to five years ahead so that February 29th schedules resolve.
    pub fn next_after(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut current = after.with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let limit = *after + Duration::days(366 * 5);

        while current <= limit {
            if !self.month.matches(current.month()) || !self.day_matches(&current) {
                current = (current.date_naive() + Duration::days(1))
                    .and_hms_opt(0, 0, 0)?
                    .and_utc();
                continue;
            }
            if !self.hour.matches(current.hour()) {
                current = current.with_minute(0)? + Duration::hours(1);
                continue;
            }
            if !self.minute.matches(current.minute()) {
                current += Duration::minutes(1);
                continue;
            }
            return Some(current);
        }
        None
    }
}
