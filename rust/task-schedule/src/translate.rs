//! Structured recurrence fields to canonical cron expressions.
//!
//! Field emission order is fixed: minute, hour, day-of-month, month,
//! day-of-week. Hours are stored as local wall-clock hours and emitted shifted
//! to UTC, without wrapping into 0-23.

use chrono::{Datelike, Local, NaiveDate};
use tracing::{debug, warn};

use crate::cron::validate_cron_string;
use crate::error::{Result, ScheduleError};
use crate::model::{Month, RunFrequency, ScheduleDefinition, Weekday};

/// Point-in-time inputs the translation depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationContext {
    /// Local time minus UTC, in whole hours.
    pub utc_offset_hours: i32,
    /// Calendar year used to size months for Yearly schedules.
    pub year: i32,
}

impl TranslationContext {
    #[must_use]
    pub fn new(utc_offset_hours: i32, year: i32) -> Self {
        Self {
            utc_offset_hours,
            year,
        }
    }

    /// Offset and year taken from the system clock right now.
    #[must_use]
    pub fn current() -> Self {
        Self {
            utc_offset_hours: local_utc_offset_hours(),
            year: Local::now().year(),
        }
    }
}

/// Signed difference between the local timezone and UTC, in hours.
///
/// Evaluated at the current instant, so daylight-saving time is reflected as
/// of now. Offsets that are not whole hours are truncated toward zero.
pub fn local_utc_offset_hours() -> i32 {
    Local::now().offset().local_minus_utc() / 3600
}

/// Number of days in `month` of `year`.
pub fn days_in_month(year: i32, month: Month) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month.number(), 1);
    let next = if month == Month::Dec {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month.number() + 1, 1)
    };
    match (first, next) {
        (Some(first), Some(next)) => (next - first).num_days() as u32,
        _ => 31,
    }
}

pub fn check_minute(minute: Option<u8>) -> Result<u8> {
    minute
        .filter(|m| *m < 60)
        .ok_or_else(|| ScheduleError::Validation("Minute value must be between 0 and 59".into()))
}

pub fn check_hour(hour: Option<u8>) -> Result<u8> {
    hour.filter(|h| *h < 24)
        .ok_or_else(|| ScheduleError::Validation("Hour value must be between 0 and 23".into()))
}

pub fn check_day_of_week(day_of_week: Option<Weekday>) -> Result<Weekday> {
    day_of_week.ok_or_else(|| ScheduleError::Validation("Please select a day of the week".into()))
}

/// Validate the day-of-month for Monthly and Yearly schedules.
///
/// Yearly schedules are checked against the length of the month in `year`.
pub fn check_day_of_month(
    frequency: RunFrequency,
    day: Option<u8>,
    month: Option<Month>,
    year: i32,
) -> Result<u8> {
    match frequency {
        RunFrequency::Yearly => {
            let (Some(day), Some(month)) = (day, month) else {
                return Err(ScheduleError::Validation(
                    "Please select a day of the month and a month".into(),
                ));
            };
            let last = days_in_month(year, month);
            if day == 0 || u32::from(day) > last {
                return Err(ScheduleError::Validation(format!(
                    "Day value for {month} must be between 1 and {last}"
                )));
            }
            Ok(day)
        }
        _ => {
            let day = day.ok_or_else(|| {
                ScheduleError::Validation("Please select a day of the month".into())
            })?;
            if day == 0 || day > 31 {
                return Err(ScheduleError::Validation(
                    "Day value must be between 1 and 31".into(),
                ));
            }
            Ok(day)
        }
    }
}

/// Translate using the current system offset and calendar year.
pub fn translate(schedule: &ScheduleDefinition) -> Result<String> {
    translate_with(schedule, &TranslationContext::current())
}

/// Translate a schedule into its canonical 5-field cron expression.
///
/// Cron Style schedules pass their operator-supplied string through after
/// validating it. Every other frequency is validated field by field and
/// rendered; fields the frequency does not use are emitted as `*`.
pub fn translate_with(schedule: &ScheduleDefinition, ctx: &TranslationContext) -> Result<String> {
    let frequency = schedule.run_frequency;

    if frequency == RunFrequency::CronStyle {
        let expr = schedule
            .cron_string
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ScheduleError::Validation("A cron string is required for Cron Style schedules".into())
            })?;
        validate_cron_string(expr)
            .map_err(|e| ScheduleError::Validation(format!("Invalid cron string '{expr}': {e:#}")))?;
        return Ok(schedule.cron_string.clone().unwrap_or_default());
    }

    let day_of_week = if frequency.uses_day_of_week() {
        Some(check_day_of_week(schedule.day_of_week)?)
    } else {
        None
    };
    let day_of_month = if frequency.uses_day_of_month() {
        Some(check_day_of_month(
            frequency,
            schedule.day_of_month,
            schedule.month,
            ctx.year,
        )?)
    } else {
        None
    };
    let month = if frequency.uses_month() {
        schedule.month
    } else {
        None
    };
    let hour = if frequency.uses_hour() {
        Some(check_hour(schedule.hour)?)
    } else {
        None
    };
    let minute = check_minute(schedule.minute)?;

    let utc_hour = hour.map(|h| i32::from(h) - ctx.utc_offset_hours);
    let fields = [
        minute.to_string(),
        utc_hour.map_or_else(|| "*".to_string(), |h| h.to_string()),
        day_of_month.map_or_else(|| "*".to_string(), |d| d.to_string()),
        month.map_or_else(|| "*".to_string(), |m| m.abbr().to_string()),
        day_of_week.map_or_else(|| "*".to_string(), |d| d.cron_token().to_string()),
    ];
    let expr = fields.join(" ");

    // A shifted hour outside 0-23 is passed through to the daemon as-is.
    let probe = match utc_hour {
        Some(h) if !(0..24).contains(&h) => {
            warn!(
                schedule_id = %schedule.id,
                local_hour = ?hour,
                utc_hour = h,
                utc_offset_hours = ctx.utc_offset_hours,
                "UTC-corrected hour falls outside 0-23; emitting it unwrapped"
            );
            let mut probe = fields.clone();
            probe[1] = "*".to_string();
            probe.join(" ")
        }
        _ => expr.clone(),
    };
    validate_cron_string(&probe).map_err(|e| {
        ScheduleError::Internal(format!(
            "translated cron string '{expr}' for {} failed validation: {e:#}",
            schedule.id
        ))
    })?;

    debug!(schedule_id = %schedule.id, frequency = %frequency, cron = %expr, "translated schedule");
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const UTC: TranslationContext = TranslationContext {
        utc_offset_hours: 0,
        year: 2025,
    };

    fn schedule(frequency: RunFrequency) -> ScheduleDefinition {
        ScheduleDefinition::new("TS000001", "TASK-1", frequency)
    }

    // === Unit Tests ===

    #[test]
    fn test_hourly() {
        let mut s = schedule(RunFrequency::Hourly);
        s.minute = Some(15);
        assert_eq!(translate_with(&s, &UTC).unwrap(), "15 * * * *");
    }

    #[test]
    fn test_hourly_minute_zero_is_valid() {
        let mut s = schedule(RunFrequency::Hourly);
        s.minute = Some(0);
        assert_eq!(translate_with(&s, &UTC).unwrap(), "0 * * * *");
    }

    #[test]
    fn test_hourly_ignores_stale_fields() {
        let mut s = schedule(RunFrequency::Hourly);
        s.minute = Some(45);
        s.hour = Some(3);
        s.day_of_month = Some(2);
        assert_eq!(translate_with(&s, &UTC).unwrap(), "45 * * * *");
    }

    #[test]
    fn test_minute_out_of_range() {
        let mut s = schedule(RunFrequency::Hourly);
        s.minute = Some(60);
        let err = translate_with(&s, &UTC).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Minute value must be between 0 and 59");

        s.minute = None;
        assert!(matches!(
            translate_with(&s, &UTC),
            Err(ScheduleError::Validation(_))
        ));
    }

    #[test]
    fn test_daily_applies_offset() {
        let mut s = schedule(RunFrequency::Daily);
        s.hour = Some(9);
        s.minute = Some(30);
        let ctx = TranslationContext::new(-5, 2025);
        assert_eq!(translate_with(&s, &ctx).unwrap(), "30 14 * * *");
    }

    #[test]
    fn test_daily_hour_required() {
        let mut s = schedule(RunFrequency::Daily);
        s.minute = Some(30);
        let err = translate_with(&s, &UTC).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Hour value must be between 0 and 23");

        s.hour = Some(24);
        assert!(translate_with(&s, &UTC).is_err());
    }

    #[test]
    fn test_daily_hour_not_wrapped() {
        let mut s = schedule(RunFrequency::Daily);
        s.hour = Some(1);
        s.minute = Some(0);
        let ctx = TranslationContext::new(2, 2025);
        assert_eq!(translate_with(&s, &ctx).unwrap(), "0 -1 * * *");

        s.hour = Some(22);
        let ctx = TranslationContext::new(-4, 2025);
        assert_eq!(translate_with(&s, &ctx).unwrap(), "0 26 * * *");
    }

    #[test]
    fn test_weekly() {
        let mut s = schedule(RunFrequency::Weekly);
        s.day_of_week = Some(Weekday::Thursday);
        s.hour = Some(6);
        s.minute = Some(5);
        assert_eq!(translate_with(&s, &UTC).unwrap(), "5 6 * * Thu");
    }

    #[test]
    fn test_weekly_requires_day() {
        let mut s = schedule(RunFrequency::Weekly);
        s.hour = Some(6);
        s.minute = Some(5);
        let err = translate_with(&s, &UTC).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Please select a day of the week");
    }

    #[test]
    fn test_monthly() {
        let mut s = schedule(RunFrequency::Monthly);
        s.day_of_month = Some(31);
        s.hour = Some(23);
        s.minute = Some(59);
        assert_eq!(translate_with(&s, &UTC).unwrap(), "59 23 31 * *");
    }

    #[test]
    fn test_monthly_requires_day() {
        let mut s = schedule(RunFrequency::Monthly);
        s.hour = Some(1);
        s.minute = Some(1);
        assert!(translate_with(&s, &UTC).is_err());

        s.day_of_month = Some(0);
        assert!(translate_with(&s, &UTC).is_err());

        s.day_of_month = Some(32);
        assert!(translate_with(&s, &UTC).is_err());
    }

    #[test]
    fn test_yearly() {
        let mut s = schedule(RunFrequency::Yearly);
        s.day_of_month = Some(14);
        s.month = Some(Month::Feb);
        s.hour = Some(8);
        s.minute = Some(0);
        assert_eq!(translate_with(&s, &UTC).unwrap(), "0 8 14 Feb *");
    }

    #[test]
    fn test_yearly_rejects_day_past_month_end() {
        let mut s = schedule(RunFrequency::Yearly);
        s.day_of_month = Some(31);
        s.month = Some(Month::Apr);
        s.hour = Some(8);
        s.minute = Some(0);
        let err = translate_with(&s, &UTC).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: Day value for Apr must be between 1 and 30"
        );
    }

    #[test]
    fn test_yearly_leap_day_depends_on_year() {
        let mut s = schedule(RunFrequency::Yearly);
        s.day_of_month = Some(29);
        s.month = Some(Month::Feb);
        s.hour = Some(0);
        s.minute = Some(0);
        assert!(translate_with(&s, &TranslationContext::new(0, 2024)).is_ok());
        assert!(translate_with(&s, &TranslationContext::new(0, 2025)).is_err());
    }

    #[test]
    fn test_yearly_requires_month() {
        let mut s = schedule(RunFrequency::Yearly);
        s.day_of_month = Some(1);
        s.hour = Some(0);
        s.minute = Some(0);
        let err = translate_with(&s, &UTC).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: Please select a day of the month and a month"
        );
    }

    #[test]
    fn test_cron_style_passthrough() {
        let mut s = schedule(RunFrequency::CronStyle);
        s.cron_string = Some("*/10 2-4 * * mon-fri".into());
        assert_eq!(translate_with(&s, &UTC).unwrap(), "*/10 2-4 * * mon-fri");
    }

    #[test]
    fn test_cron_style_invalid() {
        let mut s = schedule(RunFrequency::CronStyle);
        s.cron_string = Some("every day".into());
        assert!(matches!(
            translate_with(&s, &UTC),
            Err(ScheduleError::Validation(_))
        ));

        s.cron_string = None;
        assert!(matches!(
            translate_with(&s, &UTC),
            Err(ScheduleError::Validation(_))
        ));
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, Month::Feb), 29);
        assert_eq!(days_in_month(2025, Month::Feb), 28);
        assert_eq!(days_in_month(2025, Month::Dec), 31);
        assert_eq!(days_in_month(2025, Month::Sep), 30);
    }

    #[test]
    fn test_current_context_offset_is_plausible() {
        let ctx = TranslationContext::current();
        assert!((-12..=14).contains(&ctx.utc_offset_hours));
    }

    // === Property-Based Tests ===

    proptest! {
        #[test]
        fn hourly_renders_minute_only(minute in 0u8..60, offset in -12i32..=14) {
            let mut s = schedule(RunFrequency::Hourly);
            s.minute = Some(minute);
            let ctx = TranslationContext::new(offset, 2025);
            prop_assert_eq!(translate_with(&s, &ctx).unwrap(), format!("{minute} * * * *"));
        }

        #[test]
        fn daily_hour_is_shifted_exactly(hour in 0u8..24, minute in 0u8..60, offset in -12i32..=14) {
            let mut s = schedule(RunFrequency::Daily);
            s.hour = Some(hour);
            s.minute = Some(minute);
            let ctx = TranslationContext::new(offset, 2025);

            let expr = translate_with(&s, &ctx).unwrap();
            let fields: Vec<&str> = expr.split(' ').collect();
            prop_assert_eq!(fields.len(), 5);
            prop_assert_eq!(fields[0], minute.to_string());
            prop_assert_eq!(fields[1], (i32::from(hour) - offset).to_string());
            prop_assert_eq!(&fields[2..], &["*", "*", "*"]);
        }

        #[test]
        fn february_thirtieth_always_rejected(year in 1970i32..2400) {
            let mut s = schedule(RunFrequency::Yearly);
            s.day_of_month = Some(30);
            s.month = Some(Month::Feb);
            s.hour = Some(12);
            s.minute = Some(0);
            let ctx = TranslationContext::new(0, year);
            prop_assert!(matches!(translate_with(&s, &ctx), Err(ScheduleError::Validation(_))));
        }

        #[test]
        fn translation_is_idempotent(
            day in 1u8..29,
            month in 0usize..12,
            hour in 0u8..24,
            minute in 0u8..60,
        ) {
            let mut s = schedule(RunFrequency::Yearly);
            s.day_of_month = Some(day);
            s.month = Some(Month::ALL[month]);
            s.hour = Some(hour);
            s.minute = Some(minute);
            let first = translate_with(&s, &UTC).unwrap();
            s.cron_string = Some(first.clone());
            let second = translate_with(&s, &UTC).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
