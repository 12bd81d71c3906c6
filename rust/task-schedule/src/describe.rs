//! Human-readable descriptions of cron expressions.

use crate::model::{Month, Weekday};

/// Renders a cron expression as text for operators.
pub trait CronDescriber: Send + Sync {
    fn describe(&self, expr: &str) -> String;
}

/// Describes the shapes the translator emits and echoes anything else.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainDescriber;

impl CronDescriber for PlainDescriber {
    fn describe(&self, expr: &str) -> String {
        describe_fields(expr).unwrap_or_else(|| format!("Cron schedule '{}'", expr.trim()))
    }
}

fn describe_fields(expr: &str) -> Option<String> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    let [minute, hour, day, month, weekday] = fields.as_slice() else {
        return None;
    };
    let minute: u32 = minute.parse().ok().filter(|m| *m < 60)?;

    if *hour == "*" {
        return (*day == "*" && *month == "*" && *weekday == "*")
            .then(|| format!("Every hour, at {minute} minutes past the hour"));
    }
    let hour: u32 = hour.parse().ok().filter(|h| *h < 24)?;
    let mut text = format!("At {hour:02}:{minute:02}");

    match (*day, *month, *weekday) {
        ("*", "*", "*") => {}
        ("*", "*", weekday) => {
            let weekday: Weekday = weekday.parse().ok()?;
            text.push_str(&format!(", only on {weekday}"));
        }
        (day, "*", "*") => {
            let day: u32 = day.parse().ok()?;
            text.push_str(&format!(", on day {day} of the month"));
        }
        (day, month, "*") => {
            let day: u32 = day.parse().ok()?;
            let month: Month = month.parse().ok()?;
            text.push_str(&format!(
                ", on day {day} of the month, only in {}",
                month.name()
            ));
        }
        _ => return None,
    }
    Some(text)
}
