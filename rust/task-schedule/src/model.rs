//! Task schedule records.
//!
//! A [`ScheduleDefinition`] carries the operator-facing recurrence fields, the
//! derived cron rendering, and the handle of the daemon-side job.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScheduleError};

/// Frequency class; decides which structured fields are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunFrequency {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    #[serde(rename = "Cron Style")]
    CronStyle,
}

impl RunFrequency {
    pub fn uses_minute(self) -> bool {
        !matches!(self, Self::CronStyle)
    }

    pub fn uses_hour(self) -> bool {
        !matches!(self, Self::Hourly | Self::CronStyle)
    }

    pub fn uses_day_of_week(self) -> bool {
        matches!(self, Self::Weekly)
    }

    pub fn uses_day_of_month(self) -> bool {
        matches!(self, Self::Monthly | Self::Yearly)
    }

    pub fn uses_month(self) -> bool {
        matches!(self, Self::Yearly)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hourly => "Hourly",
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
            Self::Monthly => "Monthly",
            Self::Yearly => "Yearly",
            Self::CronStyle => "Cron Style",
        }
    }
}

impl fmt::Display for RunFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunFrequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            "cronstyle" | "cron" => Ok(Self::CronStyle),
            _ => Err(format!("unknown run frequency: {s}")),
        }
    }
}

/// Day of the week, stored by full name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Self; 7] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
        Self::Sunday,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
            Self::Saturday => "Saturday",
            Self::Sunday => "Sunday",
        }
    }

    /// Token emitted into the weekday field of a cron expression (`Mon`).
    pub fn cron_token(self) -> &'static str {
        &self.name()[..3]
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Weekday {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|day| {
                let name = day.name().to_ascii_lowercase();
                lower.len() >= 3 && name.starts_with(&lower)
            })
            .ok_or_else(|| format!("unknown day of week: {s}"))
    }
}

/// Month, stored by its three-letter abbreviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Month {
    Jan,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
}

impl Month {
    pub const ALL: [Self; 12] = [
        Self::Jan,
        Self::Feb,
        Self::Mar,
        Self::Apr,
        Self::May,
        Self::Jun,
        Self::Jul,
        Self::Aug,
        Self::Sep,
        Self::Oct,
        Self::Nov,
        Self::Dec,
    ];

    /// Calendar number, January = 1.
    pub fn number(self) -> u32 {
        self as u32 + 1
    }

    pub fn abbr(self) -> &'static str {
        match self {
            Self::Jan => "Jan",
            Self::Feb => "Feb",
            Self::Mar => "Mar",
            Self::Apr => "Apr",
            Self::May => "May",
            Self::Jun => "Jun",
            Self::Jul => "Jul",
            Self::Aug => "Aug",
            Self::Sep => "Sep",
            Self::Oct => "Oct",
            Self::Nov => "Nov",
            Self::Dec => "Dec",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Jan => "January",
            Self::Feb => "February",
            Self::Mar => "March",
            Self::Apr => "April",
            Self::May => "May",
            Self::Jun => "June",
            Self::Jul => "July",
            Self::Aug => "August",
            Self::Sep => "September",
            Self::Oct => "October",
            Self::Nov => "November",
            Self::Dec => "December",
        }
    }

    pub fn from_number(number: u32) -> Option<Self> {
        Self::ALL.get(number.checked_sub(1)? as usize).copied()
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbr())
    }
}

impl FromStr for Month {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(number) = trimmed.parse::<u32>() {
            return Self::from_number(number).ok_or_else(|| format!("unknown month: {s}"));
        }
        let lower = trimmed.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|month| {
                let name = month.name().to_ascii_lowercase();
                lower.len() >= 3 && name.starts_with(&lower)
            })
            .ok_or_else(|| format!("unknown month: {s}"))
    }
}

/// Where a schedule sits in the submit/cancel state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Disabled; nothing is registered with the daemon.
    Unsubmitted,
    /// Enabled and the last submission succeeded.
    Active,
    /// Enabled but no daemon-side job is registered.
    SubmitFailed,
}

/// A recurring job definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDefinition {
    /// Primary key. Must not contain `|`.
    pub id: String,
    /// Identifier of the task this schedule runs.
    pub task: String,
    /// Short description of the task, copied from the task catalog.
    #[serde(default)]
    pub task_description: Option<String>,
    pub run_frequency: RunFrequency,
    #[serde(default)]
    pub minute: Option<u8>,
    /// Local wall-clock hour.
    #[serde(default)]
    pub hour: Option<u8>,
    #[serde(default)]
    pub day_of_week: Option<Weekday>,
    #[serde(default)]
    pub day_of_month: Option<u8>,
    #[serde(default)]
    pub month: Option<Month>,
    /// Operator input for Cron Style, otherwise the translator's rendering.
    #[serde(default)]
    pub cron_string: Option<String>,
    #[serde(default)]
    pub schedule_description: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    /// Daemon-side job handle; empty when nothing is registered.
    #[serde(default)]
    pub remote_job_handle: String,
    /// JSON object text with per-schedule task arguments.
    #[serde(default)]
    pub argument_overrides: Option<String>,
    #[serde(default)]
    pub email_recipients: Vec<String>,
}

impl ScheduleDefinition {
    /// Create a disabled schedule with no recurrence fields set.
    pub fn new(id: impl Into<String>, task: impl Into<String>, run_frequency: RunFrequency) -> Self {
        Self {
            id: id.into(),
            task: task.into(),
            task_description: None,
            run_frequency,
            minute: None,
            hour: None,
            day_of_week: None,
            day_of_month: None,
            month: None,
            cron_string: None,
            schedule_description: None,
            enabled: false,
            remote_job_handle: String::new(),
            argument_overrides: None,
            email_recipients: Vec::new(),
        }
    }

    /// Reset every structured field the frequency does not use.
    pub fn clear_inactive_fields(&mut self) {
        let frequency = self.run_frequency;
        if !frequency.uses_minute() {
            self.minute = None;
        }
        if !frequency.uses_hour() {
            self.hour = None;
        }
        if !frequency.uses_day_of_week() {
            self.day_of_week = None;
        }
        if !frequency.uses_day_of_month() {
            self.day_of_month = None;
        }
        if !frequency.uses_month() {
            self.month = None;
        }
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        match (self.enabled, self.remote_job_handle.is_empty()) {
            (false, _) => LifecycleState::Unsubmitted,
            (true, false) => LifecycleState::Active,
            (true, true) => LifecycleState::SubmitFailed,
        }
    }

    /// Parse the argument overrides into a JSON object.
    ///
    /// Blank or absent text yields `None`.
    pub fn built_in_arguments(&self) -> Result<Option<serde_json::Map<String, serde_json::Value>>> {
        let Some(text) = self
            .argument_overrides
            .as_deref()
            .filter(|t| !t.trim().is_empty())
        else {
            return Ok(None);
        };

        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(serde_json::Value::Object(map)) => Ok(Some(map)),
            Ok(other) => Err(ScheduleError::Validation(format!(
                "Argument overrides for {} must be an object, found {}",
                self.id,
                json_type_name(&other)
            ))),
            Err(e) => Err(ScheduleError::Validation(format!(
                "Argument overrides for {} are not valid JSON: {e}",
                self.id
            ))),
        }
    }

    pub fn has_email_recipients(&self) -> bool {
        self.email_recipients.iter().any(|r| !r.trim().is_empty())
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
