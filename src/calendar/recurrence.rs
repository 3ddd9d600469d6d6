use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc, Weekday};
use chrono_tz::Tz;
use rrule::RRuleSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `UNTIL` handed to the recurrence library when a rule never ends.
pub fn never_ending_until() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2999, 12, 31)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

const UNTIL_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Largest `INTERVAL` the recurrence library accepts.
pub const MAX_INTERVAL: u32 = u16::MAX as u32;

#[derive(Debug, Error, PartialEq)]
pub enum RecurrenceError {
    #[error("Unknown recurrence frequency: {0}")]
    UnknownFrequency(String),
    #[error("Unknown weekday: {0}")]
    UnknownWeekday(String),
    #[error("Unknown recurrence end type: {0}")]
    UnknownEndType(String),
    #[error("Malformed recurrence rule part: {0}")]
    MalformedPart(String),
    #[error("Recurrence rule has no FREQ")]
    MissingFrequency,
    #[error("Recurrence library rejected rule: {0}")]
    Library(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceFreq {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RecurrenceFreq {
    pub fn as_rrule(&self) -> &'static str {
        match self {
            RecurrenceFreq::Daily => "DAILY",
            RecurrenceFreq::Weekly => "WEEKLY",
            RecurrenceFreq::Monthly => "MONTHLY",
            RecurrenceFreq::Yearly => "YEARLY",
        }
    }
}

impl FromStr for RecurrenceFreq {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(RecurrenceFreq::Daily),
            "weekly" => Ok(RecurrenceFreq::Weekly),
            "monthly" => Ok(RecurrenceFreq::Monthly),
            "yearly" => Ok(RecurrenceFreq::Yearly),
            _ => Err(RecurrenceError::UnknownFrequency(s.to_string())),
        }
    }
}

/// Weekday codes as the recurrence library spells them, ordered Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecurrenceWeekday {
    #[serde(rename = "MO")]
    Monday,
    #[serde(rename = "TU")]
    Tuesday,
    #[serde(rename = "WE")]
    Wednesday,
    #[serde(rename = "TH")]
    Thursday,
    #[serde(rename = "FR")]
    Friday,
    #[serde(rename = "SA")]
    Saturday,
    #[serde(rename = "SU")]
    Sunday,
}

impl RecurrenceWeekday {
    pub const ALL: [RecurrenceWeekday; 7] = [
        RecurrenceWeekday::Monday,
        RecurrenceWeekday::Tuesday,
        RecurrenceWeekday::Wednesday,
        RecurrenceWeekday::Thursday,
        RecurrenceWeekday::Friday,
        RecurrenceWeekday::Saturday,
        RecurrenceWeekday::Sunday,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            RecurrenceWeekday::Monday => "MO",
            RecurrenceWeekday::Tuesday => "TU",
            RecurrenceWeekday::Wednesday => "WE",
            RecurrenceWeekday::Thursday => "TH",
            RecurrenceWeekday::Friday => "FR",
            RecurrenceWeekday::Saturday => "SA",
            RecurrenceWeekday::Sunday => "SU",
        }
    }
}

impl From<Weekday> for RecurrenceWeekday {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => RecurrenceWeekday::Monday,
            Weekday::Tue => RecurrenceWeekday::Tuesday,
            Weekday::Wed => RecurrenceWeekday::Wednesday,
            Weekday::Thu => RecurrenceWeekday::Thursday,
            Weekday::Fri => RecurrenceWeekday::Friday,
            Weekday::Sat => RecurrenceWeekday::Saturday,
            Weekday::Sun => RecurrenceWeekday::Sunday,
        }
    }
}

impl fmt::Display for RecurrenceWeekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for RecurrenceWeekday {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mo" | "mon" | "monday" => Ok(RecurrenceWeekday::Monday),
            "tu" | "tue" | "tuesday" => Ok(RecurrenceWeekday::Tuesday),
            "we" | "wed" | "wednesday" => Ok(RecurrenceWeekday::Wednesday),
            "th" | "thu" | "thursday" => Ok(RecurrenceWeekday::Thursday),
            "fr" | "fri" | "friday" => Ok(RecurrenceWeekday::Friday),
            "sa" | "sat" | "saturday" => Ok(RecurrenceWeekday::Saturday),
            "su" | "sun" | "sunday" => Ok(RecurrenceWeekday::Sunday),
            _ => Err(RecurrenceError::UnknownWeekday(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceEndType {
    Never,
    OnDate,
    AfterOccurrenceCount,
}

impl FromStr for RecurrenceEndType {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "never" => Ok(RecurrenceEndType::Never),
            "on_date" | "on" | "date" => Ok(RecurrenceEndType::OnDate),
            "after_occurrence_count" | "after" | "count" => Ok(RecurrenceEndType::AfterOccurrenceCount),
            _ => Err(RecurrenceError::UnknownEndType(s.to_string())),
        }
    }
}

/// Termination policy of a recurring event plus its weekly day set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceEnd {
    pub end_type: RecurrenceEndType,
    pub end_date: DateTime<Utc>,
    pub occurrence_count: u32,
    pub weekly_recurrence: BTreeSet<RecurrenceWeekday>,
}

impl RecurrenceEnd {
    pub fn never(end_date: DateTime<Utc>) -> Self {
        Self {
            end_type: RecurrenceEndType::Never,
            end_date,
            occurrence_count: 1,
            weekly_recurrence: BTreeSet::new(),
        }
    }

    pub fn toggle_weekday(&mut self, day: RecurrenceWeekday) {
        if !self.weekly_recurrence.remove(&day) {
            self.weekly_recurrence.insert(day);
        }
    }

    pub fn termination(&self) -> Termination {
        match self.end_type {
            RecurrenceEndType::Never => Termination::Until(never_ending_until()),
            RecurrenceEndType::OnDate => Termination::Until(self.end_date),
            RecurrenceEndType::AfterOccurrenceCount => Termination::Count(self.occurrence_count),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    Until(DateTime<Utc>),
    Count(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub freq: RecurrenceFreq,
    pub interval: u32,
    pub by_day: BTreeSet<RecurrenceWeekday>,
    pub termination: Termination,
}

impl RecurrenceRule {
    pub fn from_parts(freq: RecurrenceFreq, interval: u32, end: &RecurrenceEnd) -> Self {
        let by_day = if freq == RecurrenceFreq::Weekly {
            end.weekly_recurrence.clone()
        } else {
            BTreeSet::new()
        };

        Self {
            freq,
            interval,
            by_day,
            termination: end.termination(),
        }
    }

    pub fn effective_interval(&self) -> u32 {
        self.interval.clamp(1, MAX_INTERVAL)
    }

    pub fn to_rrule_string(&self) -> String {
        let mut parts = vec![
            format!("FREQ={}", self.freq.as_rrule()),
            format!("INTERVAL={}", self.effective_interval()),
        ];

        if !self.by_day.is_empty() {
            let days: Vec<&str> = self.by_day.iter().map(|d| d.code()).collect();
            parts.push(format!("BYDAY={}", days.join(",")));
        }

        match self.termination {
            Termination::Count(count) => parts.push(format!("COUNT={}", count)),
            Termination::Until(until) => parts.push(format!("UNTIL={}", until.format(UNTIL_FORMAT))),
        }

        parts.join(";")
    }

    /// Checks the rule against the recurrence library, anchored at `dtstart`.
    pub fn validate(&self, dtstart: DateTime<Utc>, tz: Tz) -> Result<(), RecurrenceError> {
        if self.termination == Termination::Count(0) {
            return Ok(());
        }
        self.to_rrule_set(dtstart, tz).map(|_| ())
    }

    /// Occurrence starts within `[after, before)`, at most `limit` of them.
    pub fn occurrences(
        &self,
        dtstart: DateTime<Utc>,
        tz: Tz,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
        limit: u16,
    ) -> Result<Vec<DateTime<Utc>>, RecurrenceError> {
        if self.termination == Termination::Count(0) || before <= after {
            return Ok(Vec::new());
        }

        let rrule_set = self.to_rrule_set(dtstart, tz)?;

        let utc: rrule::Tz = Utc.into();
        let window_start = (after - Duration::seconds(1)).with_timezone(&utc);
        let window_end = (before + Duration::seconds(1)).with_timezone(&utc);

        let result = rrule_set.after(window_start).before(window_end).all(limit);
        if result.dates.len() >= usize::from(limit) {
            tracing::warn!(rule = %self, limit, "Occurrence expansion truncated");
        }

        Ok(result
            .dates
            .iter()
            .map(|dt| dt.with_timezone(&Utc))
            .filter(|dt| *dt >= after && *dt < before)
            .collect())
    }

    fn to_rrule_set(&self, dtstart: DateTime<Utc>, tz: Tz) -> Result<RRuleSet, RecurrenceError> {
        let dtstart_line = if tz == chrono_tz::UTC {
            format!("DTSTART:{}", dtstart.format(UNTIL_FORMAT))
        } else {
            format!(
                "DTSTART;TZID={}:{}",
                tz.name(),
                dtstart.with_timezone(&tz).format("%Y%m%dT%H%M%S")
            )
        };

        let source = format!("{}\nRRULE:{}", dtstart_line, self.to_rrule_string());
        source
            .parse::<RRuleSet>()
            .map_err(|e| RecurrenceError::Library(e.to_string()))
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rrule_string())
    }
}

impl FromStr for RecurrenceRule {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.trim().strip_prefix("RRULE:").unwrap_or(s.trim());

        let mut freq = None;
        let mut interval = 1;
        let mut by_day = BTreeSet::new();
        let mut termination = Termination::Until(never_ending_until());

        for part in body.split(';').filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| RecurrenceError::MalformedPart(part.to_string()))?;

            match key.to_ascii_uppercase().as_str() {
                "FREQ" => freq = Some(value.parse::<RecurrenceFreq>()?),
                "INTERVAL" => {
                    interval = value
                        .parse()
                        .map_err(|_| RecurrenceError::MalformedPart(part.to_string()))?;
                }
                "BYDAY" => {
                    for day in value.split(',') {
                        by_day.insert(day.parse::<RecurrenceWeekday>()?);
                    }
                }
                "COUNT" => {
                    let count = value
                        .parse()
                        .map_err(|_| RecurrenceError::MalformedPart(part.to_string()))?;
                    termination = Termination::Count(count);
                }
                "UNTIL" => {
                    let until = NaiveDateTime::parse_from_str(value, UNTIL_FORMAT)
                        .map_err(|_| RecurrenceError::MalformedPart(part.to_string()))?;
                    termination = Termination::Until(until.and_utc());
                }
                _ => return Err(RecurrenceError::MalformedPart(part.to_string())),
            }
        }

        Ok(Self {
            freq: freq.ok_or(RecurrenceError::MissingFrequency)?,
            interval,
            by_day,
            termination,
        })
    }
}

/// Coerces a numeric form value into a non-negative whole number.
pub fn clamp_non_negative_integer(raw: f64) -> u32 {
    if raw.is_nan() || raw <= 0.0 {
        0
    } else {
        raw.trunc() as u32
    }
}
