use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use crate::app::CalendarPage;
use crate::calendar::recurrence::{RecurrenceEndType, RecurrenceError, RecurrenceFreq, RecurrenceWeekday};

/// A raw value change from the event dialog, as the form delivers it.
#[derive(Debug, Clone, PartialEq)]
pub enum ComposerInput {
    Title(String),
    Start(String),
    End(String),
    AllDay(bool),
    Color(String),
    RecurrenceEnabled(bool),
    Frequency(String),
    Interval(String),
    ToggleWeekday(String),
    EndType(String),
    EndDate(String),
    OccurrenceCount(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("No event dialog is open")]
    NoDialog,
    #[error("Invalid date/time '{0}'. Use YYYY-MM-DDTHH:MM or YYYY-MM-DD.")]
    InvalidDateTime(String),
    #[error(transparent)]
    Recurrence(#[from] RecurrenceError),
}

pub fn handle_input(input: ComposerInput, page: &mut CalendarPage) -> Result<(), InputError> {
    let tz = page.tz;
    let composer = page.composer.as_mut().ok_or(InputError::NoDialog)?;

    tracing::debug!(?input, "Dialog input");

    match input {
        ComposerInput::Title(title) => composer.set_title(&title),
        ComposerInput::Start(raw) => composer.set_start(parse_local_datetime(&raw, tz)?),
        ComposerInput::End(raw) => composer.set_end(parse_local_datetime(&raw, tz)?),
        ComposerInput::AllDay(all_day) => composer.set_all_day(all_day),
        ComposerInput::Color(color) => composer.set_color(&color),
        ComposerInput::RecurrenceEnabled(enabled) => composer.set_recurrence_enabled(enabled),
        ComposerInput::Frequency(raw) => composer.set_recurrence_freq(raw.parse::<RecurrenceFreq>()?),
        ComposerInput::Interval(raw) => composer.set_recurrent_count(parse_number(&raw)),
        ComposerInput::ToggleWeekday(raw) => composer.toggle_weekday(raw.parse::<RecurrenceWeekday>()?),
        ComposerInput::EndType(raw) => composer.set_recurrence_end_type(raw.parse::<RecurrenceEndType>()?),
        ComposerInput::EndDate(raw) => composer.set_recurrence_end_date(parse_local_datetime(&raw, tz)?),
        ComposerInput::OccurrenceCount(raw) => composer.set_occurrence_count(parse_number(&raw)),
    }

    Ok(())
}

/// Numeric form text; anything unparsable counts as zero.
pub fn parse_number(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(0.0)
}

/// Parses a wall-clock value in the practitioner's time zone.
pub fn parse_local_datetime(raw: &str, tz: Tz) -> Result<DateTime<Utc>, InputError> {
    let trimmed = raw.trim();

    let naive = ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
        .ok_or_else(|| InputError::InvalidDateTime(raw.to_string()))?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| InputError::InvalidDateTime(raw.to_string()))
}
