use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::calendar::recurrence::{RecurrenceError, RecurrenceRule};

/// Upper bound on occurrences expanded for a single recurring event per query.
pub const MAX_OCCURRENCES_PER_QUERY: u16 = 500;

pub const DEFAULT_EVENT_COLOR: &str = "#3788d8";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub rrule: Option<String>,
    pub color: String,
    pub all_day: bool,
    pub editable: bool,
}

/// A single concrete instance of an event, recurring or not.
#[derive(Debug, Clone, PartialEq)]
pub struct EventOccurrence {
    pub event_id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub color: String,
    pub all_day: bool,
}

impl CalendarEvent {
    pub fn duration(&self) -> Duration {
        self.end.map(|end| end - self.start).unwrap_or_else(Duration::zero)
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration().num_minutes()
    }

    pub fn end_or_start(&self) -> DateTime<Utc> {
        self.end.unwrap_or(self.start)
    }

    pub fn overlaps(&self, other: &CalendarEvent) -> bool {
        self.start < other.end_or_start() && other.start < self.end_or_start()
    }

    pub fn is_recurring(&self) -> bool {
        self.rrule.is_some()
    }

    pub fn recurrence(&self) -> Result<Option<RecurrenceRule>, RecurrenceError> {
        self.rrule.as_deref().map(str::parse).transpose()
    }

    pub fn occurrences_between(
        &self,
        tz: Tz,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<EventOccurrence>, RecurrenceError> {
        let duration = self.duration();

        let intersects = |start: DateTime<Utc>| {
            if duration > Duration::zero() {
                start < to && start + duration > from
            } else {
                start >= from && start < to
            }
        };

        let starts: Vec<DateTime<Utc>> = match self.recurrence()? {
            // Occurrences that begin before `from` but run into the window count too.
            Some(rule) => rule
                .occurrences(self.start, tz, from - duration.max(Duration::zero()), to, MAX_OCCURRENCES_PER_QUERY)?
                .into_iter()
                .filter(|start| intersects(*start))
                .collect(),
            None if intersects(self.start) => vec![self.start],
            None => Vec::new(),
        };

        Ok(starts
            .into_iter()
            .map(|start| EventOccurrence {
                event_id: self.id.clone(),
                title: self.title.clone(),
                start,
                end: start + duration,
                color: self.color.clone(),
                all_day: self.all_day,
            })
            .collect())
    }
}
