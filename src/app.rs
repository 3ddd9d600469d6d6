use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use uuid::Uuid;

use crate::calendar::{Appointment, BusinessHours, CalendarEvent, EventOccurrence, RecurrenceError};
use crate::composer::{ComposeError, EventComposer};
use crate::storage::config::{Config, ConfigError};

#[derive(Debug, Error, PartialEq)]
pub enum SelectionError {
    #[error("Selected slot is outside business hours")]
    OutsideBusinessHours,
    #[error("Selected range is empty")]
    EmptyRange,
    #[error("No event dialog is open")]
    NoDialog,
    #[error(transparent)]
    Compose(#[from] ComposeError),
}

/// State of the calendar page: the event list, read-only appointments, and the
/// creation dialog when it is open.
#[derive(Debug, Clone)]
pub struct CalendarPage {
    pub events: Vec<CalendarEvent>,
    pub appointments: Vec<Appointment>,
    pub composer: Option<EventComposer>,
    pub business_hours: BusinessHours,
    pub tz: Tz,
    pub default_color: String,
    pub slot_minutes: u32,
}

impl CalendarPage {
    pub fn new(tz: Tz, business_hours: BusinessHours, default_color: &str) -> Self {
        Self {
            events: Vec::new(),
            appointments: Vec::new(),
            composer: None,
            business_hours,
            tz,
            default_color: default_color.to_string(),
            slot_minutes: 30,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut page = Self::new(
            config.time_zone()?,
            config.business_hours(),
            &config.calendar.default_event_color,
        );
        page.slot_minutes = config.calendar.slot_minutes.max(1);
        Ok(page)
    }

    pub fn is_dialog_open(&self) -> bool {
        self.composer.is_some()
    }

    /// A drag-selection on the calendar grid. Timed selections must sit inside
    /// business hours; all-day selections only on business days.
    pub fn select_slot(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        all_day: bool,
        now: DateTime<Utc>,
    ) -> Result<(), SelectionError> {
        if end <= start {
            return Err(SelectionError::EmptyRange);
        }

        let allowed = if all_day {
            self.selected_days(start, end)
                .iter()
                .all(|day| self.business_hours.allows_day(*day))
        } else {
            self.business_hours.contains(start, end, self.tz)
        };

        if !allowed {
            tracing::warn!(%start, %end, all_day, "Selection rejected outside business hours");
            return Err(SelectionError::OutsideBusinessHours);
        }

        let mut composer = if all_day {
            EventComposer::new_all_day(self.tz, &self.default_color, start, end)
        } else {
            EventComposer::new(self.tz, &self.default_color, start, end)
        };
        composer.open_at(now);
        self.composer = Some(composer);

        tracing::info!(%start, %end, all_day, "Event dialog opened from selection");
        Ok(())
    }

    /// Opens the dialog at the next free slot boundary, or re-opens the existing one.
    pub fn open_create_dialog(&mut self, now: DateTime<Utc>) {
        match self.composer.as_mut() {
            Some(composer) => composer.open_at(now),
            None => {
                let start = self.next_slot_boundary(now);
                let end = start + Duration::minutes(i64::from(self.slot_minutes));
                let mut composer = EventComposer::new(self.tz, &self.default_color, start, end);
                composer.open_at(now);
                self.composer = Some(composer);
            }
        }
        tracing::info!("Event dialog opened");
    }

    pub fn close_dialog(&mut self) {
        self.composer = None;
    }

    /// Composes the dialog's event and appends it to the in-memory list.
    pub fn add_event_to_calendar(&mut self) -> Result<&CalendarEvent, SelectionError> {
        let composer = self.composer.as_ref().ok_or(SelectionError::NoDialog)?;
        let event = composer.compose(Uuid::new_v4().to_string())?;

        tracing::info!(id = %event.id, rrule = ?event.rrule, "Event added to calendar");
        self.events.push(event);
        self.composer = None;

        self.events.last().ok_or(SelectionError::NoDialog)
    }

    pub fn add_event(&mut self, event: CalendarEvent) {
        self.events.push(event);
    }

    pub fn remove_event(&mut self, event_id: &str) -> bool {
        let before = self.events.len();
        self.events.retain(|event| event.id != event_id);
        self.events.len() != before
    }

    pub fn add_appointment(&mut self, appointment: Appointment) {
        self.appointments.push(appointment);
    }

    pub fn appointment(&self, id: &str) -> Option<&Appointment> {
        self.appointments.iter().find(|a| a.id == id)
    }

    /// Every occurrence of every event and appointment in `[from, to)`, by start.
    pub fn events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<EventOccurrence>, RecurrenceError> {
        let appointment_events: Vec<CalendarEvent> = self
            .appointments
            .iter()
            .map(|a| a.to_calendar_event(&self.default_color))
            .collect();

        let mut occurrences = Vec::new();
        for event in self.events.iter().chain(appointment_events.iter()) {
            occurrences.extend(event.occurrences_between(self.tz, from, to)?);
        }
        occurrences.sort_by_key(|o| o.start);
        Ok(occurrences)
    }

    pub fn events_for_date(&self, date: NaiveDate) -> Result<Vec<EventOccurrence>, RecurrenceError> {
        let from = self.local_midnight(date);
        let to = date
            .succ_opt()
            .map(|next| self.local_midnight(next))
            .unwrap_or(from + Duration::days(1));
        self.events_between(from, to)
    }

    /// The calendar day `now` falls on in the practitioner's time zone.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    fn local_midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        self.tz
            .from_local_datetime(&date.and_time(NaiveTime::MIN))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| date.and_time(NaiveTime::MIN).and_utc())
    }

    fn selected_days(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<NaiveDate> {
        let first = start.with_timezone(&self.tz).date_naive();
        // The end of an all-day selection is exclusive.
        let last = (end - Duration::seconds(1)).with_timezone(&self.tz).date_naive();
        first.iter_days().take_while(|day| *day <= last).collect()
    }

    fn next_slot_boundary(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let slot = i64::from(self.slot_minutes.max(1));
        let local = now.with_timezone(&self.tz);
        let minutes_into_day = i64::from(local.hour() * 60 + local.minute());
        let next = (minutes_into_day / slot + 1) * slot;
        let truncated = now
            - Duration::minutes(minutes_into_day)
            - Duration::seconds(i64::from(local.second()))
            - Duration::nanoseconds(i64::from(local.nanosecond()));
        truncated + Duration::minutes(next)
    }
}
