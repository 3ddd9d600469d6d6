//! View-model behind the event creation dialog.
//!
//! Every setter leaves the composer in a consistent state: counts are whole
//! non-negative numbers, a timed event ends after it starts, and an all-day event
//! is pinned to local midnights.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use crate::calendar::event::CalendarEvent;
use crate::calendar::recurrence::{
    clamp_non_negative_integer, MAX_INTERVAL, RecurrenceEnd, RecurrenceEndType, RecurrenceError, RecurrenceFreq,
    RecurrenceRule, RecurrenceWeekday,
};

pub const MIN_EVENT_MINUTES: i64 = 5;

const DEFAULT_RECURRENCE_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Error, PartialEq)]
pub enum ComposeError {
    #[error("Recurrence end date {until} is before the event start {start}")]
    UntilBeforeStart { until: DateTime<Utc>, start: DateTime<Utc> },
    #[error("Invalid recurrence: {0}")]
    InvalidRule(#[from] RecurrenceError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventComposer {
    title: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    is_all_day: bool,
    color: String,
    recurrence_enabled: bool,
    recurrence_freq: RecurrenceFreq,
    recurrent_count: u32,
    recurrence_end: RecurrenceEnd,
    tz: Tz,
}

impl EventComposer {
    pub fn new(tz: Tz, color: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let mut composer = Self {
            title: String::new(),
            start_date: start,
            end_date: end,
            is_all_day: false,
            color: color.to_string(),
            recurrence_enabled: false,
            recurrence_freq: RecurrenceFreq::Weekly,
            recurrent_count: 1,
            recurrence_end: RecurrenceEnd::never(start + Duration::days(DEFAULT_RECURRENCE_WINDOW_DAYS)),
            tz,
        };
        composer.enforce_timing();
        composer
    }

    pub fn new_all_day(tz: Tz, color: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let mut composer = Self::new(tz, color, start, end);
        composer.set_all_day(true);
        composer
    }

    /// Called whenever the dialog is shown; a start in the past snaps to `now`.
    pub fn open_at(&mut self, now: DateTime<Utc>) {
        if self.start_date < now {
            tracing::debug!(start = %self.start_date, %now, "Moving past start to now");
            self.start_date = now;
        }
        self.enforce_timing();
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    pub fn end_date(&self) -> DateTime<Utc> {
        self.end_date
    }

    pub fn is_all_day(&self) -> bool {
        self.is_all_day
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn recurrence_enabled(&self) -> bool {
        self.recurrence_enabled
    }

    pub fn recurrence_freq(&self) -> RecurrenceFreq {
        self.recurrence_freq
    }

    pub fn recurrent_count(&self) -> u32 {
        self.recurrent_count
    }

    pub fn recurrence_end(&self) -> &RecurrenceEnd {
        &self.recurrence_end
    }

    pub fn time_zone(&self) -> Tz {
        self.tz
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    pub fn set_start(&mut self, start: DateTime<Utc>) {
        self.start_date = start;
        self.enforce_timing();
    }

    pub fn set_end(&mut self, end: DateTime<Utc>) {
        self.end_date = end;
        self.enforce_timing();
    }

    pub fn set_all_day(&mut self, all_day: bool) {
        self.is_all_day = all_day;
        self.enforce_timing();
    }

    pub fn set_color(&mut self, color: &str) {
        self.color = color.to_string();
    }

    pub fn set_recurrence_enabled(&mut self, enabled: bool) {
        self.recurrence_enabled = enabled;
    }

    pub fn set_recurrence_freq(&mut self, freq: RecurrenceFreq) {
        self.recurrence_freq = freq;
    }

    pub fn set_recurrent_count(&mut self, raw: f64) {
        self.recurrent_count = clamp_non_negative_integer(raw).min(MAX_INTERVAL);
        tracing::debug!(raw, interval = self.recurrent_count, "Recurrence interval edited");
    }

    pub fn set_occurrence_count(&mut self, raw: f64) {
        self.recurrence_end.occurrence_count = clamp_non_negative_integer(raw);
        tracing::debug!(raw, count = self.recurrence_end.occurrence_count, "Occurrence count edited");
    }

    pub fn toggle_weekday(&mut self, day: RecurrenceWeekday) {
        self.recurrence_end.toggle_weekday(day);
    }

    pub fn set_recurrence_end_type(&mut self, end_type: RecurrenceEndType) {
        self.recurrence_end.end_type = end_type;
    }

    pub fn set_recurrence_end_date(&mut self, end_date: DateTime<Utc>) {
        self.recurrence_end.end_date = end_date;
    }

    pub fn recurrence_rule(&self) -> Option<RecurrenceRule> {
        self.recurrence_enabled
            .then(|| RecurrenceRule::from_parts(self.recurrence_freq, self.recurrent_count, &self.recurrence_end))
    }

    pub fn compose(&self, id: String) -> Result<CalendarEvent, ComposeError> {
        let rule = self.recurrence_rule();

        if let Some(rule) = &rule {
            if self.recurrence_end.end_type == RecurrenceEndType::OnDate
                && self.recurrence_end.end_date < self.start_date
            {
                return Err(ComposeError::UntilBeforeStart {
                    until: self.recurrence_end.end_date,
                    start: self.start_date,
                });
            }
            rule.validate(self.start_date, self.tz)?;
        }

        Ok(CalendarEvent {
            id,
            title: self.title.clone(),
            start: self.start_date,
            end: Some(self.end_date),
            rrule: rule.map(|r| r.to_rrule_string()),
            color: self.color.clone(),
            all_day: self.is_all_day,
            editable: true,
        })
    }

    fn enforce_timing(&mut self) {
        if self.is_all_day {
            self.start_date = local_midnight(self.start_date, self.tz);
            self.end_date = local_midnight(self.end_date, self.tz);
            if self.end_date <= self.start_date {
                self.end_date = next_local_midnight(self.start_date, self.tz);
            }
        } else if self.end_date <= self.start_date {
            self.end_date = self.start_date + Duration::minutes(MIN_EVENT_MINUTES);
        }
    }
}

fn local_midnight(instant: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let date = instant.with_timezone(&tz).date_naive();
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(instant)
}

fn next_local_midnight(instant: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let date = instant.with_timezone(&tz).date_naive();
    date.succ_opt()
        .and_then(|next| tz.from_local_datetime(&next.and_time(NaiveTime::MIN)).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(instant + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::recurrence::Termination;
    use chrono::{Datelike, Timelike};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const TZ: Tz = chrono_tz::Africa::Johannesburg;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        TZ.with_ymd_and_hms(y, m, d, h, min, 0).unwrap().with_timezone(&Utc)
    }

    fn create_composer() -> EventComposer {
        EventComposer::new(TZ, "#3788d8", local(2025, 1, 6, 9, 0), local(2025, 1, 6, 10, 0))
    }

    fn assert_local_midnight(instant: DateTime<Utc>) {
        let local = instant.with_timezone(&TZ);
        assert_eq!((local.hour(), local.minute(), local.second(), local.nanosecond()), (0, 0, 0, 0));
    }

    #[test]
    fn end_before_start_advances_by_five_minutes() {
        let mut composer = create_composer();

        composer.set_end(local(2025, 1, 6, 8, 0));

        assert_eq!(composer.end_date(), local(2025, 1, 6, 9, 5));
    }

    #[test]
    fn moving_start_past_end_advances_end() {
        let mut composer = create_composer();

        composer.set_start(local(2025, 1, 6, 11, 0));

        assert_eq!(composer.end_date(), local(2025, 1, 6, 11, 5));
    }

    #[test]
    fn valid_end_is_left_alone() {
        let mut composer = create_composer();

        composer.set_end(local(2025, 1, 6, 12, 0));

        assert_eq!(composer.end_date(), local(2025, 1, 6, 12, 0));
    }

    #[test]
    fn all_day_normalizes_both_instants_to_midnight() {
        let mut composer = EventComposer::new(TZ, "#3788d8", local(2025, 1, 6, 9, 30), local(2025, 1, 8, 14, 15));

        composer.set_all_day(true);

        assert_eq!(composer.start_date(), local(2025, 1, 6, 0, 0));
        assert_eq!(composer.end_date(), local(2025, 1, 8, 0, 0));
    }

    #[test]
    fn all_day_on_a_single_day_spans_to_next_midnight() {
        let mut composer = create_composer();

        composer.set_all_day(true);

        assert_eq!(composer.start_date(), local(2025, 1, 6, 0, 0));
        assert_eq!(composer.end_date(), local(2025, 1, 7, 0, 0));
    }

    #[test]
    fn reopening_moves_past_start_to_now() {
        let mut composer = create_composer();
        let now = local(2025, 1, 6, 9, 45);

        composer.open_at(now);

        assert_eq!(composer.start_date(), now);
        assert_eq!(composer.end_date(), local(2025, 1, 6, 10, 0));
    }

    #[test]
    fn reopening_after_end_also_advances_end() {
        let mut composer = create_composer();
        let now = local(2025, 1, 6, 13, 0);

        composer.open_at(now);

        assert_eq!(composer.end_date(), now + Duration::minutes(5));
    }

    #[test]
    fn reopening_keeps_future_start() {
        let mut composer = create_composer();

        composer.open_at(local(2025, 1, 5, 9, 0));

        assert_eq!(composer.start_date(), local(2025, 1, 6, 9, 0));
    }

    #[test]
    fn negative_and_fractional_counts_are_coerced() {
        let mut composer = create_composer();

        composer.set_recurrent_count(-2.0);
        composer.set_occurrence_count(4.7);

        assert_eq!(composer.recurrent_count(), 0);
        assert_eq!(composer.recurrence_end().occurrence_count, 4);
    }

    #[test]
    fn huge_interval_is_capped_and_still_composes() {
        let mut composer = create_composer();
        composer.set_recurrence_enabled(true);

        composer.set_recurrent_count(70_000.0);

        assert_eq!(composer.recurrent_count(), MAX_INTERVAL);
        let event = composer.compose("event1".to_string()).unwrap();
        assert!(event.rrule.unwrap().contains("INTERVAL=65535"));
    }

    #[test]
    fn disabled_recurrence_composes_without_rule() {
        let composer = create_composer();

        let event = composer.compose("event1".to_string()).unwrap();

        assert_eq!(event.rrule, None);
        assert!(event.editable);
    }

    #[test]
    fn weekly_composition_on_monday_and_wednesday_for_five_occurrences() {
        let mut composer = create_composer();
        composer.set_title("Physio block");
        composer.set_recurrence_enabled(true);
        composer.set_recurrence_freq(RecurrenceFreq::Weekly);
        composer.toggle_weekday(RecurrenceWeekday::Monday);
        composer.toggle_weekday(RecurrenceWeekday::Wednesday);
        composer.set_recurrence_end_type(RecurrenceEndType::AfterOccurrenceCount);
        composer.set_occurrence_count(5.0);

        let event = composer.compose("event1".to_string()).unwrap();

        assert_eq!(event.rrule.as_deref(), Some("FREQ=WEEKLY;INTERVAL=1;BYDAY=MO,WE;COUNT=5"));
        let occurrences = event
            .occurrences_between(TZ, local(2025, 1, 1, 0, 0), local(2025, 3, 1, 0, 0))
            .unwrap();
        assert_eq!(occurrences.len(), 5);
        assert_eq!(occurrences[1].start.with_timezone(&TZ).weekday(), chrono::Weekday::Wed);
    }

    #[test]
    fn never_ending_composition_uses_sentinel_until() {
        let mut composer = create_composer();
        composer.set_recurrence_enabled(true);
        composer.set_recurrence_end_type(RecurrenceEndType::Never);

        let rule = composer.recurrence_rule().unwrap();

        let Termination::Until(until) = rule.termination else {
            panic!("expected an UNTIL termination");
        };
        assert_eq!((until.year(), until.month(), until.day()), (2999, 12, 31));
    }

    #[test]
    fn on_date_before_start_is_rejected() {
        let mut composer = create_composer();
        composer.set_recurrence_enabled(true);
        composer.set_recurrence_end_type(RecurrenceEndType::OnDate);
        composer.set_recurrence_end_date(local(2025, 1, 1, 0, 0));

        let result = composer.compose("event1".to_string());

        assert!(matches!(result, Err(ComposeError::UntilBeforeStart { .. })));
    }

    #[test]
    fn all_day_event_composes_with_flag() {
        let composer = EventComposer::new_all_day(TZ, "#e67c73", local(2025, 1, 6, 9, 0), local(2025, 1, 6, 9, 0));

        let event = composer.compose("event1".to_string()).unwrap();

        assert!(event.all_day);
        assert_eq!(event.color, "#e67c73");
        assert_local_midnight(event.start);
        assert_local_midnight(event.end.unwrap());
    }

    #[derive(Debug, Clone)]
    enum Edit {
        Start(i64),
        End(i64),
        AllDay(bool),
        Interval(f64),
        Count(f64),
    }

    fn any_edit() -> impl Strategy<Value = Edit> {
        let minutes = -60_000i64..60_000;
        prop_oneof![
            minutes.clone().prop_map(Edit::Start),
            minutes.prop_map(Edit::End),
            any::<bool>().prop_map(Edit::AllDay),
            (-1_000.0f64..1_000.0).prop_map(Edit::Interval),
            (-1_000.0f64..1_000.0).prop_map(Edit::Count),
        ]
    }

    proptest! {
        #[test]
        fn timing_and_counts_hold_after_any_edit_sequence(edits in proptest::collection::vec(any_edit(), 1..20)) {
            let base = local(2025, 6, 2, 9, 0);
            let mut composer = create_composer();

            for edit in edits {
                let previous_start = composer.start_date();
                match edit {
                    Edit::Start(m) => composer.set_start(base + Duration::minutes(m)),
                    Edit::End(m) => {
                        let requested = base + Duration::minutes(m);
                        composer.set_end(requested);
                        if !composer.is_all_day() && requested <= previous_start {
                            prop_assert_eq!(composer.end_date(), previous_start + Duration::minutes(5));
                        }
                    }
                    Edit::AllDay(flag) => composer.set_all_day(flag),
                    Edit::Interval(raw) => {
                        composer.set_recurrent_count(raw);
                        prop_assert_eq!(composer.recurrent_count() as f64, raw.max(0.0).trunc());
                    }
                    Edit::Count(raw) => {
                        composer.set_occurrence_count(raw);
                        prop_assert_eq!(composer.recurrence_end().occurrence_count as f64, raw.max(0.0).trunc());
                    }
                }

                prop_assert!(composer.end_date() > composer.start_date());
                if composer.is_all_day() {
                    let start = composer.start_date().with_timezone(&TZ);
                    let end = composer.end_date().with_timezone(&TZ);
                    prop_assert_eq!((start.hour(), start.minute(), start.second(), start.nanosecond()), (0, 0, 0, 0));
                    prop_assert_eq!((end.hour(), end.minute(), end.second(), end.nanosecond()), (0, 0, 0, 0));
                }
            }
        }
    }
}
