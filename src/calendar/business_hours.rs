use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::calendar::recurrence::RecurrenceWeekday;

/// One stretch of selectable time, repeated on each listed weekday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessHoursBlock {
    pub days: BTreeSet<RecurrenceWeekday>,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl BusinessHoursBlock {
    fn covers(&self, day: RecurrenceWeekday, start: NaiveTime, end: NaiveTime) -> bool {
        self.days.contains(&day) && start >= self.open && end <= self.close
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessHours {
    pub blocks: Vec<BusinessHoursBlock>,
}

impl BusinessHours {
    pub fn new(blocks: Vec<BusinessHoursBlock>) -> Self {
        Self { blocks }
    }

    /// True when a single block covers the whole span on one local day.
    pub fn contains(&self, start: DateTime<Utc>, end: DateTime<Utc>, tz: Tz) -> bool {
        if end <= start {
            return false;
        }

        let local_start = start.with_timezone(&tz);
        let local_end = end.with_timezone(&tz);

        let same_day = local_end.date_naive() == local_start.date_naive();
        // A span ending exactly at midnight still belongs to the start day.
        let ends_at_next_midnight = local_start.date_naive().succ_opt() == Some(local_end.date_naive())
            && local_end.time() == NaiveTime::MIN;

        let end_time = if same_day {
            local_end.time()
        } else if ends_at_next_midnight {
            NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
        } else {
            return false;
        };

        let day = RecurrenceWeekday::from(local_start.weekday());
        self.blocks
            .iter()
            .any(|block| block.covers(day, local_start.time(), end_time))
    }

    pub fn allows_day(&self, date: NaiveDate) -> bool {
        let day = RecurrenceWeekday::from(date.weekday());
        self.blocks.iter().any(|block| block.days.contains(&day))
    }
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            blocks: vec![BusinessHoursBlock {
                days: [
                    RecurrenceWeekday::Monday,
                    RecurrenceWeekday::Tuesday,
                    RecurrenceWeekday::Wednesday,
                    RecurrenceWeekday::Thursday,
                    RecurrenceWeekday::Friday,
                ]
                .into_iter()
                .collect(),
                open: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
                close: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
            }],
        }
    }
}
