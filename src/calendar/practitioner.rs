use std::collections::BTreeSet;

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::calendar::business_hours::{BusinessHours, BusinessHoursBlock};
use crate::calendar::event::CalendarEvent;
use crate::calendar::recurrence::RecurrenceWeekday;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Booked,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            AppointmentStatus::Booked => "Booked",
            AppointmentStatus::Confirmed => "Confirmed",
            AppointmentStatus::Cancelled => "Cancelled",
            AppointmentStatus::Completed => "Completed",
        }
    }
}

/// A patient booking. The calendar only ever reads these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub patient_name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub medical_aid: Option<String>,
}

impl Appointment {
    pub fn to_calendar_event(&self, color: &str) -> CalendarEvent {
        CalendarEvent {
            id: self.id.clone(),
            title: self.patient_name.clone(),
            start: self.start,
            end: Some(self.end),
            rrule: None,
            color: color.to_string(),
            all_day: false,
            editable: false,
        }
    }

    pub fn popover_lines(&self, tz: Tz) -> Vec<String> {
        let start = self.start.with_timezone(&tz);
        let end = self.end.with_timezone(&tz);

        let mut lines = vec![
            self.patient_name.clone(),
            format!(
                "{} {}-{}",
                start.format("%a %d %b %Y"),
                start.format("%H:%M"),
                end.format("%H:%M")
            ),
            format!("Status: {}", self.status.label()),
        ];
        if let Some(reason) = &self.reason
            && !reason.is_empty()
        {
            lines.push(format!("Reason: {}", reason));
        }
        if let Some(aid) = &self.medical_aid {
            lines.push(format!("Medical aid: {}", aid));
        }
        lines
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficeHours {
    pub day: RecurrenceWeekday,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapPin {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PractitionerProfile {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub speciality: Option<String>,
    pub office_hours: Vec<OfficeHours>,
    pub consultation_fee_cents: Option<u32>,
    pub medical_aids: Vec<String>,
    pub map_pin: Option<MapPin>,
    /// Set by the backend when the practitioner's ID token must be re-issued.
    pub refresh_time: Option<DateTime<Utc>>,
}

impl PractitionerProfile {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Office hours grouped into blocks; days sharing identical hours share a block.
    pub fn business_hours(&self) -> BusinessHours {
        let mut blocks: Vec<BusinessHoursBlock> = Vec::new();

        for hours in self.office_hours.iter().filter(|h| h.close > h.open) {
            match blocks
                .iter_mut()
                .find(|b| b.open == hours.open && b.close == hours.close)
            {
                Some(block) => {
                    block.days.insert(hours.day);
                }
                None => blocks.push(BusinessHoursBlock {
                    days: BTreeSet::from([hours.day]),
                    open: hours.open,
                    close: hours.close,
                }),
            }
        }

        if blocks.is_empty() {
            BusinessHours::default()
        } else {
            BusinessHours::new(blocks)
        }
    }
}
