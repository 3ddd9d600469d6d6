use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::app::CalendarPage;
use crate::calendar::{Appointment, AppointmentStatus};

/// Seeds a few appointments around `today` so the agenda has something to show.
pub fn add_sample_appointments(page: &mut CalendarPage, today: NaiveDate) {
    let Some(tomorrow) = today.succ_opt() else { return };
    let Some(yesterday) = today.pred_opt() else { return };

    let appointments = vec![
        ("Sipho Dlamini", today, 9, 0, 9, 30, AppointmentStatus::Confirmed, Some("Follow-up")),
        ("Naledi Mokoena", today, 11, 0, 11, 45, AppointmentStatus::Booked, None),
        ("Johan van Wyk", tomorrow, 10, 0, 10, 30, AppointmentStatus::Booked, Some("Blood results")),
        ("Ayesha Patel", tomorrow, 14, 0, 14, 30, AppointmentStatus::Confirmed, None),
        ("Pieter Botha", yesterday, 8, 30, 9, 0, AppointmentStatus::Completed, Some("Check-up")),
        ("Zanele Khumalo", yesterday, 15, 0, 15, 30, AppointmentStatus::Cancelled, None),
    ];

    for (i, (patient, date, start_h, start_m, end_h, end_m, status, reason)) in
        appointments.into_iter().enumerate()
    {
        let Some(start) = local_instant(page, date, start_h, start_m) else { continue };
        let Some(end) = local_instant(page, date, end_h, end_m) else { continue };

        page.add_appointment(Appointment {
            id: format!("sample_{}", i),
            patient_name: patient.to_string(),
            start,
            end,
            status,
            reason: reason.map(String::from),
            medical_aid: Some("Discovery".to_string()),
        });
    }
}

fn local_instant(page: &CalendarPage, date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(hour, minute, 0)?;
    page.tz
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}
