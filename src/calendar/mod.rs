pub mod business_hours;
pub mod event;
pub mod practitioner;
pub mod recurrence;

pub use business_hours::{BusinessHours, BusinessHoursBlock};
pub use event::{CalendarEvent, EventOccurrence, DEFAULT_EVENT_COLOR};
pub use practitioner::{Appointment, AppointmentStatus, MapPin, OfficeHours, PractitionerProfile};
pub use recurrence::{
    RecurrenceEnd, RecurrenceEndType, RecurrenceError, RecurrenceFreq, RecurrenceRule, RecurrenceWeekday,
    Termination,
};
