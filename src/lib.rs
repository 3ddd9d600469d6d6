pub mod agenda;
pub mod app;
pub mod calendar;
pub mod composer;
pub mod identity;
pub mod input;
pub mod sample_data;
pub mod storage;

pub use app::{CalendarPage, SelectionError};
pub use calendar::{CalendarEvent, RecurrenceRule};
pub use composer::{ComposeError, EventComposer};

pub use input::{command_mode, form_input};
