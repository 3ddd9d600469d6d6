use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::agenda::format_agenda_text;
use crate::app::{CalendarPage, SelectionError};
use crate::calendar::RecurrenceError;
use crate::input::form_input::{handle_input, parse_local_datetime, ComposerInput, InputError};

#[derive(Debug, PartialEq)]
pub enum Command {
    Quit,
    Help,
    NewEvent(Option<String>),
    Select(String, String),
    SelectAllDay(String, Option<String>),
    Set(ComposerInput),
    Save,
    Cancel,
    Show,
    Agenda(Option<NaiveDate>),
    Appointment(String),
    Remove(String),
    Error(String),
}

#[derive(Debug, PartialEq)]
pub enum CommandOutput {
    Quit,
    Lines(Vec<String>),
    Nothing,
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("{0}")]
    Parse(String),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Recurrence(#[from] RecurrenceError),
    #[error("No appointment or event with id {0}")]
    NotFound(String),
}

pub const HELP_LINES: &[&str] = &[
    ":new [title]                 open the event dialog at the next slot",
    ":select <start> <end>        select a timed slot (YYYY-MM-DDTHH:MM)",
    ":allday <date> [<end date>]  select whole days (end exclusive)",
    ":set <field> <value>         title|start|end|allday|color|repeat|freq|interval|ends|until|count",
    ":day <weekday>               toggle a weekday for weekly repeats",
    ":show                        preview the event being composed",
    ":save                        add the event to the calendar",
    ":cancel                      close the dialog",
    ":agenda [YYYY-MM-DD]         list the day's events",
    ":appt <id>                   show an appointment",
    ":rm <id>                     remove an event",
    ":q                           quit",
];

pub fn parse_command(input: &str) -> Command {
    let trimmed = input.trim();

    if !trimmed.starts_with(':') {
        return Command::Error("Commands must start with ':'".to_string());
    }

    let command_text = &trimmed[1..];
    let parts: Vec<&str> = command_text.split_whitespace().collect();

    if parts.is_empty() {
        return Command::Error("Empty command".to_string());
    }

    match parts[0] {
        "q" | "quit" => Command::Quit,
        "help" => Command::Help,
        "new" => {
            if parts.len() < 2 {
                Command::NewEvent(None)
            } else {
                Command::NewEvent(Some(parts[1..].join(" ")))
            }
        }
        "select" => {
            if parts.len() < 3 {
                Command::Error("select requires a start and an end".to_string())
            } else {
                Command::Select(parts[1].to_string(), parts[2].to_string())
            }
        }
        "allday" => match parts.len() {
            2 => Command::SelectAllDay(parts[1].to_string(), None),
            3 => Command::SelectAllDay(parts[1].to_string(), Some(parts[2].to_string())),
            _ => Command::Error("allday requires one or two dates".to_string()),
        },
        "set" => {
            if parts.len() < 3 {
                Command::Error("set requires a field and a value".to_string())
            } else {
                parse_set(parts[1], &parts[2..].join(" "))
            }
        }
        "day" => {
            if parts.len() < 2 {
                Command::Error("day requires a weekday".to_string())
            } else {
                Command::Set(ComposerInput::ToggleWeekday(parts[1].to_string()))
            }
        }
        "save" | "w" => Command::Save,
        "cancel" => Command::Cancel,
        "show" => Command::Show,
        "agenda" => {
            if parts.len() < 2 {
                Command::Agenda(None)
            } else if let Ok(date) = NaiveDate::parse_from_str(parts[1], "%Y-%m-%d") {
                Command::Agenda(Some(date))
            } else {
                Command::Error(format!("Invalid date format: {}", parts[1]))
            }
        }
        "appt" => {
            if parts.len() < 2 {
                Command::Error("appt requires an appointment id".to_string())
            } else {
                Command::Appointment(parts[1].to_string())
            }
        }
        "rm" => {
            if parts.len() < 2 {
                Command::Error("rm requires an event id".to_string())
            } else {
                Command::Remove(parts[1].to_string())
            }
        }
        _ => Command::Error(format!("Unknown command: {}", parts[0])),
    }
}

fn parse_set(field: &str, value: &str) -> Command {
    let input = match field {
        "title" => ComposerInput::Title(value.to_string()),
        "start" => ComposerInput::Start(value.to_string()),
        "end" => ComposerInput::End(value.to_string()),
        "color" => ComposerInput::Color(value.to_string()),
        "freq" => ComposerInput::Frequency(value.to_string()),
        "interval" => ComposerInput::Interval(value.to_string()),
        "ends" => ComposerInput::EndType(value.to_string()),
        "until" => ComposerInput::EndDate(value.to_string()),
        "count" => ComposerInput::OccurrenceCount(value.to_string()),
        "allday" | "repeat" => {
            let Some(flag) = parse_flag(value) else {
                return Command::Error(format!("Expected on/off for {}, got '{}'", field, value));
            };
            if field == "allday" {
                ComposerInput::AllDay(flag)
            } else {
                ComposerInput::RecurrenceEnabled(flag)
            }
        }
        _ => return Command::Error(format!("Unknown field: {}", field)),
    };
    Command::Set(input)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

pub fn execute(command: Command, page: &mut CalendarPage, now: DateTime<Utc>) -> Result<CommandOutput, CommandError> {
    match command {
        Command::Quit => Ok(CommandOutput::Quit),
        Command::Help => Ok(CommandOutput::Lines(HELP_LINES.iter().map(|l| l.to_string()).collect())),
        Command::Error(message) => Err(CommandError::Parse(message)),
        Command::NewEvent(title) => {
            page.open_create_dialog(now);
            if let Some(title) = title {
                handle_input(ComposerInput::Title(title), page)?;
            }
            Ok(dialog_summary(page))
        }
        Command::Select(start, end) => {
            let start = parse_local_datetime(&start, page.tz)?;
            let end = parse_local_datetime(&end, page.tz)?;
            page.select_slot(start, end, false, now)?;
            Ok(dialog_summary(page))
        }
        Command::SelectAllDay(first, last) => {
            let start = parse_local_datetime(&first, page.tz)?;
            let end = match last {
                Some(last) => parse_local_datetime(&last, page.tz)?,
                None => start + chrono::Duration::days(1),
            };
            page.select_slot(start, end, true, now)?;
            Ok(dialog_summary(page))
        }
        Command::Set(input) => {
            handle_input(input, page)?;
            Ok(dialog_summary(page))
        }
        Command::Show => {
            let composer = page.composer.as_ref().ok_or(InputError::NoDialog)?;
            let preview = composer
                .compose("preview".to_string())
                .map_err(SelectionError::from)?;
            let json = serde_json::to_string_pretty(&preview)
                .map_err(|e| CommandError::Parse(e.to_string()))?;
            Ok(CommandOutput::Lines(json.lines().map(String::from).collect()))
        }
        Command::Save => {
            let event = page.add_event_to_calendar()?;
            Ok(CommandOutput::Lines(vec![format!("Added event {}", event.id)]))
        }
        Command::Cancel => {
            page.close_dialog();
            Ok(CommandOutput::Nothing)
        }
        Command::Agenda(date) => {
            let date = date.unwrap_or_else(|| now.with_timezone(&page.tz).date_naive());
            let occurrences = page.events_for_date(date)?;
            let text = format_agenda_text(date, &occurrences, page.tz);
            Ok(CommandOutput::Lines(text.lines().map(String::from).collect()))
        }
        Command::Appointment(id) => page
            .appointment(&id)
            .map(|a| CommandOutput::Lines(a.popover_lines(page.tz)))
            .ok_or(CommandError::NotFound(id)),
        Command::Remove(id) => {
            if page.remove_event(&id) {
                Ok(CommandOutput::Lines(vec![format!("Removed event {}", id)]))
            } else {
                Err(CommandError::NotFound(id))
            }
        }
    }
}

fn dialog_summary(page: &CalendarPage) -> CommandOutput {
    let Some(composer) = &page.composer else {
        return CommandOutput::Nothing;
    };

    let tz = page.tz;
    let mut line = format!(
        "{} {} → {}",
        if composer.title().is_empty() { "(untitled)" } else { composer.title() },
        composer.start_date().with_timezone(&tz).format("%Y-%m-%d %H:%M"),
        composer.end_date().with_timezone(&tz).format("%Y-%m-%d %H:%M"),
    );
    if composer.is_all_day() {
        line.push_str(" (all day)");
    }
    if let Some(rule) = composer.recurrence_rule() {
        line.push_str(&format!(" repeats {}", rule));
    }
    CommandOutput::Lines(vec![line])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{Appointment, AppointmentStatus, BusinessHours};
    use chrono::{Duration, TimeZone};
    use chrono_tz::Tz;

    const TZ: Tz = chrono_tz::Africa::Johannesburg;

    fn now() -> DateTime<Utc> {
        TZ.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap().with_timezone(&Utc)
    }

    fn create_page() -> CalendarPage {
        CalendarPage::new(TZ, BusinessHours::default(), "#3788d8")
    }

    fn run(page: &mut CalendarPage, line: &str) -> Result<CommandOutput, CommandError> {
        execute(parse_command(line), page, now())
    }

    #[test]
    fn parse_quit_command() {
        assert_eq!(parse_command(":q"), Command::Quit);
        assert_eq!(parse_command(":quit"), Command::Quit);
    }

    #[test]
    fn command_without_colon_is_error() {
        assert!(matches!(parse_command("save"), Command::Error(_)));
    }

    #[test]
    fn parse_new_with_title() {
        assert_eq!(parse_command(":new Ward round"), Command::NewEvent(Some("Ward round".to_string())));
    }

    #[test]
    fn parse_set_title_keeps_spaces() {
        assert_eq!(
            parse_command(":set title Knee review"),
            Command::Set(ComposerInput::Title("Knee review".to_string()))
        );
    }

    #[test]
    fn parse_set_repeat_flag() {
        assert_eq!(parse_command(":set repeat on"), Command::Set(ComposerInput::RecurrenceEnabled(true)));
        assert!(matches!(parse_command(":set repeat maybe"), Command::Error(_)));
    }

    #[test]
    fn parse_day_toggles_weekday() {
        assert_eq!(parse_command(":day MO"), Command::Set(ComposerInput::ToggleWeekday("MO".to_string())));
    }

    #[test]
    fn parse_agenda_with_invalid_date() {
        assert!(matches!(parse_command(":agenda 06/01/2025"), Command::Error(_)));
    }

    #[test]
    fn parse_unknown_command() {
        assert_eq!(parse_command(":frobnicate"), Command::Error("Unknown command: frobnicate".to_string()));
    }

    #[test]
    fn weekly_event_session_end_to_end() {
        let mut page = create_page();

        run(&mut page, ":select 2025-01-06T09:00 2025-01-06T10:00").unwrap();
        run(&mut page, ":set title Physio").unwrap();
        run(&mut page, ":set repeat on").unwrap();
        run(&mut page, ":set freq weekly").unwrap();
        run(&mut page, ":day MO").unwrap();
        run(&mut page, ":day WE").unwrap();
        run(&mut page, ":set ends after_occurrence_count").unwrap();
        run(&mut page, ":set count 5").unwrap();
        run(&mut page, ":save").unwrap();

        assert_eq!(page.events.len(), 1);
        assert_eq!(
            page.events[0].rrule.as_deref(),
            Some("FREQ=WEEKLY;INTERVAL=1;BYDAY=MO,WE;COUNT=5")
        );

        let CommandOutput::Lines(agenda) = run(&mut page, ":agenda 2025-01-08").unwrap() else {
            panic!("expected agenda lines");
        };
        assert!(agenda.iter().any(|l| l.contains("09:00-10:00") && l.contains("Physio")));
    }

    #[test]
    fn selecting_evening_slot_reports_business_hours() {
        let mut page = create_page();

        let result = run(&mut page, ":select 2025-01-06T19:00 2025-01-06T20:00");

        assert_eq!(result, Err(CommandError::Selection(SelectionError::OutsideBusinessHours)));
    }

    #[test]
    fn set_without_dialog_reports_no_dialog() {
        let mut page = create_page();

        let result = run(&mut page, ":set title Nope");

        assert_eq!(result, Err(CommandError::Input(InputError::NoDialog)));
    }

    #[test]
    fn show_previews_composed_event_as_json() {
        let mut page = create_page();
        run(&mut page, ":new Clinic").unwrap();

        let CommandOutput::Lines(lines) = run(&mut page, ":show").unwrap() else {
            panic!("expected preview lines");
        };

        assert!(lines.iter().any(|l| l.contains("\"title\": \"Clinic\"")));
        assert!(page.is_dialog_open());
    }

    #[test]
    fn cancel_closes_dialog() {
        let mut page = create_page();
        run(&mut page, ":new").unwrap();

        assert_eq!(run(&mut page, ":cancel"), Ok(CommandOutput::Nothing));
        assert!(!page.is_dialog_open());
    }

    #[test]
    fn appointment_popover_is_shown() {
        let mut page = create_page();
        let start = now() + Duration::hours(1);
        page.add_appointment(Appointment {
            id: "appt_9".to_string(),
            patient_name: "Lerato M".to_string(),
            start,
            end: start + Duration::minutes(15),
            status: AppointmentStatus::Booked,
            reason: None,
            medical_aid: Some("Bonitas".to_string()),
        });

        let CommandOutput::Lines(lines) = run(&mut page, ":appt appt_9").unwrap() else {
            panic!("expected popover lines");
        };

        assert_eq!(lines[0], "Lerato M");
        assert_eq!(run(&mut page, ":appt nope"), Err(CommandError::NotFound("nope".to_string())));
    }

    #[test]
    fn removing_unknown_event_is_not_found() {
        let mut page = create_page();
        assert_eq!(run(&mut page, ":rm ghost"), Err(CommandError::NotFound("ghost".to_string())));
    }
}
