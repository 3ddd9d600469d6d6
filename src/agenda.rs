use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::calendar::EventOccurrence;

pub fn format_agenda_text(date: NaiveDate, occurrences: &[EventOccurrence], tz: Tz) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Agenda – {}", date.format("%A, %B %d, %Y")));
    lines.push(String::new());

    if occurrences.is_empty() {
        lines.push("No events scheduled.".to_string());
    } else {
        for occurrence in occurrences {
            lines.push(format!("- {}", build_agenda_line(occurrence, tz, usize::MAX)));
        }
    }

    lines.join("\n")
}

pub fn build_agenda_line(occurrence: &EventOccurrence, tz: Tz, width: usize) -> String {
    let time_label = if occurrence.all_day {
        "All Day".to_string()
    } else {
        format!(
            "{}-{}",
            occurrence.start.with_timezone(&tz).format("%H:%M"),
            occurrence.end.with_timezone(&tz).format("%H:%M")
        )
    };

    let title = if occurrence.title.is_empty() { "(untitled)" } else { &occurrence.title };
    let line = format!("{:<13} {} [{}]", time_label, title, occurrence.event_id);
    truncate_to_width(&line, width)
}

fn truncate_to_width(line: &str, width: usize) -> String {
    if width > 0 && line.chars().count() > width {
        let mut truncated = line.chars().take(width.saturating_sub(1)).collect::<String>();
        truncated.push('…');
        truncated
    } else {
        line.to_string()
    }
}
