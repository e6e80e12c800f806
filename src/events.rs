use crate::meta::{extract_meta_tags, first_line};
use crate::models::{EventOccurrence, Note, Recurrence};
use chrono::{Datelike, Days, Duration, Months, NaiveDate};

/// Event occurrences from `today` through `today + horizon_days`, soonest
/// first.
pub fn upcoming_events(notes: &[Note], today: NaiveDate, horizon_days: u32) -> Vec<EventOccurrence> {
    let horizon = today
        .checked_add_days(Days::new(u64::from(horizon_days)))
        .unwrap_or(NaiveDate::MAX);
    let mut occurrences = Vec::new();

    for note in notes {
        let meta = extract_meta_tags(&note.content);
        if meta.events.is_empty() {
            continue;
        }
        let recurrence = meta.recurring.first().and_then(|value| Recurrence::parse(value));
        let until = meta.recurring_end.first().and_then(|value| parse_event_date(value));

        for raw in &meta.events {
            let Some(start) = parse_event_date(raw) else {
                tracing::debug!(note_id = %note.id, value = %raw, "skipping unparseable event date");
                continue;
            };
            let Some(date) = next_occurrence(start, recurrence, today, until) else {
                continue;
            };
            if date > horizon {
                continue;
            }
            occurrences.push(EventOccurrence {
                id: note.id.clone(),
                description: first_line(&note.content).to_string(),
                date,
                recurrence,
            });
        }
    }

    occurrences.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.description.cmp(&b.description)));
    occurrences
}

/// Accepts `YYYY-MM-DD` optionally followed by a time part.
pub fn parse_event_date(value: &str) -> Option<NaiveDate> {
    let date_part = value.trim().get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

pub fn next_occurrence(
    start: NaiveDate,
    recurrence: Option<Recurrence>,
    today: NaiveDate,
    until: Option<NaiveDate>,
) -> Option<NaiveDate> {
    let candidate = if start >= today {
        start
    } else {
        match recurrence? {
            Recurrence::Daily => today,
            Recurrence::Weekly => {
                let behind = (today - start).num_days();
                let weeks = (behind + 6) / 7;
                start + Duration::weeks(weeks)
            }
            Recurrence::Monthly => step_months(start, today, 1)?,
            Recurrence::Yearly => step_months(start, today, 12)?,
        }
    };

    match until {
        Some(end) if candidate > end => None,
        _ => Some(candidate),
    }
}

fn step_months(start: NaiveDate, today: NaiveDate, step: u32) -> Option<NaiveDate> {
    let elapsed = (today.year() - start.year()) * 12 + today.month() as i32 - start.month() as i32;
    let mut periods = (elapsed.max(0) as u32) / step;
    loop {
        let candidate = start.checked_add_months(Months::new(periods.checked_mul(step)?))?;
        if candidate >= today {
            return Some(candidate);
        }
        periods += 1;
    }
}
