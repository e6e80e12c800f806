use crate::models::{DateGroup, Note};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static CREATED_DATETIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4}),?\s+(\d{1,2}):(\d{2})(?::(\d{2}))?\s*(?:([ap])\.?m\.?)?$")
        .expect("valid created datetime regex")
});

/// Parses `DD/MM/YYYY, h:mm:ss am` timestamps as written by the note editor.
///
/// The meridiem is optional (24-hour clock without it) and matched
/// case-insensitively; narrow and regular no-break spaces count as spaces.
pub fn parse_created_datetime(raw: &str) -> Option<NaiveDateTime> {
    let normalized = raw
        .replace(['\u{202f}', '\u{a0}'], " ")
        .trim()
        .to_ascii_lowercase();
    let caps = CREATED_DATETIME_RE.captures(&normalized)?;

    let day: u32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    let year: i32 = caps.get(3)?.as_str().parse().ok()?;
    let mut hour: u32 = caps.get(4)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(5)?.as_str().parse().ok()?;
    let second: u32 = match caps.get(6) {
        Some(value) => value.as_str().parse().ok()?,
        None => 0,
    };

    if let Some(meridiem) = caps.get(7) {
        if !(1..=12).contains(&hour) {
            return None;
        }
        hour %= 12;
        if meridiem.as_str() == "p" {
            hour += 12;
        }
    }

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_opt(hour, minute, second)?;
    Some(date.and_time(time))
}

pub fn format_created_datetime(value: &NaiveDateTime) -> String {
    value.format("%d/%m/%Y, %-I:%M:%S %P").to_string()
}

pub fn created_date(note: &Note) -> Option<NaiveDate> {
    parse_created_datetime(&note.created_datetime).map(|value| value.date())
}

pub fn is_created_on(note: &Note, date: NaiveDate) -> bool {
    created_date(note) == Some(date)
}

/// Buckets notes by creation date, newest date first and latest time first
/// within a date. Notes with an unreadable timestamp are left out.
pub fn group_notes_by_date(notes: Vec<Note>) -> Vec<DateGroup> {
    let mut buckets: BTreeMap<NaiveDate, Vec<(NaiveTime, Note)>> = BTreeMap::new();

    for note in notes {
        match parse_created_datetime(&note.created_datetime) {
            Some(created) => buckets
                .entry(created.date())
                .or_default()
                .push((created.time(), note)),
            None => {
                tracing::debug!(
                    note_id = %note.id,
                    created_datetime = %note.created_datetime,
                    "skipping note with unparseable creation time"
                );
            }
        }
    }

    buckets
        .into_iter()
        .rev()
        .map(|(date, mut entries)| {
            entries.sort_by(|a, b| b.0.cmp(&a.0));
            DateGroup {
                date,
                notes: entries.into_iter().map(|(_, note)| note).collect(),
            }
        })
        .collect()
}
