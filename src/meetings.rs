use crate::meta::{append_meta_line, first_line, MetaTag};
use crate::models::{Meeting, MeetingSnapshot, NextMeeting, Note};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static ISO_DATE_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("valid iso date prefix regex"));
static MEETING_DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"meta::meeting_duration::(\d+)").expect("valid meeting duration regex"));

const MEETING_MARKER: &str = "meta::meeting::";
const ACKNOWLEDGED_MARKER: &str = "meta::meeting_acknowledge";
const DISMISSED_MARKER: &str = "meta_detail::dismissed";

const NAIVE_START_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Returns the meeting whose window contains `now`, preferring the one that
/// ends soonest.
pub fn check_for_ongoing_meeting<Tz: TimeZone>(notes: &[Note], now: &DateTime<Tz>) -> Option<Meeting> {
    let zone = now.timezone();
    let mut best: Option<(Meeting, DateTime<Tz>)> = None;

    for note in notes {
        if !is_live_meeting_note(note) {
            continue;
        }
        let Some(meeting) = meeting_from_note(note, &zone) else {
            continue;
        };
        let Some((start, end)) = meeting_window(&meeting, &zone) else {
            continue;
        };
        if start > *now || *now > end {
            continue;
        }
        if best.as_ref().map_or(true, |(_, best_end)| end < *best_end) {
            best = Some((meeting, end));
        }
    }

    best.map(|(meeting, _)| meeting)
}

pub fn find_next_meeting<Tz: TimeZone>(notes: &[Note], now: &DateTime<Tz>) -> Option<NextMeeting> {
    let zone = now.timezone();
    let mut best: Option<(NextMeeting, DateTime<Tz>)> = None;

    for note in notes {
        if !is_live_meeting_note(note) {
            continue;
        }
        let Some(start_time) = meeting_start(&note.content, &zone) else {
            continue;
        };
        let Some(start) = resolve_local(&zone, &start_time) else {
            continue;
        };
        if start <= *now {
            continue;
        }
        if best.as_ref().map_or(true, |(_, best_start)| start < *best_start) {
            best = Some((
                NextMeeting {
                    id: note.id.clone(),
                    start_time,
                },
                start,
            ));
        }
    }

    best.map(|(next, _)| next)
}

pub fn get_unacknowledged_past_meetings<Tz: TimeZone>(notes: &[Note], now: &DateTime<Tz>) -> Vec<Note> {
    let zone = now.timezone();

    notes
        .iter()
        .filter(|note| note.content.contains(MEETING_MARKER) && !note.content.contains(ACKNOWLEDGED_MARKER))
        .filter(|note| {
            meeting_from_note(note, &zone)
                .and_then(|meeting| meeting_window(&meeting, &zone))
                .map(|(_, end)| end < *now)
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

pub fn evaluate_meetings<Tz: TimeZone>(
    notes: &[Note],
    now: &DateTime<Tz>,
    lookahead: chrono::Duration,
) -> MeetingSnapshot {
    let zone = now.timezone();
    let upcoming = find_next_meeting(notes, now).filter(|next| {
        resolve_local(&zone, &next.start_time)
            .map(|start| start.signed_duration_since(now.clone()) <= lookahead)
            .unwrap_or(false)
    });

    MeetingSnapshot {
        evaluated_at: now.naive_local(),
        ongoing: check_for_ongoing_meeting(notes, now),
        upcoming,
        unacknowledged: get_unacknowledged_past_meetings(notes, now)
            .into_iter()
            .map(|note| note.id)
            .collect(),
    }
}

/// The instant a wall-clock time in `zone` stands for. A repeated time takes
/// its first occurrence; a time skipped by a forward jump is read with the
/// offset in force before the jump.
pub fn resolve_local<Tz: TimeZone>(zone: &Tz, local: &NaiveDateTime) -> Option<DateTime<Tz>> {
    zone.from_local_datetime(local).earliest().or_else(|| {
        let shifted = local.checked_add_signed(chrono::Duration::hours(1))?;
        zone.from_local_datetime(&shifted).earliest()
    })
}

/// Start and end instants of a meeting whose start is wall-clock time in `zone`.
pub fn meeting_window<Tz: TimeZone>(meeting: &Meeting, zone: &Tz) -> Option<(DateTime<Tz>, DateTime<Tz>)> {
    let start = resolve_local(zone, &meeting.start_time)?;
    let end = start
        .clone()
        .checked_add_signed(chrono::Duration::minutes(i64::from(meeting.duration)))?;
    Some((start, end))
}

pub fn acknowledge_meeting<Tz: TimeZone>(content: &str, now: &DateTime<Tz>) -> String {
    let stamp = now.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true);
    append_meta_line(content, &MetaTag::MeetingAcknowledge(stamp).encode())
}

pub fn dismiss_meeting(content: &str) -> String {
    append_meta_line(content, DISMISSED_MARKER)
}

fn is_live_meeting_note(note: &Note) -> bool {
    note.content.contains(MEETING_MARKER) && !note.content.contains(DISMISSED_MARKER)
}

fn meeting_from_note<Tz: TimeZone>(note: &Note, zone: &Tz) -> Option<Meeting> {
    let start_time = meeting_start(&note.content, zone)?;
    let duration = meeting_duration(&note.content)?;
    Some(Meeting {
        id: note.id.clone(),
        description: first_line(&note.content).to_string(),
        start_time,
        duration,
    })
}

/// Start time from the first line that begins with an ISO date. A note
/// whose first such line does not parse has no start time.
pub fn meeting_start<Tz: TimeZone>(content: &str, zone: &Tz) -> Option<NaiveDateTime> {
    let line = content
        .lines()
        .map(str::trim)
        .find(|line| ISO_DATE_PREFIX_RE.is_match(line))?;
    parse_start_line(line, zone)
}

pub fn meeting_duration(content: &str) -> Option<u32> {
    MEETING_DURATION_RE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .and_then(|value| value.as_str().parse::<u32>().ok())
}

pub fn parse_start_line<Tz: TimeZone>(line: &str, zone: &Tz) -> Option<NaiveDateTime> {
    let trimmed = line.trim();
    let first_token = trimmed.split_whitespace().next().unwrap_or_default();
    [trimmed, first_token]
        .into_iter()
        .filter(|candidate| !candidate.is_empty())
        .find_map(|candidate| parse_iso_datetime(candidate, zone))
}

fn parse_iso_datetime<Tz: TimeZone>(value: &str, zone: &Tz) -> Option<NaiveDateTime> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(value) {
        return Some(with_offset.with_timezone(zone).naive_local());
    }
    if let Some(naive) = NAIVE_START_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
    {
        return Some(naive);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset};

    fn meeting_note(id: &str, start: &str, duration: Option<u32>) -> Note {
        let mut content = format!("{} sync\n{}\nmeta::meeting::{}", id, start, start);
        if let Some(minutes) = duration {
            content.push_str(&format!("\nmeta::meeting_duration::{}", minutes));
        }
        Note::new(id, content, "01/01/2024, 9:00:00 am")
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, minute, 0).single().expect("valid time")
    }

    #[test]
    fn ongoing_meeting_inside_window_only() {
        let notes = vec![meeting_note("standup", "2024-01-01T10:00:00", Some(60))];

        let ongoing = check_for_ongoing_meeting(&notes, &at(10, 30)).expect("meeting is ongoing");
        assert_eq!(ongoing.id, "standup");
        assert_eq!(ongoing.description, "standup sync");
        assert_eq!(ongoing.duration, 60);

        assert!(check_for_ongoing_meeting(&notes, &at(11, 1)).is_none());
        assert!(check_for_ongoing_meeting(&notes, &at(9, 59)).is_none());
        assert!(check_for_ongoing_meeting(&notes, &at(11, 0)).is_some());
    }

    #[test]
    fn ongoing_prefers_earliest_end() {
        let notes = vec![
            meeting_note("long", "2024-01-01T10:00:00", Some(20)),
            meeting_note("short", "2024-01-01T10:00:00", Some(10)),
        ];
        let ongoing = check_for_ongoing_meeting(&notes, &at(10, 5)).expect("ongoing");
        assert_eq!(ongoing.id, "short");
    }

    #[test]
    fn ongoing_ties_go_to_first_note() {
        let notes = vec![
            meeting_note("first", "2024-01-01T10:00", Some(30)),
            meeting_note("second", "2024-01-01T10:00", Some(30)),
        ];
        let ongoing = check_for_ongoing_meeting(&notes, &at(10, 5)).expect("ongoing");
        assert_eq!(ongoing.id, "first");
    }

    #[test]
    fn dismissed_and_incomplete_notes_are_skipped() {
        let mut dismissed = meeting_note("dismissed", "2024-01-01T10:00:00", Some(60));
        dismissed.content = dismiss_meeting(&dismissed.content);
        let no_duration = meeting_note("no-duration", "2024-01-01T10:00:00", None);
        let bad_date = meeting_note("bad-date", "2024-13-45T10:00:00", Some(60));
        let not_meeting = Note::new("plain", "2024-01-01T10:00:00\nmeta::meeting_duration::60", "");

        let notes = vec![dismissed, no_duration, bad_date, not_meeting];
        assert!(check_for_ongoing_meeting(&notes, &at(10, 30)).is_none());
    }

    #[test]
    fn next_meeting_is_earliest_future_start() {
        let notes = vec![
            meeting_note("later", "2024-01-01T15:00:00", None),
            meeting_note("past", "2024-01-01T08:00:00", Some(30)),
            meeting_note("sooner", "2024-01-01T12:00:00", Some(30)),
        ];
        let next = find_next_meeting(&notes, &at(10, 0)).expect("next meeting");
        assert_eq!(next.id, "sooner");
        assert_eq!(next.start_time, at(12, 0).naive_utc());

        assert!(find_next_meeting(&notes, &at(16, 0)).is_none());
    }

    #[test]
    fn acknowledged_meetings_leave_past_list() {
        let mut note = meeting_note("retro", "2024-01-01T09:00:00", Some(30));
        let now = at(10, 0);
        let pending = get_unacknowledged_past_meetings(std::slice::from_ref(&note), &now);
        assert_eq!(pending.len(), 1);

        note.content = acknowledge_meeting(&note.content, &now);
        assert!(note.content.ends_with("meta::meeting_acknowledge::2024-01-01T10:00:00.000Z"));
        assert!(get_unacknowledged_past_meetings(&[note], &now).is_empty());
    }

    #[test]
    fn past_list_keeps_caller_order_and_excludes_running() {
        let notes = vec![
            meeting_note("b", "2024-01-01T08:00:00", Some(30)),
            meeting_note("running", "2024-01-01T09:45:00", Some(30)),
            meeting_note("a", "2024-01-01T07:00:00", Some(30)),
        ];
        let ids: Vec<String> = get_unacknowledged_past_meetings(&notes, &at(10, 0))
            .into_iter()
            .map(|note| note.id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn offset_start_lines_convert_into_evaluation_zone() {
        let sydney = FixedOffset::east_opt(11 * 3600).expect("offset");
        let notes = vec![meeting_note("remote", "2024-01-01T00:00:00Z", Some(60))];
        let now = sydney.with_ymd_and_hms(2024, 1, 1, 11, 30, 0).single().expect("valid time");
        let ongoing = check_for_ongoing_meeting(&notes, &now).expect("ongoing in sydney");
        assert_eq!(
            ongoing.start_time,
            NaiveDate::from_ymd_opt(2024, 1, 1).and_then(|d| d.and_hms_opt(11, 0, 0)).expect("time")
        );
    }

    #[test]
    fn repeated_hour_keeps_meeting_ongoing_across_fall_back() {
        // Sydney leaves daylight time at 03:00 on 2024-04-07; 02:00-03:00 runs twice.
        let zone = chrono_tz::Australia::Sydney;
        let notes = vec![meeting_note("late", "2024-04-07T02:15", Some(90))];
        let half_past_two = NaiveDate::from_ymd_opt(2024, 4, 7)
            .and_then(|d| d.and_hms_opt(2, 30, 0))
            .expect("time");
        let first_pass = zone
            .from_local_datetime(&half_past_two)
            .earliest()
            .expect("first 02:30");
        let second_pass = first_pass + Duration::hours(1);
        assert_eq!(second_pass.naive_local(), first_pass.naive_local());

        assert!(check_for_ongoing_meeting(&notes, &first_pass).is_some());
        // 90 minutes after 02:15 (first pass) is 02:45 on the second pass.
        assert!(check_for_ongoing_meeting(&notes, &second_pass).is_some());
        let after = second_pass + Duration::minutes(20);
        assert!(check_for_ongoing_meeting(&notes, &after).is_none());
        assert_eq!(get_unacknowledged_past_meetings(&notes, &after).len(), 1);
    }

    #[test]
    fn skipped_hour_start_reads_with_offset_before_jump() {
        // Sydney enters daylight time at 02:00 on 2024-10-06; 02:00-03:00 never happens.
        let zone = chrono_tz::Australia::Sydney;
        let skipped = NaiveDate::from_ymd_opt(2024, 10, 6)
            .and_then(|d| d.and_hms_opt(2, 30, 0))
            .expect("time");
        let resolved = resolve_local(&zone, &skipped).expect("resolved");
        assert_eq!(
            resolved.naive_utc(),
            NaiveDate::from_ymd_opt(2024, 10, 5)
                .and_then(|d| d.and_hms_opt(16, 30, 0))
                .expect("time")
        );
    }

    #[test]
    fn start_line_accepts_trailing_text_and_bare_dates() {
        let zone = Utc;
        let with_text = parse_start_line("2024-01-01T10:00 planning", &zone).expect("parsed");
        assert_eq!(with_text, at(10, 0).naive_utc());
        let spaced = parse_start_line("2024-01-01 10:00", &zone).expect("parsed");
        assert_eq!(spaced, at(10, 0).naive_utc());
        let bare = parse_start_line("2024-01-01", &zone).expect("parsed");
        assert_eq!(bare, at(0, 0).naive_utc());
    }

    #[test]
    fn snapshot_limits_upcoming_to_lookahead() {
        let notes = vec![
            meeting_note("now", "2024-01-01T09:50:00", Some(30)),
            meeting_note("soon", "2024-01-01T10:10:00", Some(30)),
            meeting_note("done", "2024-01-01T08:00:00", Some(30)),
        ];
        let snapshot = evaluate_meetings(&notes, &at(10, 0), Duration::minutes(15));
        assert_eq!(snapshot.ongoing.map(|m| m.id), Some("now".to_string()));
        assert_eq!(snapshot.upcoming.map(|m| m.id), Some("soon".to_string()));
        assert_eq!(snapshot.unacknowledged, vec!["done"]);

        let narrow = evaluate_meetings(&notes, &at(10, 0), Duration::minutes(5));
        assert!(narrow.upcoming.is_none());
    }
}
