use crate::models::{ExtractedMeta, Priority};
use std::fmt;

pub const META_PREFIX: &str = "meta::";
pub const DETAIL_PREFIXES: [&str; 2] = ["meta_detail::", "meta_line::"];
const SEPARATOR: &str = "::";

/// One recognized `meta::` line.
///
/// `MetaTag::parse(&tag.encode()) == Some(tag)` holds whenever the values
/// carry neither `::` nor a line break and `Unknown` is not used for a
/// recognized tag name or a name with whitespace at its edges. Values are
/// kept verbatim, surrounding whitespace included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaTag {
    Priority(Priority),
    Todo(String),
    Link(String),
    EndDate(String),
    Event(String),
    Meeting(String),
    MeetingDuration(u32),
    MeetingAcknowledge(String),
    Pin(Vec<usize>),
    Abbreviation,
    Bookmark,
    Recurring(String),
    RecurringEnd(String),
    Unknown { name: String, values: Vec<String> },
}

impl MetaTag {
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.trim_start().strip_prefix(META_PREFIX)?;
        let mut parts = rest.split(SEPARATOR);
        let name = parts.next().unwrap_or_default().trim();
        let values: Vec<&str> = parts.collect();
        let first = values.first().copied().unwrap_or_default().to_string();

        let tag = match name {
            "high" => Self::Priority(Priority::High),
            "medium" => Self::Priority(Priority::Medium),
            "low" => Self::Priority(Priority::Low),
            "todo" => Self::Todo(values.join(SEPARATOR)),
            "link" => Self::Link(first),
            "end_date" => Self::EndDate(first),
            "event" => Self::Event(first),
            "meeting" => Self::Meeting(first),
            "meeting_duration" => match first.trim().parse::<u32>() {
                Ok(minutes) if values.len() == 1 && first == minutes.to_string() => {
                    Self::MeetingDuration(minutes)
                }
                _ => Self::unknown(name, &values),
            },
            "meeting_acknowledge" => Self::MeetingAcknowledge(first),
            "pin" => Self::Pin(parse_pin_indices(&first)),
            "abbreviation" => Self::Abbreviation,
            "bookmark" => Self::Bookmark,
            "recurring" => Self::Recurring(first),
            "recurring_end" => Self::RecurringEnd(first),
            _ => Self::unknown(name, &values),
        };
        Some(tag)
    }

    fn unknown(name: &str, values: &[&str]) -> Self {
        Self::Unknown {
            name: name.to_string(),
            values: values.iter().map(|value| value.to_string()).collect(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Priority(priority) => priority.as_str(),
            Self::Todo(_) => "todo",
            Self::Link(_) => "link",
            Self::EndDate(_) => "end_date",
            Self::Event(_) => "event",
            Self::Meeting(_) => "meeting",
            Self::MeetingDuration(_) => "meeting_duration",
            Self::MeetingAcknowledge(_) => "meeting_acknowledge",
            Self::Pin(_) => "pin",
            Self::Abbreviation => "abbreviation",
            Self::Bookmark => "bookmark",
            Self::Recurring(_) => "recurring",
            Self::RecurringEnd(_) => "recurring_end",
            Self::Unknown { name, .. } => name,
        }
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MetaTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", META_PREFIX, self.name())?;
        match self {
            Self::Priority(_) | Self::Abbreviation | Self::Bookmark => Ok(()),
            Self::Todo(value) if value.is_empty() => Ok(()),
            Self::Todo(value)
            | Self::Link(value)
            | Self::EndDate(value)
            | Self::Event(value)
            | Self::Meeting(value)
            | Self::MeetingAcknowledge(value)
            | Self::Recurring(value)
            | Self::RecurringEnd(value) => write!(f, "{}{}", SEPARATOR, value),
            Self::MeetingDuration(minutes) => write!(f, "{}{}", SEPARATOR, minutes),
            Self::Pin(indices) => write!(f, "{}{}", SEPARATOR, join_indices(indices)),
            Self::Unknown { values, .. } => {
                for value in values {
                    write!(f, "{}{}", SEPARATOR, value)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaLine {
    Tag(MetaTag),
    Detail { family: String, value: String },
}

impl MetaLine {
    pub fn parse(line: &str) -> Option<Self> {
        if let Some(tag) = MetaTag::parse(line) {
            return Some(Self::Tag(tag));
        }
        let trimmed = line.trim();
        DETAIL_PREFIXES.iter().find_map(|prefix| {
            trimmed.strip_prefix(prefix).map(|value| Self::Detail {
                family: prefix.trim_end_matches(SEPARATOR).to_string(),
                value: value.to_string(),
            })
        })
    }
}

pub fn extract_meta_tags(content: &str) -> ExtractedMeta {
    let mut meta = ExtractedMeta::default();

    for line in content.lines() {
        let trimmed = line.trim();
        if !trimmed.starts_with(META_PREFIX) {
            continue;
        }

        let parts: Vec<&str> = trimmed.split(SEPARATOR).collect();
        let tag_name = parts.get(1).copied().unwrap_or_default();
        let value = || parts.get(2).copied().unwrap_or_default().to_string();

        match tag_name {
            "high" | "medium" | "low" => meta.priority.push(tag_name.to_string()),
            "todo" => meta.todo.push(parts.get(2..).map(|rest| rest.join(SEPARATOR)).unwrap_or_default()),
            "link" => meta.links.push(value()),
            "end_date" => meta.dates.push(value()),
            "event" => meta.events.push(value()),
            "meeting" => meta.meetings.push(value()),
            "pin" => meta.pins.push(value()),
            "abbreviation" => meta.abbreviations.push(true),
            "bookmark" => meta.bookmarks.push(true),
            "recurring" => meta.recurring.push(value()),
            "recurring_end" => meta.recurring_end.push(value()),
            _ => meta.other.push(trimmed.to_string()),
        }
    }

    meta
}

pub fn parse_pin_indices(raw: &str) -> Vec<usize> {
    raw.split(',')
        .filter_map(|token| token.trim().parse::<usize>().ok())
        .collect()
}

pub fn join_indices(indices: &[usize]) -> String {
    indices
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

pub fn is_meta_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with(META_PREFIX) || DETAIL_PREFIXES.iter().any(|prefix| trimmed.starts_with(prefix))
}

/// First line of the note, used as its description.
pub fn first_line(content: &str) -> &str {
    content.lines().next().unwrap_or_default()
}

pub fn strip_meta_lines(content: &str) -> String {
    content
        .lines()
        .filter(|line| !is_meta_line(line))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn has_meta_detail(content: &str, value: &str) -> bool {
    content.lines().any(|line| {
        matches!(
            MetaLine::parse(line),
            Some(MetaLine::Detail { value: ref found, .. }) if found == value
        )
    })
}

/// `\r\n` when the content already uses it, `\n` otherwise. Edits rejoin
/// lines with this so a CRLF note stays CRLF.
pub fn line_ending(content: &str) -> &'static str {
    if content.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

pub fn append_meta_line(content: &str, line: &str) -> String {
    let base = content.trim_end();
    if base.is_empty() {
        line.to_string()
    } else {
        format!("{}{}{}", base, line_ending(content), line)
    }
}

pub fn add_meta_tag(content: &str, tag: &MetaTag) -> String {
    append_meta_line(content, &tag.encode())
}

pub fn remove_meta_tags(content: &str, name: &str) -> String {
    content
        .lines()
        .filter(|line| meta_tag_name(line) != Some(name))
        .collect::<Vec<_>>()
        .join(line_ending(content))
}

/// Drops existing lines for the tag's name, then appends the tag. Setting a
/// priority clears every other priority level too.
pub fn replace_meta_tag(content: &str, tag: &MetaTag) -> String {
    let cleared = match tag {
        MetaTag::Priority(_) => [Priority::High, Priority::Medium, Priority::Low]
            .iter()
            .fold(content.to_string(), |acc, level| remove_meta_tags(&acc, level.as_str())),
        _ => remove_meta_tags(content, tag.name()),
    };
    add_meta_tag(&cleared, tag)
}

fn meta_tag_name(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix(META_PREFIX)
        .map(|rest| rest.split(SEPARATOR).next().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_content_has_no_meta() {
        let meta = extract_meta_tags("Groceries\nmilk\n  eggs  \nmeta_detail::dismissed");
        assert!(meta.is_empty());
    }

    #[test]
    fn extracts_priority_todo_and_meeting() {
        let meta = extract_meta_tags("A\nmeta::high\nmeta::todo::2024-03-21\nmeta::meeting::2024-03-20T10:00");
        assert_eq!(meta.priority, vec!["high"]);
        assert_eq!(meta.todo, vec!["2024-03-21"]);
        assert_eq!(meta.meetings, vec!["2024-03-20T10:00"]);
        assert!(meta.other.is_empty());
    }

    #[test]
    fn buckets_keep_order_and_duplicates() {
        let content = "title\nmeta::link::a\nbody\n  meta::link::b  \nmeta::link::a\nmeta::bookmark\nmeta::bookmark";
        let meta = extract_meta_tags(content);
        assert_eq!(meta.links, vec!["a", "b", "a"]);
        assert_eq!(meta.bookmarks, vec![true, true]);
    }

    #[test]
    fn unrecognized_and_malformed_lines_land_in_other() {
        let meta = extract_meta_tags("x\nmeta::\nmeta::meeting_duration::45\nmeta::expense::50::food");
        assert_eq!(
            meta.other,
            vec!["meta::", "meta::meeting_duration::45", "meta::expense::50::food"]
        );
    }

    #[test]
    fn todo_keeps_remaining_segments_and_empty_value() {
        let meta = extract_meta_tags("x\nmeta::todo\nmeta::todo::a::b");
        assert_eq!(meta.todo, vec!["", "a::b"]);
    }

    #[test]
    fn single_value_tags_default_to_empty() {
        let meta = extract_meta_tags("meta::event\nmeta::recurring::weekly\nmeta::recurring_end::2025-01-01");
        assert_eq!(meta.events, vec![""]);
        assert_eq!(meta.recurring, vec!["weekly"]);
        assert_eq!(meta.recurring_end, vec!["2025-01-01"]);
    }

    #[test]
    fn tags_roundtrip_through_encode() {
        let tags = vec![
            MetaTag::Priority(Priority::Medium),
            MetaTag::Todo(String::new()),
            MetaTag::Todo("2024-03-21".to_string()),
            MetaTag::Link("https://example.com/a?b=c".to_string()),
            MetaTag::Link(String::new()),
            MetaTag::Link(" https://a.example ".to_string()),
            MetaTag::Recurring("weekly\t".to_string()),
            MetaTag::EndDate("2024-05-01".to_string()),
            MetaTag::Event("2024-05-01".to_string()),
            MetaTag::Meeting("2024-03-20T10:00".to_string()),
            MetaTag::MeetingDuration(45),
            MetaTag::MeetingAcknowledge("2024-03-20T11:00:00.000Z".to_string()),
            MetaTag::Pin(vec![3, 1, 2]),
            MetaTag::Pin(Vec::new()),
            MetaTag::Abbreviation,
            MetaTag::Bookmark,
            MetaTag::Recurring("weekly".to_string()),
            MetaTag::RecurringEnd("2025-01-01".to_string()),
            MetaTag::Unknown {
                name: "expense".to_string(),
                values: vec!["50".to_string(), "food".to_string()],
            },
            MetaTag::Unknown {
                name: "workstream".to_string(),
                values: Vec::new(),
            },
            MetaTag::Unknown {
                name: String::new(),
                values: Vec::new(),
            },
        ];

        for tag in tags {
            let encoded = tag.encode();
            assert_eq!(MetaTag::parse(&encoded), Some(tag.clone()), "line {}", encoded);
        }
    }

    #[test]
    fn indented_lines_parse_with_values_verbatim() {
        assert_eq!(MetaTag::parse("  meta::high"), Some(MetaTag::Priority(Priority::High)));
        assert_eq!(MetaTag::parse("meta::high  "), Some(MetaTag::Priority(Priority::High)));
        assert_eq!(
            MetaTag::parse("\tmeta::link::https://a.example "),
            Some(MetaTag::Link("https://a.example ".to_string()))
        );
        assert_eq!(
            MetaTag::parse("meta::meeting_duration::30 "),
            Some(MetaTag::Unknown {
                name: "meeting_duration".to_string(),
                values: vec!["30 ".to_string()],
            })
        );
    }

    #[test]
    fn non_numeric_duration_stays_unknown() {
        assert_eq!(
            MetaTag::parse("meta::meeting_duration::soon"),
            Some(MetaTag::Unknown {
                name: "meeting_duration".to_string(),
                values: vec!["soon".to_string()],
            })
        );
    }

    #[test]
    fn detail_lines_parse_as_details() {
        assert_eq!(
            MetaLine::parse("meta_detail::dismissed"),
            Some(MetaLine::Detail {
                family: "meta_detail".to_string(),
                value: "dismissed".to_string(),
            })
        );
        assert!(has_meta_detail("a\nmeta_line::dismissed", "dismissed"));
        assert!(!has_meta_detail("a\nmeta::dismissed", "dismissed"));
        assert_eq!(MetaLine::parse("plain"), None);
    }

    #[test]
    fn replace_and_remove_touch_only_named_tag() {
        let content = "Plan\nmeta::high\nmeta::todo::x\nmeta::todo::y\nmeta::high_five";
        let replaced = replace_meta_tag(content, &MetaTag::Todo("z".to_string()));
        assert_eq!(replaced, "Plan\nmeta::high\nmeta::high_five\nmeta::todo::z");

        let removed = remove_meta_tags(content, "high");
        assert_eq!(removed, "Plan\nmeta::todo::x\nmeta::todo::y\nmeta::high_five");
    }

    #[test]
    fn setting_priority_clears_other_levels() {
        let replaced = replace_meta_tag("Errand\nmeta::low\nmeta::medium", &MetaTag::Priority(Priority::High));
        assert_eq!(replaced, "Errand\nmeta::high");
    }

    #[test]
    fn append_trims_trailing_whitespace() {
        assert_eq!(append_meta_line("a\n\n", "meta::low"), "a\nmeta::low");
        assert_eq!(append_meta_line("", "meta::low"), "meta::low");
    }

    #[test]
    fn edits_keep_crlf_line_endings() {
        let content = "Plan\r\nmeta::high\r\nmeta::todo::x\r\n";
        assert_eq!(remove_meta_tags(content, "high"), "Plan\r\nmeta::todo::x");
        assert_eq!(
            replace_meta_tag(content, &MetaTag::Priority(Priority::Low)),
            "Plan\r\nmeta::todo::x\r\nmeta::low"
        );
        assert_eq!(append_meta_line("a\nb", "meta::low"), "a\nb\nmeta::low");
    }

    #[test]
    fn strip_meta_lines_keeps_body() {
        let body = strip_meta_lines("Title\nmeta::high\nline\nmeta_detail::dismissed");
        assert_eq!(body, "Title\nline");
        assert_eq!(first_line("Title\nline"), "Title");
        assert_eq!(first_line(""), "");
    }
}
