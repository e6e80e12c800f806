use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Australia::Sydney;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub content: String,
    pub created_datetime: String,
}

impl Note {
    pub fn new(id: impl Into<String>, content: impl Into<String>, created_datetime: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            created_datetime: created_datetime.into(),
        }
    }
}

/// Buckets of meta values found in a note, in encounter order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedMeta {
    pub priority: Vec<String>,
    pub todo: Vec<String>,
    pub links: Vec<String>,
    pub dates: Vec<String>,
    pub events: Vec<String>,
    pub meetings: Vec<String>,
    pub pins: Vec<String>,
    pub abbreviations: Vec<bool>,
    pub bookmarks: Vec<bool>,
    pub recurring: Vec<String>,
    pub recurring_end: Vec<String>,
    pub other: Vec<String>,
}

impl ExtractedMeta {
    pub fn is_empty(&self) -> bool {
        self.priority.is_empty()
            && self.todo.is_empty()
            && self.links.is_empty()
            && self.dates.is_empty()
            && self.events.is_empty()
            && self.meetings.is_empty()
            && self.pins.is_empty()
            && self.abbreviations.is_empty()
            && self.bookmarks.is_empty()
            && self.recurring.is_empty()
            && self.recurring_end.is_empty()
            && self.other.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Recurrence {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Recurrence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "yearly" | "annually" => Some(Self::Yearly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: String,
    pub description: String,
    pub start_time: NaiveDateTime,
    /// Minutes.
    pub duration: u32,
}

impl Meeting {
    pub fn end_time(&self) -> NaiveDateTime {
        self.start_time + chrono::Duration::minutes(i64::from(self.duration))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextMeeting {
    pub id: String,
    pub start_time: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingSnapshot {
    pub evaluated_at: NaiveDateTime,
    pub ongoing: Option<Meeting>,
    pub upcoming: Option<NextMeeting>,
    pub unacknowledged: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MeetingEvent {
    Started {
        meeting: Meeting,
    },
    Ended {
        id: String,
    },
    #[serde(rename_all = "camelCase")]
    Approaching {
        meeting: NextMeeting,
        minutes_until: i64,
    },
    NeedsAcknowledgement {
        id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinnedSection {
    pub indices: Vec<usize>,
    pub line_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinnedSectionView {
    #[serde(flatten)]
    pub section: PinnedSection,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuggestionKind {
    Tag,
    Workstream,
    Person,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExclusionFilters {
    pub event_notes: bool,
    pub backup_notes: bool,
    pub watch_events: bool,
    pub bookmarks: bool,
    pub expenses: bool,
    pub sensitive: bool,
    pub trackers: bool,
    pub meetings: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewMode {
    #[default]
    Default,
    Popular,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotesQuery {
    pub search_text: Option<String>,
    pub filters: Option<ExclusionFilters>,
    #[serde(default)]
    pub mode: ViewMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateGroup {
    pub date: NaiveDate,
    pub notes: Vec<Note>,
}

/// Default mode groups notes by creation date; popular mode keeps the
/// ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "items", rename_all = "kebab-case")]
pub enum NotesView {
    Grouped(Vec<DateGroup>),
    Ranked(Vec<Note>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOccurrence {
    pub id: String,
    pub description: String,
    pub date: NaiveDate,
    pub recurrence: Option<Recurrence>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    pub id: String,
    pub description: String,
    pub priority: Option<Priority>,
    pub due: Option<NaiveDate>,
    pub overdue: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRecord {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub timezone: String,
    pub meeting_poll_seconds: u64,
    pub meeting_lookahead_minutes: i64,
    pub popular_limit: usize,
    pub default_exclusions: ExclusionFilters,
}

impl AppSettings {
    /// Lookahead window for the next meeting. Values chrono cannot represent
    /// fall back to the default.
    pub fn lookahead(&self) -> chrono::Duration {
        chrono::Duration::try_minutes(self.meeting_lookahead_minutes).unwrap_or_else(|| {
            tracing::warn!(
                minutes = self.meeting_lookahead_minutes,
                "meeting lookahead out of range; using default"
            );
            chrono::Duration::minutes(Self::default().meeting_lookahead_minutes)
        })
    }

    pub fn tz(&self) -> Tz {
        self.timezone.parse::<Tz>().unwrap_or_else(|_| {
            tracing::warn!(timezone = %self.timezone, "unknown timezone setting; using default");
            DEFAULT_TIMEZONE
        })
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.name().to_string(),
            meeting_poll_seconds: 60,
            meeting_lookahead_minutes: 15,
            popular_limit: 50,
            default_exclusions: ExclusionFilters::default(),
        }
    }
}
