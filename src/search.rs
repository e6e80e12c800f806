use crate::chronology::is_created_on;
use crate::models::{ExclusionFilters, Note, Suggestion};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

pub const DEFAULT_POPULAR_LIMIT: usize = 50;

pub fn search_in_note(note: Option<&Note>, search_text: Option<&str>) -> bool {
    let (Some(note), Some(search_text)) = (note, search_text) else {
        return false;
    };
    if note.content.is_empty() || search_text.is_empty() {
        return false;
    }
    note.content.to_lowercase().contains(&search_text.to_lowercase())
}

impl ExclusionFilters {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// True when no enabled toggle matches the note's content.
    pub fn keeps(&self, note: &Note) -> bool {
        let content = note.content.as_str();
        !(excluded(self.event_notes, content, &["meta::event::"])
            || excluded(self.backup_notes, content, &["meta::notes_backup_date"])
            || excluded(self.watch_events, content, &["meta::watch"])
            || excluded(self.bookmarks, content, &["meta::bookmark", "meta::web_bookmark"])
            || excluded(self.expenses, content, &["meta::expense"])
            || excluded(self.sensitive, content, &["meta::sensitive::"])
            || excluded(self.trackers, content, &["meta::tracker"])
            || excluded(self.meetings, content, &["meta::meeting::"]))
    }
}

fn excluded(enabled: bool, content: &str, markers: &[&str]) -> bool {
    enabled && markers.iter().any(|marker| content.contains(marker))
}

pub fn apply_exclusions(notes: &mut Vec<Note>, filters: &ExclusionFilters) {
    if filters.is_empty() {
        return;
    }
    notes.retain(|note| filters.keeps(note));
}

/// Notes shown for a search box state: today's notes when the search text is
/// empty, otherwise every note containing the text.
pub fn visible_notes(
    notes: &[Note],
    search_text: Option<&str>,
    filters: &ExclusionFilters,
    today: NaiveDate,
) -> Vec<Note> {
    let query = search_text.filter(|text| !text.is_empty());
    let mut visible: Vec<Note> = notes
        .iter()
        .filter(|note| match query {
            Some(text) => search_in_note(Some(*note), Some(text)),
            None => is_created_on(note, today),
        })
        .cloned()
        .collect();
    apply_exclusions(&mut visible, filters);
    visible
}

/// Most-clicked notes first (up to `limit`), followed by today's notes that
/// were not already included.
pub fn popular_notes(
    notes: &[Note],
    filters: &ExclusionFilters,
    clicks: &HashMap<String, u64>,
    today: NaiveDate,
    limit: usize,
) -> Vec<Note> {
    let mut candidates = notes.to_vec();
    apply_exclusions(&mut candidates, filters);

    let mut clicked: Vec<(u64, &Note)> = candidates
        .iter()
        .filter_map(|note| {
            clicks
                .get(&note.id)
                .copied()
                .filter(|count| *count > 0)
                .map(|count| (count, note))
        })
        .collect();
    clicked.sort_by(|a, b| b.0.cmp(&a.0));

    let todays = candidates.iter().filter(|note| is_created_on(note, today));

    let mut seen = HashSet::new();
    clicked
        .into_iter()
        .take(limit)
        .map(|(_, note)| note)
        .chain(todays)
        .filter(|note| seen.insert(note.id.clone()))
        .cloned()
        .collect()
}

/// Candidates for the token being typed at the end of `query`. An empty
/// token, as after a trailing space, matches every suggestion.
pub fn filter_suggestions(query: &str, suggestions: &[Suggestion]) -> Vec<Suggestion> {
    let token = query
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or_default()
        .to_lowercase();
    suggestions
        .iter()
        .filter(|suggestion| suggestion.text.to_lowercase().contains(&token))
        .cloned()
        .collect()
}
