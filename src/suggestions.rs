use crate::meta::first_line;
use crate::models::{Note, Suggestion, SuggestionKind};

const WORKSTREAM_MARKER: &str = "meta::workstream";
const PERSON_MARKER: &str = "meta::person::";

pub fn build_suggestions_from_notes(notes: &[Note], existing: &[Suggestion]) -> Vec<Suggestion> {
    let workstreams = notes
        .iter()
        .filter(|note| note.content.contains(WORKSTREAM_MARKER))
        .map(|note| suggestion_for(note, SuggestionKind::Workstream));
    let people = notes
        .iter()
        .filter(|note| note.content.contains(PERSON_MARKER))
        .map(|note| suggestion_for(note, SuggestionKind::Person));

    existing.iter().cloned().chain(workstreams).chain(people).collect()
}

fn suggestion_for(note: &Note, kind: SuggestionKind) -> Suggestion {
    Suggestion {
        kind,
        id: note.id.clone(),
        text: first_line(&note.content).to_string(),
    }
}
