use crate::chronology::{format_created_datetime, parse_created_datetime};
use crate::errors::{AppError, AppResult};
use crate::models::Note;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const NOTES_DIR: &str = "notes";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NoteFrontmatter {
    id: String,
    created_datetime: String,
}

pub fn ensure_topology(root: &Path) -> AppResult<()> {
    fs::create_dir_all(root.join(NOTES_DIR)).map_err(|error| AppError::Io(error.to_string()))
}

/// Every readable note under `root`, newest first. Malformed files are
/// skipped.
pub fn notes_list(root: &Path) -> AppResult<Vec<Note>> {
    ensure_topology(root)?;
    let mut notes = Vec::new();
    for entry in fs::read_dir(root.join(NOTES_DIR)).map_err(|error| AppError::Io(error.to_string()))? {
        let entry = entry.map_err(|error| AppError::Io(error.to_string()))?;
        let path = entry.path();
        if !is_note_file(&path) {
            continue;
        }
        match read_note_file(&path) {
            Ok(note) => notes.push(note),
            Err(error) => {
                tracing::warn!(path = %path.to_string_lossy(), error = %error, "skipping malformed note file");
            }
        }
    }
    notes.sort_by(compare_newest_first);
    Ok(notes)
}

pub fn note_get(root: &Path, note_id: &str) -> AppResult<Option<Note>> {
    let path = note_path(root, note_id);
    if !path.exists() {
        return Ok(None);
    }
    let note = read_note_file(&path)?;
    if note.id != note_id {
        return Ok(None);
    }
    Ok(Some(note))
}

pub fn note_create(root: &Path, content: &str, created_at: NaiveDateTime) -> AppResult<Note> {
    require_content(content)?;
    ensure_topology(root)?;
    let note = Note {
        id: Uuid::new_v4().to_string(),
        content: content.to_string(),
        created_datetime: format_created_datetime(&created_at),
    };
    write_note_file(&note_path(root, &note.id), &note)?;
    tracing::info!(note_id = %note.id, "note created");
    Ok(note)
}

/// Replaces the content of an existing note.
pub fn note_update(root: &Path, note_id: &str, content: &str) -> AppResult<Note> {
    require_content(content)?;
    let Some(mut note) = note_get(root, note_id)? else {
        return Err(AppError::NotFound(format!("Note {} not found", note_id)));
    };
    if note.content == content {
        return Ok(note);
    }
    note.content = content.to_string();
    write_note_file(&note_path(root, note_id), &note)?;
    tracing::info!(note_id = %note_id, "note updated");
    Ok(note)
}

pub fn note_delete(root: &Path, note_id: &str) -> AppResult<bool> {
    if note_get(root, note_id)?.is_none() {
        return Ok(false);
    }
    fs::remove_file(note_path(root, note_id)).map_err(|error| AppError::Io(error.to_string()))?;
    tracing::info!(note_id = %note_id, "note deleted");
    Ok(true)
}

fn require_content(content: &str) -> AppResult<()> {
    if content.trim().is_empty() {
        return Err(AppError::Invalid("Note content cannot be empty".to_string()));
    }
    Ok(())
}

fn compare_newest_first(a: &Note, b: &Note) -> Ordering {
    let left = parse_created_datetime(&a.created_datetime);
    let right = parse_created_datetime(&b.created_datetime);
    match (left, right) {
        (Some(left), Some(right)) => right.cmp(&left),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.id.cmp(&b.id))
}

fn note_path(root: &Path, note_id: &str) -> PathBuf {
    root.join(NOTES_DIR).join(format!("{}.md", sanitize_component(note_id)))
}

fn is_note_file(path: &Path) -> bool {
    matches!(path.extension().and_then(|value| value.to_str()), Some("md"))
}

fn sanitize_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    let cleaned = out.trim_matches('_').to_string();
    if cleaned.is_empty() {
        "note".to_string()
    } else {
        cleaned
    }
}

fn read_note_file(path: &Path) -> AppResult<Note> {
    let raw = fs::read_to_string(path).map_err(|error| AppError::Io(error.to_string()))?;
    let Some(rest) = raw.strip_prefix("---\n") else {
        return Err(AppError::Invalid(format!(
            "Malformed note file (missing opening delimiter): {}",
            path.to_string_lossy()
        )));
    };
    let Some(split_at) = rest.find("\n---\n") else {
        return Err(AppError::Invalid(format!(
            "Malformed note file (missing closing delimiter): {}",
            path.to_string_lossy()
        )));
    };
    let frontmatter: NoteFrontmatter = serde_yaml::from_str(&rest[..split_at])
        .map_err(|error| AppError::Invalid(format!("Invalid frontmatter in {}: {}", path.to_string_lossy(), error)))?;
    let body = &rest[(split_at + 5)..];
    let content = body.strip_prefix('\n').unwrap_or(body);

    Ok(Note {
        id: frontmatter.id,
        content: content.to_string(),
        created_datetime: frontmatter.created_datetime,
    })
}

fn write_note_file(path: &Path, note: &Note) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|error| AppError::Io(error.to_string()))?;
    }
    let frontmatter = NoteFrontmatter {
        id: note.id.clone(),
        created_datetime: note.created_datetime.clone(),
    };
    let yaml = serde_yaml::to_string(&frontmatter)?;
    let rendered = format!("---\n{}---\n\n{}", yaml, note.content);
    fs::write(path, rendered).map_err(|error| AppError::Io(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn temp_root() -> tempfile::TempDir {
        tempfile::tempdir().expect("temp workspace root")
    }

    fn created(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .and_then(|date| date.and_hms_opt(hour, 0, 0))
            .expect("valid datetime")
    }

    #[test]
    fn note_markdown_roundtrip_works() {
        let root = temp_root();
        let content = "Standup\n---\nnotes below a rule\nmeta::meeting::2024-03-01T10:00\n";
        let note = note_create(root.path(), content, created(1, 9)).expect("note created");
        assert_eq!(note.created_datetime, "01/03/2024, 9:00:00 am");

        let path = note_path(root.path(), &note.id);
        assert!(path.exists());

        let loaded = note_get(root.path(), &note.id).expect("note get").expect("note exists");
        assert_eq!(loaded, note);
    }

    #[test]
    fn update_replaces_content_and_rejects_blank() {
        let root = temp_root();
        let note = note_create(root.path(), "first", created(1, 9)).expect("note created");

        let updated = note_update(root.path(), &note.id, "second\nmeta::high").expect("note updated");
        assert_eq!(updated.content, "second\nmeta::high");
        assert_eq!(updated.created_datetime, note.created_datetime);

        let error = note_update(root.path(), &note.id, "   ").expect_err("blank content rejected");
        assert!(error.to_string().contains("INVALID"));

        let missing = note_update(root.path(), "nope", "x").expect_err("missing note");
        assert!(matches!(missing, AppError::NotFound(_)));
    }

    #[test]
    fn list_is_newest_first_and_skips_malformed_files() {
        let root = temp_root();
        let older = note_create(root.path(), "older", created(1, 9)).expect("older");
        let newer = note_create(root.path(), "newer", created(2, 9)).expect("newer");
        fs::write(root.path().join("notes/bad.md"), "no frontmatter here").expect("write malformed note");
        fs::write(root.path().join("notes/ignored.txt"), "---\nid: x\n---\n").expect("write stray file");

        let notes = notes_list(root.path()).expect("notes list");
        let ids: Vec<&str> = notes.iter().map(|note| note.id.as_str()).collect();
        assert_eq!(ids, vec![newer.id.as_str(), older.id.as_str()]);
    }

    #[test]
    fn delete_reports_whether_note_existed() {
        let root = temp_root();
        let note = note_create(root.path(), "temp", created(1, 9)).expect("note created");
        assert!(note_delete(root.path(), &note.id).expect("delete"));
        assert!(!note_delete(root.path(), &note.id).expect("second delete"));
        assert!(note_get(root.path(), &note.id).expect("get").is_none());
    }
}
