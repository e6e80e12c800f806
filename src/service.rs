use crate::chronology::group_notes_by_date;
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::events::upcoming_events;
use crate::meetings;
use crate::meta::{extract_meta_tags, remove_meta_tags, replace_meta_tag, MetaTag};
use crate::models::{
    AppSettings, DateGroup, EventOccurrence, ExtractedMeta, MeetingEvent, MeetingSnapshot, Note, NotesQuery,
    NotesView, PinnedSectionView, Suggestion, SuggestionKind, TagRecord, TodoItem, ViewMode,
};
use crate::pins::{add_pin, extract_pinned_sections, get_pinned_section_content, remove_pin};
use crate::scheduler::{Clock, MeetingWatcher, NotesLoader, WatcherConfig};
use crate::search::{filter_suggestions, popular_notes, visible_notes};
use crate::store;
use crate::suggestions::build_suggestions_from_notes;
use crate::todos::todo_agenda;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;

pub type UtcClock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Owns the database and the note workspace, and runs every operation
/// against "now" in the configured timezone.
pub struct NotesCore {
    db: Arc<Database>,
    workspace_root: PathBuf,
    clock: UtcClock,
}

impl NotesCore {
    pub fn new(data_dir: PathBuf) -> AppResult<Arc<Self>> {
        Self::with_clock(data_dir, Arc::new(Utc::now))
    }

    pub fn with_clock(data_dir: PathBuf, clock: UtcClock) -> AppResult<Arc<Self>> {
        std::fs::create_dir_all(&data_dir)?;
        let db = Arc::new(Database::new(&data_dir.join("notes.db"))?);
        let workspace_root = data_dir.join("workspace");
        store::ensure_topology(&workspace_root)?;
        tracing::info!(data_dir = %data_dir.to_string_lossy(), "notes core ready");

        Ok(Arc::new(Self {
            db,
            workspace_root,
            clock,
        }))
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn get_settings(&self) -> AppResult<AppSettings> {
        self.db.get_settings()
    }

    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<AppSettings> {
        let settings = self.db.update_settings(update)?;
        tracing::info!(timezone = %settings.timezone, "settings updated");
        Ok(settings)
    }

    pub fn now(&self) -> AppResult<DateTime<Tz>> {
        let tz = self.get_settings()?.tz();
        Ok((self.clock)().with_timezone(&tz))
    }

    pub fn today(&self) -> AppResult<NaiveDate> {
        Ok(self.now()?.date_naive())
    }

    pub fn list_notes(&self) -> AppResult<Vec<Note>> {
        store::notes_list(&self.workspace_root)
    }

    pub fn get_note(&self, note_id: &str) -> AppResult<Option<Note>> {
        store::note_get(&self.workspace_root, note_id)
    }

    pub fn create_note(&self, content: &str) -> AppResult<Note> {
        let now = self.now()?;
        store::note_create(&self.workspace_root, content, now.naive_local())
    }

    pub fn update_note(&self, note_id: &str, content: &str) -> AppResult<Note> {
        store::note_update(&self.workspace_root, note_id, content)
    }

    pub fn delete_note(&self, note_id: &str) -> AppResult<bool> {
        let deleted = store::note_delete(&self.workspace_root, note_id)?;
        if deleted {
            self.db.forget_clicks(note_id)?;
        }
        Ok(deleted)
    }

    pub fn note_meta(&self, note_id: &str) -> AppResult<ExtractedMeta> {
        let note = self.require_note(note_id)?;
        Ok(extract_meta_tags(&note.content))
    }

    pub fn visible_notes(&self, query: &NotesQuery) -> AppResult<Vec<Note>> {
        let settings = self.get_settings()?;
        let filters = query.filters.unwrap_or(settings.default_exclusions);
        let today = self.today()?;
        let notes = self.list_notes()?;

        let visible = match query.mode {
            ViewMode::Default => visible_notes(&notes, query.search_text.as_deref(), &filters, today),
            ViewMode::Popular => {
                let clicks = self.db.click_counts()?;
                popular_notes(&notes, &filters, &clicks, today, settings.popular_limit)
            }
        };
        tracing::debug!(mode = ?query.mode, total = notes.len(), visible = visible.len(), "notes filtered");
        Ok(visible)
    }

    pub fn grouped_notes(&self, query: &NotesQuery) -> AppResult<NotesView> {
        let visible = self.visible_notes(query)?;
        Ok(match query.mode {
            ViewMode::Default => NotesView::Grouped(group_notes_by_date(visible)),
            ViewMode::Popular => NotesView::Ranked(visible),
        })
    }

    /// Every note grouped by creation date, ignoring search and filters.
    pub fn timeline(&self) -> AppResult<Vec<DateGroup>> {
        Ok(group_notes_by_date(self.list_notes()?))
    }

    pub fn pinned_sections(&self, note_id: &str) -> AppResult<Vec<PinnedSectionView>> {
        let note = self.require_note(note_id)?;
        Ok(extract_pinned_sections(&note.content)
            .into_iter()
            .map(|section| PinnedSectionView {
                content: get_pinned_section_content(&note.content, &section.indices),
                section,
            })
            .collect())
    }

    pub fn pin_lines(&self, note_id: &str, indices: &[usize]) -> AppResult<Note> {
        if indices.is_empty() {
            return Err(AppError::Invalid("No lines selected to pin".to_string()));
        }
        self.rewrite_note(note_id, |content| add_pin(content, indices))
    }

    pub fn unpin_lines(&self, note_id: &str, indices: &[usize]) -> AppResult<Note> {
        self.rewrite_note(note_id, |content| remove_pin(content, indices))
    }

    pub fn set_meta_tag(&self, note_id: &str, tag: &MetaTag) -> AppResult<Note> {
        self.rewrite_note(note_id, |content| replace_meta_tag(content, tag))
    }

    pub fn remove_meta_tag(&self, note_id: &str, name: &str) -> AppResult<Note> {
        self.rewrite_note(note_id, |content| remove_meta_tags(content, name))
    }

    pub fn acknowledge_meeting(&self, note_id: &str) -> AppResult<Note> {
        let now = self.now()?;
        let note = self.rewrite_note(note_id, |content| meetings::acknowledge_meeting(content, &now))?;
        tracing::info!(note_id = %note_id, "meeting acknowledged");
        Ok(note)
    }

    pub fn dismiss_meeting(&self, note_id: &str) -> AppResult<Note> {
        let note = self.rewrite_note(note_id, meetings::dismiss_meeting)?;
        tracing::info!(note_id = %note_id, "meeting dismissed");
        Ok(note)
    }

    pub fn meeting_snapshot(&self) -> AppResult<MeetingSnapshot> {
        let settings = self.get_settings()?;
        let now = (self.clock)().with_timezone(&settings.tz());
        let notes = self.list_notes()?;
        Ok(meetings::evaluate_meetings(
            &notes,
            &now,
            settings.lookahead(),
        ))
    }

    pub fn record_click(&self, note_id: &str) -> AppResult<u64> {
        self.require_note(note_id)?;
        self.db.record_click(note_id)
    }

    pub fn list_tags(&self) -> AppResult<Vec<TagRecord>> {
        self.db.list_tags()
    }

    pub fn add_tag(&self, text: &str) -> AppResult<TagRecord> {
        self.db.add_tag(text)
    }

    pub fn rename_tag(&self, tag_id: &str, text: &str) -> AppResult<Option<TagRecord>> {
        self.db.rename_tag(tag_id, text)
    }

    pub fn delete_tag(&self, tag_id: &str) -> AppResult<bool> {
        self.db.delete_tag(tag_id)
    }

    pub fn suggestions(&self) -> AppResult<Vec<Suggestion>> {
        let tags: Vec<Suggestion> = self
            .db
            .list_tags()?
            .into_iter()
            .map(|tag| Suggestion {
                kind: SuggestionKind::Tag,
                id: tag.id,
                text: tag.text,
            })
            .collect();
        Ok(build_suggestions_from_notes(&self.list_notes()?, &tags))
    }

    pub fn autocomplete(&self, query: &str) -> AppResult<Vec<Suggestion>> {
        Ok(filter_suggestions(query, &self.suggestions()?))
    }

    pub fn upcoming_events(&self, horizon_days: u32) -> AppResult<Vec<EventOccurrence>> {
        Ok(upcoming_events(&self.list_notes()?, self.today()?, horizon_days))
    }

    pub fn todo_agenda(&self) -> AppResult<Vec<TodoItem>> {
        Ok(todo_agenda(&self.list_notes()?, self.today()?))
    }

    /// Builds a watcher over this workspace. The timezone and timings are
    /// read from settings once, when the watcher is built.
    pub fn meeting_watcher(&self) -> AppResult<(MeetingWatcher, mpsc::UnboundedReceiver<MeetingEvent>)> {
        let settings = self.get_settings()?;
        let tz = settings.tz();

        let root = self.workspace_root.clone();
        let loader: NotesLoader = Arc::new(move || store::notes_list(&root));
        let utc_clock = self.clock.clone();
        let clock: Clock = Arc::new(move || utc_clock().with_timezone(&tz));
        let config = WatcherConfig {
            poll_interval: Duration::from_secs(settings.meeting_poll_seconds.max(1)),
            lookahead: settings.lookahead(),
        };

        Ok(MeetingWatcher::new(loader, clock, config))
    }

    fn require_note(&self, note_id: &str) -> AppResult<Note> {
        self.get_note(note_id)?
            .ok_or_else(|| AppError::NotFound(format!("Note {} not found", note_id)))
    }

    fn rewrite_note(&self, note_id: &str, edit: impl FnOnce(&str) -> String) -> AppResult<Note> {
        let note = self.require_note(note_id)?;
        let content = edit(&note.content);
        if content == note.content {
            return Ok(note);
        }
        store::note_update(&self.workspace_root, note_id, &content)
    }
}
