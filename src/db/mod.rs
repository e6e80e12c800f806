use crate::errors::{AppError, AppResult};
use crate::models::{AppSettings, TagRecord};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("schema.sql");

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        let db = Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        };

        db.ensure_default_settings()?;

        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn get_settings(&self) -> AppResult<AppSettings> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let raw = conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = 'app'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(serde_json::from_str::<AppSettings>(&raw).unwrap_or_default()),
            None => Ok(AppSettings::default()),
        }
    }

    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<AppSettings> {
        let current = self.get_settings()?;
        let mut merged = serde_json::to_value(current)?;
        merge_json(&mut merged, update);
        let settings: AppSettings = serde_json::from_value(merged)?;

        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        conn.execute(
            "INSERT INTO settings (key, value_json, updated_at)
             VALUES ('app', ?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![serde_json::to_string(&settings)?, Utc::now().to_rfc3339()],
        )?;

        Ok(settings)
    }

    pub fn list_tags(&self) -> AppResult<Vec<TagRecord>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let mut statement = conn.prepare("SELECT id, text, created_at FROM tags ORDER BY text COLLATE NOCASE ASC")?;
        let tags = statement
            .query_map([], parse_tag_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    /// Adds a tag, or returns the existing one with the same text ignoring
    /// case.
    pub fn add_tag(&self, text: &str) -> AppResult<TagRecord> {
        let text = require_tag_text(text)?;
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;

        let existing = conn
            .query_row(
                "SELECT id, text, created_at FROM tags WHERE text = ?1 COLLATE NOCASE",
                [text],
                parse_tag_row,
            )
            .optional()?;
        if let Some(existing) = existing {
            return Ok(existing);
        }

        let record = TagRecord {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO tags (id, text, created_at) VALUES (?1, ?2, ?3)",
            params![record.id, record.text, record.created_at.to_rfc3339()],
        )?;
        Ok(record)
    }

    pub fn rename_tag(&self, tag_id: &str, text: &str) -> AppResult<Option<TagRecord>> {
        let text = require_tag_text(text)?;
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;

        let clash: Option<String> = conn
            .query_row(
                "SELECT id FROM tags WHERE text = ?1 COLLATE NOCASE AND id != ?2",
                params![text, tag_id],
                |row| row.get(0),
            )
            .optional()?;
        if clash.is_some() {
            return Err(AppError::Invalid(format!("Tag '{}' already exists", text)));
        }

        let changed = conn.execute("UPDATE tags SET text = ?1 WHERE id = ?2", params![text, tag_id])?;
        if changed == 0 {
            return Ok(None);
        }
        let record = conn.query_row(
            "SELECT id, text, created_at FROM tags WHERE id = ?1",
            [tag_id],
            parse_tag_row,
        )?;
        Ok(Some(record))
    }

    pub fn delete_tag(&self, tag_id: &str) -> AppResult<bool> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let changed = conn.execute("DELETE FROM tags WHERE id = ?1", [tag_id])?;
        Ok(changed > 0)
    }

    pub fn record_click(&self, note_id: &str) -> AppResult<u64> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        conn.execute(
            "INSERT INTO note_clicks (note_id, count, last_clicked_at) VALUES (?1, 1, ?2)
             ON CONFLICT(note_id) DO UPDATE SET count = count + 1, last_clicked_at = excluded.last_clicked_at",
            params![note_id, Utc::now().to_rfc3339()],
        )?;
        let count: i64 = conn.query_row(
            "SELECT count FROM note_clicks WHERE note_id = ?1",
            [note_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    pub fn click_counts(&self) -> AppResult<HashMap<String, u64>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let mut statement = conn.prepare("SELECT note_id, count FROM note_clicks")?;
        let counts = statement
            .query_map([], |row| {
                let count: i64 = row.get(1)?;
                Ok((row.get::<_, String>(0)?, count.max(0) as u64))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(counts)
    }

    pub fn forget_clicks(&self, note_id: &str) -> AppResult<()> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        conn.execute("DELETE FROM note_clicks WHERE note_id = ?1", [note_id])?;
        Ok(())
    }

    fn ensure_default_settings(&self) -> AppResult<()> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let count: i64 = conn.query_row("SELECT COUNT(1) FROM settings WHERE key = 'app'", [], |row| row.get(0))?;
        if count == 0 {
            conn.execute(
                "INSERT INTO settings (key, value_json, updated_at) VALUES ('app', ?1, ?2)",
                params![
                    serde_json::to_string(&AppSettings::default())?,
                    Utc::now().to_rfc3339()
                ],
            )?;
        }
        Ok(())
    }
}

fn require_tag_text(text: &str) -> AppResult<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError::Invalid("Tag text cannot be empty".to_string()));
    }
    Ok(trimmed)
}

fn parse_tag_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TagRecord> {
    Ok(TagRecord {
        id: row.get(0)?,
        text: row.get(1)?,
        created_at: parse_time(&row.get::<_, String>(2)?)?,
    })
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
            )
        })
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(target_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}
