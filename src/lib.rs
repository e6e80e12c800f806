pub mod chronology;
pub mod db;
pub mod errors;
pub mod events;
pub mod meetings;
pub mod meta;
pub mod models;
pub mod pins;
pub mod scheduler;
pub mod search;
pub mod service;
pub mod store;
pub mod suggestions;
pub mod todos;

use crate::errors::{AppError, AppResult};
use crate::models::MeetingEvent;
use crate::service::NotesCore;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;

pub const DATA_DIR_ENV: &str = "META_NOTES_DATA_DIR";
const DEFAULT_DATA_DIR: &str = ".meta-notes";

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

pub fn resolve_data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Runs the meeting watcher against the resolved data directory until
/// Ctrl-C.
pub async fn run() -> AppResult<()> {
    let data_dir = resolve_data_dir();
    std::fs::create_dir_all(&data_dir)?;
    init_tracing(&data_dir)?;

    let core = NotesCore::new(data_dir)?;
    let (watcher, mut events) = core.meeting_watcher()?;
    let handle = watcher.start();
    tracing::info!(workspace = %core.workspace_root().to_string_lossy(), "meeting watcher started");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => log_meeting_event(&event),
                None => break,
            },
            signal = tokio::signal::ctrl_c() => {
                if let Err(error) = signal {
                    tracing::warn!(error = %error, "failed to listen for shutdown signal");
                }
                break;
            }
        }
    }

    watcher.stop();
    handle
        .await
        .map_err(|error| AppError::Internal(format!("meeting watcher task failed: {}", error)))?;
    Ok(())
}

fn log_meeting_event(event: &MeetingEvent) {
    match event {
        MeetingEvent::Started { meeting } => {
            tracing::info!(note_id = %meeting.id, description = %meeting.description, "meeting started");
        }
        MeetingEvent::Ended { id } => tracing::info!(note_id = %id, "meeting ended"),
        MeetingEvent::Approaching { meeting, minutes_until } => {
            tracing::info!(note_id = %meeting.id, minutes_until, "meeting approaching");
        }
        MeetingEvent::NeedsAcknowledgement { id } => {
            tracing::info!(note_id = %id, "meeting awaiting acknowledgement");
        }
    }
}

fn init_tracing(data_dir: &Path) -> AppResult<()> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "meta-notes.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| AppError::Internal(error.to_string()))
}
