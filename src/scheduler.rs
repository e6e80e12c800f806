use crate::errors::AppResult;
use crate::meetings::{evaluate_meetings, meeting_window, resolve_local};
use crate::models::{MeetingEvent, MeetingSnapshot, Note};
use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Duration;

const MIN_WAKE: Duration = Duration::from_secs(1);

pub type NotesLoader = Arc<dyn Fn() -> AppResult<Vec<Note>> + Send + Sync>;
pub type Clock = Arc<dyn Fn() -> DateTime<Tz> + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct WatcherConfig {
    pub poll_interval: Duration,
    pub lookahead: chrono::Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            lookahead: chrono::Duration::minutes(15),
        }
    }
}

/// Periodically re-evaluates meeting state and reports transitions over a
/// channel.
#[derive(Clone)]
pub struct MeetingWatcher {
    loader: NotesLoader,
    clock: Clock,
    config: WatcherConfig,
    last: Arc<Mutex<Option<MeetingSnapshot>>>,
    notify: Arc<Notify>,
    stopped: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<MeetingEvent>,
}

impl MeetingWatcher {
    pub fn new(
        loader: NotesLoader,
        clock: Clock,
        config: WatcherConfig,
    ) -> (Self, mpsc::UnboundedReceiver<MeetingEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let watcher = Self {
            loader,
            clock,
            config,
            last: Arc::new(Mutex::new(None)),
            notify: Arc::new(Notify::new()),
            stopped: Arc::new(AtomicBool::new(false)),
            events,
        };
        (watcher, receiver)
    }

    pub fn start(&self) -> JoinHandle<()> {
        let watcher = self.clone();
        tokio::spawn(async move {
            watcher.run_loop().await;
        })
    }

    pub fn refresh(&self) {
        self.notify.notify_one();
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub async fn last_snapshot(&self) -> Option<MeetingSnapshot> {
        self.last.lock().await.clone()
    }

    /// Evaluates once and sends any transitions. Returns `None` when the
    /// notes could not be loaded.
    pub async fn tick(&self) -> Option<MeetingSnapshot> {
        let loader = self.loader.clone();
        let loaded = match tokio::task::spawn_blocking(move || loader()).await {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(error = %error, "meeting watcher loader task failed");
                return None;
            }
        };
        let notes = match loaded {
            Ok(notes) => notes,
            Err(error) => {
                tracing::warn!(error = %error, "meeting watcher could not load notes; skipping tick");
                return None;
            }
        };

        let now = (self.clock)();
        let snapshot = evaluate_meetings(&notes, &now, self.config.lookahead);

        let mut last = self.last.lock().await;
        let transitions = diff_snapshots(last.as_ref(), &snapshot);
        tracing::debug!(
            notes = notes.len(),
            transitions = transitions.len(),
            evaluated_at = %snapshot.evaluated_at,
            "meeting state evaluated"
        );
        for event in transitions {
            if self.events.send(event).is_err() {
                tracing::debug!("meeting event receiver dropped; stopping watcher");
                self.stopped.store(true, Ordering::SeqCst);
                break;
            }
        }
        *last = Some(snapshot.clone());
        Some(snapshot)
    }

    async fn run_loop(self) {
        while !self.is_stopped() {
            let delay = match self.tick().await {
                Some(snapshot) => next_wake(&snapshot, &(self.clock)(), self.config.poll_interval),
                None => self.config.poll_interval,
            };
            if self.is_stopped() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.notify.notified() => {}
            }
        }
        tracing::info!("meeting watcher stopped");
    }
}

/// Transitions between two evaluations. A missing previous snapshot counts
/// as "nothing known yet".
pub fn diff_snapshots(prev: Option<&MeetingSnapshot>, next: &MeetingSnapshot) -> Vec<MeetingEvent> {
    let mut events = Vec::new();

    let prev_ongoing = prev.and_then(|snapshot| snapshot.ongoing.as_ref());
    let prev_ongoing_id = prev_ongoing.map(|meeting| meeting.id.as_str());
    let next_ongoing_id = next.ongoing.as_ref().map(|meeting| meeting.id.as_str());
    if prev_ongoing_id != next_ongoing_id {
        if let Some(ended) = prev_ongoing {
            events.push(MeetingEvent::Ended { id: ended.id.clone() });
        }
        if let Some(started) = &next.ongoing {
            events.push(MeetingEvent::Started {
                meeting: started.clone(),
            });
        }
    }

    let prev_upcoming = prev.and_then(|snapshot| snapshot.upcoming.as_ref());
    if let Some(upcoming) = &next.upcoming {
        if prev_upcoming != Some(upcoming) {
            events.push(MeetingEvent::Approaching {
                meeting: upcoming.clone(),
                minutes_until: (upcoming.start_time - next.evaluated_at).num_minutes(),
            });
        }
    }

    let seen: HashSet<&str> = prev
        .map(|snapshot| snapshot.unacknowledged.iter().map(String::as_str).collect())
        .unwrap_or_default();
    events.extend(
        next.unacknowledged
            .iter()
            .filter(|id| !seen.contains(id.as_str()))
            .map(|id| MeetingEvent::NeedsAcknowledgement { id: id.clone() }),
    );

    events
}

/// Sleep until the poll interval elapses or the nearest meeting boundary
/// passes, whichever comes first. Boundaries are compared as instants, so a
/// repeated wall-clock hour does not stretch or shrink the wait.
fn next_wake<Z: TimeZone>(snapshot: &MeetingSnapshot, now: &DateTime<Z>, poll_interval: Duration) -> Duration {
    let zone = now.timezone();
    let boundaries = [
        snapshot
            .ongoing
            .as_ref()
            .and_then(|meeting| meeting_window(meeting, &zone))
            .map(|(_, end)| end),
        snapshot
            .upcoming
            .as_ref()
            .and_then(|meeting| resolve_local(&zone, &meeting.start_time)),
    ];
    boundaries
        .into_iter()
        .flatten()
        .filter_map(|boundary| boundary.signed_duration_since(now.clone()).to_std().ok())
        .map(|delay| delay.max(MIN_WAKE))
        .fold(poll_interval, Duration::min)
}
