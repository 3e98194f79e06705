use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::{LibraryError, Result};

/// How long a monitor may stay suspended before the safety timer force
/// resumes it.
const DEFAULT_RESTART_AFTER: Duration = Duration::from_secs(300);

struct MonitorState {
    watcher: Option<RecommendedWatcher>,
    paths: Vec<PathBuf>,
    suspend_count: usize,
    /// Bumped on every suspend so stale safety timers can recognize
    /// themselves.
    generation: u64,
}

/// Reference-counted start/stop gate around the real-time filesystem
/// watcher.
///
/// Overlapping validation passes each suspend and resume the monitor; the
/// request counter guarantees the watcher only restarts when the last
/// suspender releases, and a safety timer force-resumes a monitor a crashed
/// caller left suspended.
pub struct LibraryMonitor {
    state: Mutex<MonitorState>,
    events_tx: mpsc::UnboundedSender<PathBuf>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<PathBuf>>>,
    restart_after: Duration,
}

impl std::fmt::Debug for LibraryMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("LibraryMonitor")
            .field("watching", &state.watcher.is_some())
            .field("suspend_count", &state.suspend_count)
            .field("paths", &state.paths)
            .finish()
    }
}

impl LibraryMonitor {
    pub fn new() -> Self {
        Self::with_restart_after(DEFAULT_RESTART_AFTER)
    }

    pub fn with_restart_after(restart_after: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            state: Mutex::new(MonitorState {
                watcher: None,
                paths: Vec::new(),
                suspend_count: 0,
                generation: 0,
            }),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            restart_after,
        }
    }

    /// Take the change-event stream. Yields the affected path for every
    /// create/modify/remove the watcher reports.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<PathBuf>> {
        self.events_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Start watching the given paths.
    pub fn start(&self, paths: Vec<PathBuf>) -> Result<()> {
        let mut state = self.lock_state();
        state.paths = paths;
        if state.suspend_count == 0 {
            Self::spawn_watcher(&mut state, &self.events_tx)?;
            info!(paths = state.paths.len(), "library monitor started");
        }
        Ok(())
    }

    /// Stop watching entirely and reset the suspend counter.
    pub fn stop(&self) {
        let mut state = self.lock_state();
        state.watcher = None;
        state.paths.clear();
        state.suspend_count = 0;
        info!("library monitor stopped");
    }

    pub fn is_watching(&self) -> bool {
        self.lock_state().watcher.is_some()
    }

    pub fn suspend_count(&self) -> usize {
        self.lock_state().suspend_count
    }

    /// Suspend real-time monitoring; each call must be paired with a
    /// [`resume`](Self::resume). Prefer [`suspend_guard`](Self::suspend_guard).
    pub fn suspend(self: &Arc<Self>) {
        let generation = {
            let mut state = self.lock_state();
            state.suspend_count += 1;
            state.generation += 1;
            if state.suspend_count == 1 {
                state.watcher = None;
                debug!("library monitor suspended");
            }
            state.generation
        };

        // Safety net: a caller that never resumes must not leave the
        // library permanently unmonitored.
        let monitor = Arc::clone(self);
        let restart_after = self.restart_after;
        tokio::spawn(async move {
            tokio::time::sleep(restart_after).await;
            monitor.force_resume_if_stale(generation);
        });
    }

    /// Release one suspension; the watcher restarts when the last suspender
    /// releases.
    pub fn resume(&self) {
        let mut state = self.lock_state();
        if state.suspend_count == 0 {
            return;
        }
        state.suspend_count -= 1;
        if state.suspend_count == 0 && !state.paths.is_empty() {
            if let Err(err) = Self::spawn_watcher(&mut state, &self.events_tx) {
                error!(error = %err, "failed to restart library monitor");
            } else {
                debug!("library monitor resumed");
            }
        }
    }

    /// RAII suspension: the monitor resumes when the guard drops, however
    /// the scoped work exits.
    pub fn suspend_guard(self: &Arc<Self>) -> MonitorSuspendGuard {
        self.suspend();
        MonitorSuspendGuard {
            monitor: Arc::clone(self),
        }
    }

    fn force_resume_if_stale(&self, generation: u64) {
        let mut state = self.lock_state();
        if state.suspend_count == 0 || state.generation != generation {
            return;
        }
        warn!("library monitor left suspended past deadline; force resuming");
        state.suspend_count = 0;
        if !state.paths.is_empty() {
            if let Err(err) = Self::spawn_watcher(&mut state, &self.events_tx) {
                error!(error = %err, "failed to force-restart library monitor");
            }
        }
    }

    fn spawn_watcher(
        state: &mut MonitorState,
        events_tx: &mpsc::UnboundedSender<PathBuf>,
    ) -> Result<()> {
        let tx = events_tx.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    for path in event.paths {
                        let _ = tx.send(path);
                    }
                }
                Err(err) => error!(error = %err, "filesystem watch error"),
            },
            Config::default(),
        )
        .map_err(|err| {
            LibraryError::Internal(format!("failed to create watcher: {err}"))
        })?;

        for path in &state.paths {
            match watcher.watch(path, RecursiveMode::Recursive) {
                Ok(()) => debug!(path = %path.display(), "watching path"),
                Err(err) => {
                    // Partial watching is permitted; a missing mount must
                    // not take down the rest.
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to watch path"
                    );
                }
            }
        }
        state.watcher = Some(watcher);
        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, MonitorState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for LibraryMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Resumes the monitor on drop.
#[derive(Debug)]
pub struct MonitorSuspendGuard {
    monitor: Arc<LibraryMonitor>,
}

impl Drop for MonitorSuspendGuard {
    fn drop(&mut self) {
        self.monitor.resume();
    }
}
