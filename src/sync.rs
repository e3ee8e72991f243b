//! View synchronizer: full refetch and rerender after every change.
//!
//! All refresh triggers (user actions, push notifications, startup) go through
//! [`Synchronizer::resync`]. At most one refresh runs at a time; triggers that
//! arrive while one is in flight collapse into a single follow-up refresh.

use std::sync::{Arc, Mutex};

use secrecy::SecretString;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::api::ChoreApi;
use crate::error::ApiError;
use crate::model::{Cleaner, CleanerId, Created, Task, TaskId, User, Weekday};
use crate::render::Renderer;
use crate::session::Session;
use crate::view::{Views, local_day_name};

/// Source of today's weekday name.
pub type DaySource = Arc<dyn Fn() -> String + Send + Sync>;

/// Cached collections and the views derived from them.
#[derive(Debug, Default)]
struct SyncState {
    session: Session,
    cleaners: Vec<Cleaner>,
    tasks: Vec<Task>,
    views: Option<Views>,
    refreshes: u64,
}

#[derive(Debug, Default)]
struct Flight {
    running: bool,
    pending: bool,
}

/// Releases the flight if a refresh is dropped before it finishes.
struct FlightGuard<'a> {
    flight: &'a Mutex<Flight>,
    finished: bool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut flight = self.flight.lock().unwrap_or_else(|e| e.into_inner());
        flight.running = false;
        flight.pending = false;
        debug!("Refresh cancelled, flight released");
    }
}

/// Owns the session, the cached collections, and the refresh cycle.
pub struct Synchronizer {
    api: Arc<dyn ChoreApi>,
    renderer: Arc<dyn Renderer>,
    state: RwLock<SyncState>,
    flight: Mutex<Flight>,
    day_source: DaySource,
}

impl Synchronizer {
    pub fn new(api: Arc<dyn ChoreApi>, renderer: Arc<dyn Renderer>) -> Arc<Self> {
        Self::with_day_source(api, renderer, Arc::new(|| local_day_name().to_string()))
    }

    /// Like [`Synchronizer::new`] with a custom "today" for current-day highlighting.
    pub fn with_day_source(
        api: Arc<dyn ChoreApi>,
        renderer: Arc<dyn Renderer>,
        day_source: DaySource,
    ) -> Arc<Self> {
        Arc::new(Self {
            api,
            renderer,
            state: RwLock::new(SyncState::default()),
            flight: Mutex::new(Flight::default()),
            day_source,
        })
    }

    // ── Session ─────────────────────────────────────────────────────────

    /// Authenticate and start a session. No refresh is triggered.
    pub async fn login(&self, name: &str, password: &SecretString) -> Result<User, ApiError> {
        let user = self.api.authenticate(name, password).await?;
        self.state.write().await.session.begin(user.clone());
        Ok(user)
    }

    /// Start a session for an already-authenticated user.
    pub async fn begin_session(&self, user: User) {
        self.state.write().await.session.begin(user);
    }

    pub async fn session(&self) -> Session {
        self.state.read().await.session.clone()
    }

    pub async fn is_admin(&self) -> bool {
        self.state.read().await.session.is_admin()
    }

    // ── Refresh ─────────────────────────────────────────────────────────

    /// Refetch cleaners and tasks and rerender every view.
    ///
    /// Never fails: a failed fetch renders as an empty collection.
    pub async fn resync(&self) {
        {
            let mut flight = self.lock_flight();
            if flight.running {
                flight.pending = true;
                debug!("Refresh already in flight, follow-up scheduled");
                return;
            }
            flight.running = true;
        }

        let mut guard = FlightGuard {
            flight: &self.flight,
            finished: false,
        };
        loop {
            self.refresh_once().await;
            if !self.take_pending() {
                guard.finished = true;
                break;
            }
            debug!("Running coalesced follow-up refresh");
        }
    }

    /// Clears the pending flag and reports whether it was set; marks the
    /// flight finished otherwise.
    fn take_pending(&self) -> bool {
        let mut flight = self.lock_flight();
        if flight.pending {
            flight.pending = false;
            true
        } else {
            flight.running = false;
            false
        }
    }

    fn lock_flight(&self) -> std::sync::MutexGuard<'_, Flight> {
        self.flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn refresh_once(&self) {
        let scope = self.state.read().await.session.task_scope();

        let cleaners = self.api.list_cleaners().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to fetch cleaners, rendering empty list");
            Vec::new()
        });
        let tasks = self.api.list_tasks(scope).await.unwrap_or_else(|e| {
            warn!(error = %e, scope = ?scope, "Failed to fetch tasks, rendering empty list");
            Vec::new()
        });

        let today = (self.day_source)();
        let views = {
            let mut state = self.state.write().await;
            let views = Views::derive(&state.session, &cleaners, &tasks, &today);
            state.cleaners = cleaners;
            state.tasks = tasks;
            state.views = Some(views.clone());
            state.refreshes += 1;
            info!(
                cleaners = state.cleaners.len(),
                tasks = state.tasks.len(),
                rows = views.grid.rows.len(),
                "Views refreshed"
            );
            views
        };

        self.renderer.render(&views);
    }

    /// Views from the most recent refresh.
    pub async fn views(&self) -> Option<Views> {
        self.state.read().await.views.clone()
    }

    pub async fn cleaners(&self) -> Vec<Cleaner> {
        self.state.read().await.cleaners.clone()
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.state.read().await.tasks.clone()
    }

    /// Number of completed refreshes.
    pub async fn refresh_count(&self) -> u64 {
        self.state.read().await.refreshes
    }

    // ── Actions ─────────────────────────────────────────────────────────

    pub async fn add_cleaner(&self, name: &str) -> Result<Created<Cleaner>, ApiError> {
        let result = self.api.add_cleaner(name).await;
        if result.is_ok() {
            info!(name, "Cleaner added");
        }
        self.finish_action(result, "Failed to add cleaner. Please try again.", None)
            .await
    }

    pub async fn remove_cleaner(&self, id: CleanerId) -> Result<(), ApiError> {
        let result = self.api.remove_cleaner(id).await;
        if result.is_ok() {
            info!(cleaner_id = id, "Cleaner removed");
        }
        self.finish_action(
            result,
            "Failed to delete cleaner. Please try again.",
            Some("Cleaner and tasks deleted successfully."),
        )
        .await
    }

    pub async fn add_task(
        &self,
        cleaner_id: CleanerId,
        day: Weekday,
        description: &str,
    ) -> Result<Created<Task>, ApiError> {
        let result = self.api.add_task(cleaner_id, day, description).await;
        if result.is_ok() {
            info!(cleaner_id, day = %day, "Task added");
        }
        self.finish_action(result, "Failed to add task. Please try again.", None)
            .await
    }

    pub async fn remove_task(&self, id: TaskId) -> Result<(), ApiError> {
        let result = self.api.remove_task(id).await;
        if result.is_ok() {
            info!(task_id = id, "Task removed");
        }
        self.finish_action(
            result,
            "Failed to delete task. Please try again.",
            Some("Task deleted successfully."),
        )
        .await
    }

    pub async fn set_task_completed(&self, id: TaskId, completed: bool) -> Result<(), ApiError> {
        let result = self.api.set_task_completed(id, completed).await;
        if result.is_ok() {
            info!(task_id = id, completed, "Task status updated");
        }
        self.finish_action(result, "Failed to update task status. Please try again.", None)
            .await
    }

    /// Alert without refreshing on failure; notify and refresh on success.
    async fn finish_action<T: Send>(
        &self,
        result: Result<T, ApiError>,
        failure: &str,
        success: Option<&str>,
    ) -> Result<T, ApiError> {
        match result {
            Ok(value) => {
                if let Some(message) = success {
                    self.renderer.notify(message);
                }
                self.resync().await;
                Ok(value)
            }
            Err(e) => {
                warn!(error = %e, "Action failed, skipping refresh");
                self.renderer.alert(failure);
                Err(e)
            }
        }
    }
}
