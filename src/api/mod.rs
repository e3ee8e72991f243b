//! Backend API access.
//!
//! [`ChoreApi`] is the seam between the synchronizer and the network: one
//! method per backend resource/verb pair. [`HttpApi`] is the production
//! implementation over `reqwest`; tests substitute in-memory stubs.
//!
//! Every method returns a `Result` so that "no data" (`Ok(vec![])`) and "the
//! call failed" (`Err`) stay distinguishable. Callers decide how to degrade.

mod http;

pub use http::{HttpApi, normalize_base_url};

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::ApiError;
use crate::model::{Cleaner, CleanerId, Created, Task, TaskId, User, Weekday};

/// Backend operations used by the chore board.
#[async_trait]
pub trait ChoreApi: Send + Sync {
    /// Ask the backend for its public base address (`GET /api/ip`).
    async fn resolve_base_url(&self) -> Result<String, ApiError>;

    /// Log in. Admins are recognized by password alone; cleaners by name.
    async fn authenticate(&self, name: &str, password: &SecretString) -> Result<User, ApiError>;

    async fn list_cleaners(&self) -> Result<Vec<Cleaner>, ApiError>;

    async fn add_cleaner(&self, name: &str) -> Result<Created<Cleaner>, ApiError>;

    /// Delete a cleaner. The backend cascades to their tasks.
    async fn remove_cleaner(&self, id: CleanerId) -> Result<(), ApiError>;

    /// List tasks, optionally scoped to one cleaner.
    async fn list_tasks(&self, scope: Option<CleanerId>) -> Result<Vec<Task>, ApiError>;

    async fn add_task(
        &self,
        cleaner_id: CleanerId,
        day: Weekday,
        description: &str,
    ) -> Result<Created<Task>, ApiError>;

    async fn remove_task(&self, id: TaskId) -> Result<(), ApiError>;

    async fn set_task_completed(&self, id: TaskId, completed: bool) -> Result<(), ApiError>;

    /// URL of the QR code image pointing at the app.
    fn qr_code_url(&self) -> String;
}
