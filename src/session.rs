//! Session state: the single logged-in user and the role-based scoping rules.

use tracing::{info, warn};

use crate::model::{Cleaner, CleanerId, User};

/// Holds at most one authenticated user.
#[derive(Debug, Clone, Default)]
pub struct Session {
    user: Option<User>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session for `user`, replacing any previous one.
    pub fn begin(&mut self, user: User) {
        if let Some(prev) = &self.user {
            warn!(previous = %prev.name, next = %user.name, "Replacing active session");
        }
        info!(
            user = %user.name,
            is_admin = user.is_admin,
            cleaner_id = ?user.cleaner_id,
            "Session started"
        );
        self.user = Some(user);
    }

    pub fn end(&mut self) {
        if let Some(user) = self.user.take() {
            info!(user = %user.name, "Session ended");
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.is_admin)
    }

    /// Cleaner id to scope task fetches by. `None` means "all tasks".
    pub fn task_scope(&self) -> Option<CleanerId> {
        match &self.user {
            Some(user) if !user.is_admin => user.cleaner_id,
            _ => None,
        }
    }

    /// Whether `cleaner`'s row belongs in the week grid for this session.
    ///
    /// Admins and sessionless renders see every row; a non-admin sees only
    /// the cleaner they are linked to.
    pub fn is_visible(&self, cleaner: &Cleaner) -> bool {
        match &self.user {
            Some(user) if !user.is_admin => user.cleaner_id == Some(cleaner.id),
            _ => true,
        }
    }
}
