//! Chore data model: users, cleaners, tasks, weekdays, and wire bodies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Server-assigned cleaner identifier.
pub type CleanerId = i64;

/// Server-assigned task identifier.
pub type TaskId = i64;

/// Day of the week a task is scheduled on.
///
/// Serialized with the exact capitalized English name (`"Monday"`), which is
/// also what the backend stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    /// Column order of the week grid.
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    /// Zero-based column index, Monday first.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
            Self::Saturday => "Saturday",
            Self::Sunday => "Sunday",
        }
    }

    /// Exact-case lookup, as used for matching wall-clock day names.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.name() == name)
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Case-insensitive parse for user input; accepts three-letter abbreviations.
impl FromStr for Weekday {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|d| {
                let name = d.name().to_ascii_lowercase();
                name == lower || (lower.len() == 3 && name.starts_with(&lower))
            })
            .ok_or_else(|| format!("unknown weekday: {s}"))
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Self::Monday,
            chrono::Weekday::Tue => Self::Tuesday,
            chrono::Weekday::Wed => Self::Wednesday,
            chrono::Weekday::Thu => Self::Thursday,
            chrono::Weekday::Fri => Self::Friday,
            chrono::Weekday::Sat => Self::Saturday,
            chrono::Weekday::Sun => Self::Sunday,
        }
    }
}

/// A person who performs chores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cleaner {
    pub id: CleanerId,
    pub name: String,
}

/// A chore assigned to one cleaner on one weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Denormalized cleaner name; the week grid joins on this, not on an id.
    pub cleaner: String,
    pub day: Weekday,
    /// Free-text description.
    pub task: String,
    #[serde(default)]
    pub completed: bool,
}

/// The logged-in user. Lives only for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub authenticated: bool,
    pub is_admin: bool,
    /// The cleaner a non-admin user is linked to.
    pub cleaner_id: Option<CleanerId>,
}

impl User {
    pub fn admin(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            authenticated: true,
            is_admin: true,
            cleaner_id: None,
        }
    }

    pub fn cleaner(name: impl Into<String>, cleaner_id: CleanerId) -> Self {
        Self {
            name: name.into(),
            authenticated: true,
            is_admin: false,
            cleaner_id: Some(cleaner_id),
        }
    }
}

/// Body returned by `POST /api/authenticate`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub is_admin: bool,
    #[serde(default)]
    pub cleaner_id: Option<CleanerId>,
    #[serde(default)]
    pub message: Option<String>,
}

impl AuthResponse {
    pub fn into_user(self, name: impl Into<String>) -> User {
        User {
            name: name.into(),
            authenticated: true,
            is_admin: self.is_admin,
            cleaner_id: if self.is_admin { None } else { self.cleaner_id },
        }
    }
}

/// Result of a create call: the backend either echoes the record or only
/// acknowledges with a message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Created<T> {
    Record(T),
    Acknowledged { message: String },
}

impl<T> Created<T> {
    pub fn record(&self) -> Option<&T> {
        match self {
            Self::Record(r) => Some(r),
            Self::Acknowledged { .. } => None,
        }
    }
}

/// `POST /api/cleaners` body.
#[derive(Debug, Clone, Serialize)]
pub struct NewCleaner<'a> {
    pub name: &'a str,
}

/// `POST /api/tasks` body.
#[derive(Debug, Clone, Serialize)]
pub struct NewTask<'a> {
    pub cleaner_id: CleanerId,
    pub day: Weekday,
    pub task: &'a str,
}

/// `PUT /api/tasks` body.
#[derive(Debug, Clone, Serialize)]
pub struct TaskCompletion {
    pub id: TaskId,
    pub completed: bool,
}

/// `GET /api/ip` body.
#[derive(Debug, Clone, Deserialize)]
pub struct IpResponse {
    pub ip: String,
}

/// Error body the backend attaches to non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
