//! Interactive commands for the terminal front-end.

use crate::model::{CleanerId, TaskId, Weekday};

pub const HELP: &str = "\
Commands:
  show                                   redraw the current views
  refresh                                refetch everything from the server
  done <task_id>                         mark a task completed
  undo <task_id>                         mark a task not completed
  qr                                     print the QR code URL for this board
  help                                   show this help
  quit                                   exit
Admin only:
  add-cleaner <name>                     add a cleaner
  rm-cleaner [-y] <cleaner_id>           delete a cleaner and all their tasks
  add-task <cleaner_id> <day> <text...>  add a task
  rm-task [-y] <task_id>                 delete a task";

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Show,
    Refresh,
    AddCleaner { name: String },
    RemoveCleaner { id: CleanerId, confirmed: bool },
    AddTask {
        cleaner_id: CleanerId,
        day: Weekday,
        description: String,
    },
    RemoveTask { id: TaskId, confirmed: bool },
    SetCompleted { id: TaskId, completed: bool },
    Qr,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. Returns a usage message on error.
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let verb = verb.trim_start_matches('/').to_ascii_lowercase();
        match verb.as_str() {
            "show" | "ls" => Ok(Self::Show),
            "refresh" => Ok(Self::Refresh),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            "qr" => Ok(Self::Qr),
            "add-cleaner" => {
                if rest.is_empty() {
                    return Err("usage: add-cleaner <name>".into());
                }
                Ok(Self::AddCleaner {
                    name: rest.to_string(),
                })
            }
            "rm-cleaner" => {
                let (confirmed, id) = parse_confirmed_id(rest, "usage: rm-cleaner [-y] <cleaner_id>")?;
                Ok(Self::RemoveCleaner { id, confirmed })
            }
            "rm-task" => {
                let (confirmed, id) = parse_confirmed_id(rest, "usage: rm-task [-y] <task_id>")?;
                Ok(Self::RemoveTask { id, confirmed })
            }
            "add-task" => {
                let usage = "usage: add-task <cleaner_id> <day> <description>";
                let mut parts = rest.splitn(3, char::is_whitespace);
                let cleaner_id = parts
                    .next()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| usage.to_string())?;
                let day = parts
                    .next()
                    .ok_or_else(|| usage.to_string())?
                    .parse::<Weekday>()?;
                let description = parts.next().map(str::trim).unwrap_or_default();
                if description.is_empty() {
                    return Err(usage.into());
                }
                Ok(Self::AddTask {
                    cleaner_id,
                    day,
                    description: description.to_string(),
                })
            }
            "done" | "undo" => {
                let id = rest
                    .parse()
                    .map_err(|_| format!("usage: {verb} <task_id>"))?;
                Ok(Self::SetCompleted {
                    id,
                    completed: verb == "done",
                })
            }
            "" => Err("empty command".into()),
            other => Err(format!("unknown command: {other} (try 'help')")),
        }
    }

    /// Commands hidden from non-admin sessions.
    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            Self::AddCleaner { .. }
                | Self::RemoveCleaner { .. }
                | Self::AddTask { .. }
                | Self::RemoveTask { .. }
        )
    }

    /// Question to ask before running, for unconfirmed deletes.
    pub fn confirmation_prompt(&self) -> Option<&'static str> {
        match self {
            Self::RemoveCleaner { confirmed: false, .. } => {
                Some("Are you sure you want to delete this cleaner and all their tasks?")
            }
            Self::RemoveTask { confirmed: false, .. } => {
                Some("Are you sure you want to delete this task?")
            }
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Show => "show",
            Self::Refresh => "refresh",
            Self::AddCleaner { .. } => "add-cleaner",
            Self::RemoveCleaner { .. } => "rm-cleaner",
            Self::AddTask { .. } => "add-task",
            Self::RemoveTask { .. } => "rm-task",
            Self::SetCompleted { completed: true, .. } => "done",
            Self::SetCompleted { completed: false, .. } => "undo",
            Self::Qr => "qr",
            Self::Help => "help",
            Self::Quit => "quit",
        }
    }
}

fn parse_confirmed_id(rest: &str, usage: &str) -> Result<(bool, i64), String> {
    let mut confirmed = false;
    let mut id = None;
    for token in rest.split_whitespace() {
        match token {
            "-y" | "--yes" => confirmed = true,
            _ if id.is_none() => id = token.parse().ok(),
            _ => return Err(usage.to_string()),
        }
    }
    id.map(|id| (confirmed, id)).ok_or_else(|| usage.to_string())
}

/// Whether a confirmation answer means yes.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
