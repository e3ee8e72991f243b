//! Derived views: cleaner selector, management lists, and the week grid.
//!
//! Views are rebuilt from scratch on every sync from the cached collections;
//! nothing here is incremental.

use chrono::Datelike;

use crate::model::{Cleaner, CleanerId, Task, TaskId, Weekday};
use crate::session::Session;

/// Label of the selector's placeholder option when no cleaners exist.
pub const NO_CLEANERS_PLACEHOLDER: &str = "No cleaners available";

/// One entry of the cleaner selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorOption {
    /// `None` for the placeholder.
    pub value: Option<CleanerId>,
    pub label: String,
    pub disabled: bool,
}

/// Cleaner picker used by the add-task action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorView {
    pub options: Vec<SelectorOption>,
    pub add_task_enabled: bool,
}

impl SelectorView {
    pub fn derive(cleaners: &[Cleaner]) -> Self {
        if cleaners.is_empty() {
            return Self {
                options: vec![SelectorOption {
                    value: None,
                    label: NO_CLEANERS_PLACEHOLDER.to_string(),
                    disabled: true,
                }],
                add_task_enabled: false,
            };
        }

        Self {
            options: cleaners
                .iter()
                .map(|c| SelectorOption {
                    value: Some(c.id),
                    label: c.name.clone(),
                    disabled: false,
                })
                .collect(),
            add_task_enabled: true,
        }
    }
}

/// Row of the task management list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEntry {
    pub id: TaskId,
    /// `"<task> (<cleaner>, <day>)"`.
    pub label: String,
}

/// Flat admin lists with delete affordances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagementView {
    /// Management lists are only shown to admins.
    pub admin_visible: bool,
    pub cleaners: Vec<Cleaner>,
    pub tasks: Vec<TaskEntry>,
}

impl ManagementView {
    pub fn derive(session: &Session, cleaners: &[Cleaner], tasks: &[Task]) -> Self {
        Self {
            admin_visible: session.is_admin(),
            cleaners: cleaners.to_vec(),
            tasks: tasks
                .iter()
                .map(|t| TaskEntry {
                    id: t.id,
                    label: format!("{} ({}, {})", t.task, t.cleaner, t.day),
                })
                .collect(),
        }
    }
}

/// A task as shown inside a grid cell, with its completion toggle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridTask {
    pub id: TaskId,
    pub description: String,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridRow {
    pub cleaner: Cleaner,
    /// One cell per weekday, Monday first.
    pub cells: [Vec<GridTask>; 7],
}

impl GridRow {
    pub fn cell(&self, day: Weekday) -> &[GridTask] {
        &self.cells[day.index()]
    }
}

/// One row per visible cleaner, one column per weekday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekGrid {
    pub columns: [Weekday; 7],
    /// Column to highlight as today.
    pub current_day: Option<usize>,
    pub rows: Vec<GridRow>,
}

impl WeekGrid {
    pub fn derive(session: &Session, cleaners: &[Cleaner], tasks: &[Task], today: &str) -> Self {
        let rows = cleaners
            .iter()
            .filter(|c| session.is_visible(c))
            .map(|cleaner| GridRow {
                cleaner: cleaner.clone(),
                cells: Weekday::ALL.map(|day| {
                    // Joined on the denormalized name; unmatched tasks are dropped.
                    tasks
                        .iter()
                        .filter(|t| t.cleaner == cleaner.name && t.day == day)
                        .map(|t| GridTask {
                            id: t.id,
                            description: t.task.clone(),
                            completed: t.completed,
                        })
                        .collect()
                }),
            })
            .collect();

        Self {
            columns: Weekday::ALL,
            current_day: current_day_index(today),
            rows,
        }
    }

    pub fn row_for(&self, cleaner_name: &str) -> Option<&GridRow> {
        self.rows.iter().find(|r| r.cleaner.name == cleaner_name)
    }
}

/// Everything the renderer draws after a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Views {
    pub selector: SelectorView,
    pub management: ManagementView,
    pub grid: WeekGrid,
}

impl Views {
    pub fn derive(session: &Session, cleaners: &[Cleaner], tasks: &[Task], today: &str) -> Self {
        Self {
            selector: SelectorView::derive(cleaners),
            management: ManagementView::derive(session, cleaners, tasks),
            grid: WeekGrid::derive(session, cleaners, tasks, today),
        }
    }
}

/// Column index of `day_name` in the Monday-first sequence, if it is one.
pub fn current_day_index(day_name: &str) -> Option<usize> {
    Weekday::from_name(day_name).map(Weekday::index)
}

/// English name of today's weekday in the local time zone.
pub fn local_day_name() -> &'static str {
    Weekday::from(chrono::Local::now().weekday()).name()
}
