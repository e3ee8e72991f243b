//! Presentation sink for derived views, plus the terminal implementation.

use std::fmt::Write as _;

use crate::view::{SelectorView, Views};

/// Where views and user-facing messages go.
pub trait Renderer: Send + Sync {
    /// Redraw everything from `views`.
    fn render(&self, views: &Views);

    /// Blocking failure message for a user action.
    fn alert(&self, message: &str);

    /// Informational message (successful deletes and the like).
    fn notify(&self, message: &str);
}

/// Renders views as plain text on stdout; messages go to stderr.
pub struct TerminalRenderer;

impl TerminalRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for TerminalRenderer {
    fn render(&self, views: &Views) {
        println!("\n{}", format_views(views));
    }

    fn alert(&self, message: &str) {
        eprintln!("⚠️  {message}");
    }

    fn notify(&self, message: &str) {
        eprintln!("✅ {message}");
    }
}

/// Text layout of a full render.
pub fn format_views(views: &Views) -> String {
    let mut out = String::new();
    let grid = &views.grid;

    let _ = writeln!(out, "WEEK");
    if grid.rows.is_empty() {
        let _ = writeln!(out, "  (no cleaners)");
    }
    for row in &grid.rows {
        let _ = writeln!(out, "  {}", row.cleaner.name);
        for (i, day) in grid.columns.iter().enumerate() {
            let marker = if grid.current_day == Some(i) { '*' } else { ' ' };
            let cell = row.cell(*day);
            if cell.is_empty() {
                let _ = writeln!(out, "  {marker} {:<10} -", day.name());
                continue;
            }
            for (j, task) in cell.iter().enumerate() {
                let label = if j == 0 { day.name() } else { "" };
                let check = if task.completed { 'x' } else { ' ' };
                let _ = writeln!(
                    out,
                    "  {marker} {label:<10} [{check}] #{} {}",
                    task.id, task.description
                );
            }
        }
    }

    let mgmt = &views.management;
    if mgmt.admin_visible {
        let _ = writeln!(out, "\nCLEANERS");
        for cleaner in &mgmt.cleaners {
            let _ = writeln!(out, "  #{} {}", cleaner.id, cleaner.name);
        }
        let _ = writeln!(out, "\nTASKS");
        for task in &mgmt.tasks {
            let _ = writeln!(out, "  #{} {}", task.id, task.label);
        }
        let _ = writeln!(out, "\n{}", format_selector(&views.selector));
    }

    out
}

fn format_selector(selector: &SelectorView) -> String {
    let options: Vec<String> = selector
        .options
        .iter()
        .map(|o| match o.value {
            Some(id) => format!("{id}={}", o.label),
            None => o.label.clone(),
        })
        .collect();
    if selector.add_task_enabled {
        format!("Add task for: {}", options.join(", "))
    } else {
        format!("Add task: disabled ({})", options.join(", "))
    }
}
