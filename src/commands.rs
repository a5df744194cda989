//! Subcommands that run without the terminal UI. They share the stored
//! session and theme with it and print to `out`.

use crate::api::TaskApi;
use crate::error::{ClientError, Result};
use crate::storage::ClientStorage;
use crate::task::{count_summary, filter_tasks, Filter, Task};
use crate::theme::Theme;
use crate::ui::sanitize;
use std::io::Write;
use tracing::info;

fn task_line(task: &Task) -> String {
    format!(
        "[{}] {}  ({})",
        if task.completed { "x" } else { " " },
        sanitize(&task.text),
        task.id
    )
}

/// Prints the tasks matching `filter`, then the count line.
pub async fn list_tasks<W: Write>(
    api: &dyn TaskApi,
    storage: &ClientStorage,
    filter: Filter,
    out: &mut W,
) -> Result<()> {
    let session = storage.load_session();
    let token = session.token().ok_or(ClientError::NotSignedIn)?;
    let tasks = api.list(token).await?;
    for task in filter_tasks(&tasks, filter) {
        writeln!(out, "{}", task_line(task))?;
    }
    writeln!(out, "{}", count_summary(&tasks, filter))?;
    Ok(())
}

pub async fn add_task<W: Write>(
    api: &dyn TaskApi,
    storage: &ClientStorage,
    text: &str,
    out: &mut W,
) -> Result<Task> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ClientError::EmptyTask);
    }
    let session = storage.load_session();
    let token = session.token().ok_or(ClientError::NotSignedIn)?;
    let task = api.create(token, text).await?;
    info!(id = %task.id, "task added");
    writeln!(out, "Added {}", task_line(&task))?;
    Ok(task)
}

pub fn logout<W: Write>(storage: &mut ClientStorage, out: &mut W) -> Result<()> {
    storage.clear_session()?;
    info!("signed out");
    writeln!(out, "Signed out.")?;
    Ok(())
}

pub fn toggle_theme<W: Write>(storage: &mut ClientStorage, out: &mut W) -> Result<Theme> {
    let theme = storage.load_theme().toggle();
    storage.save_theme(theme)?;
    writeln!(out, "Theme: {}", theme.as_str())?;
    Ok(theme)
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
