//! Output formatting: table or JSON.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! JSON uses serde.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use unilock_core::{ContactState, LockState};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Lock state label; unlocked stands out.
pub fn lock_label(state: Option<LockState>, color: bool) -> String {
    match state {
        None => "-".into(),
        Some(LockState::Unlocked) if color => "unlocked".yellow().bold().to_string(),
        Some(s) => s.to_string(),
    }
}

/// Contact state label; open stands out.
pub fn contact_label(state: Option<ContactState>, color: bool) -> String {
    match state {
        None => "-".into(),
        Some(ContactState::Open) if color => "open".cyan().bold().to_string(),
        Some(s) => s.to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, since single-item views are not tables.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize + ?Sized,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

pub(crate) fn render_json<T: serde::Serialize + ?Sized>(
    data: &T,
    compact: bool,
) -> Result<String, CliError> {
    let rendered = if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(rendered)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(serde::Serialize, Tabled)]
    struct Row {
        id: String,
    }

    #[test]
    fn labels_without_color_are_plain() {
        assert_eq!(lock_label(Some(LockState::Unlocked), false), "unlocked");
        assert_eq!(contact_label(Some(ContactState::Open), false), "open");
        assert_eq!(contact_label(None, false), "-");
    }

    #[test]
    fn list_renders_table_and_json() {
        let rows = vec![Row { id: "hub-1".into() }];
        let table = render_list(&OutputFormat::Table, &rows, |r| Row { id: r.id.clone() }).unwrap();
        assert!(table.contains("hub-1"));

        let json = render_list(&OutputFormat::JsonCompact, &rows, |r| Row { id: r.id.clone() })
            .unwrap();
        assert_eq!(json, r#"[{"id":"hub-1"}]"#);
    }
}
