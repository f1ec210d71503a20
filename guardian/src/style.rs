//! TTY-aware color helpers for CLI output.
//!
//! Built on the [`console`] crate, which detects whether stdout/stderr is a
//! terminal and respects `NO_COLOR`.

use console::Style;

use crate::decision::DecisionStatus;

/// A `Style` targeting **stdout**.
fn out() -> Style {
    Style::new()
}

/// A `Style` targeting **stderr**.
fn err() -> Style {
    Style::new().for_stderr()
}

/// Bold text (for headers/titles).
pub fn bold(text: &str) -> String {
    out().bold().apply_to(text).to_string()
}

/// Dim / muted text.
pub fn dim(text: &str) -> String {
    out().dim().apply_to(text).to_string()
}

/// Bold cyan for labels.
pub fn header(text: &str) -> String {
    out().cyan().bold().apply_to(text).to_string()
}

/// Bold red on stderr.
pub fn err_red_bold(text: &str) -> String {
    err().red().bold().apply_to(text).to_string()
}

/// Dim on stderr.
pub fn err_dim(text: &str) -> String {
    err().dim().apply_to(text).to_string()
}

/// Bold cyan on stderr (hints).
pub fn err_cyan_bold(text: &str) -> String {
    err().cyan().bold().apply_to(text).to_string()
}

/// Colorize a decision status: green allow, red block, yellow confirm.
pub fn status(status: DecisionStatus) -> String {
    let text = status.to_string();
    let style = match status {
        DecisionStatus::Allow => out().green().bold(),
        DecisionStatus::Block => out().red().bold(),
        DecisionStatus::Confirm => out().yellow().bold(),
    };
    style.apply_to(text).to_string()
}
