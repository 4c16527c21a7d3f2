//! Formatting utilities for CLI output.

use crate::{
    dispatch::Notification,
    snapshot_store::{Op, OpKind},
};

/// ANSI color codes for terminal output
pub struct Colors;

impl Colors {
    /// Reset all formatting
    pub const RESET: &'static str = "\x1b[0m";
    /// Bold text
    pub const BOLD: &'static str = "\x1b[1m";
    /// Dim text
    pub const DIM: &'static str = "\x1b[2m";

    /// Red color
    pub const RED: &'static str = "\x1b[31m";
    /// Green color
    pub const GREEN: &'static str = "\x1b[32m";
    /// Yellow color
    pub const YELLOW: &'static str = "\x1b[33m";
}

/// Formats error messages with red styling
pub fn format_error(text: &str) -> String {
    format!("{}{}{}{}", Colors::BOLD, Colors::RED, text, Colors::RESET)
}

/// Formats one change as a single line.
///
/// Deletions are shown as `- key (was value)`, updates as `~ key = value`
/// and creations as `+ key = value`.
///
/// ```
/// use props::{cli::formatting::format_op, snapshot_store::Op};
///
/// let line = format_op(&Op::update("server.port", "8080"));
/// assert!(line.contains("server.port"));
/// assert!(line.contains("8080"));
/// ```
pub fn format_op<V: std::fmt::Display>(op: &Op<V>) -> String {
    match op.kind {
        OpKind::Delete => format!(
            "{}-{} {} {}(was {}){}",
            Colors::RED,
            Colors::RESET,
            op.key,
            Colors::DIM,
            op.value,
            Colors::RESET
        ),
        OpKind::Update => format!(
            "{}~{} {} = {}",
            Colors::YELLOW,
            Colors::RESET,
            op.key,
            op.value
        ),
        OpKind::Create => format!(
            "{}+{} {} = {}",
            Colors::GREEN,
            Colors::RESET,
            op.key,
            op.value
        ),
    }
}

/// Formats a delivered notification with its generation.
pub fn format_notification<V: std::fmt::Display>(notification: &Notification<V>) -> String {
    format!(
        "{}[{}]{} {}",
        Colors::DIM,
        notification.generation,
        Colors::RESET,
        format_op(&notification.op)
    )
}
