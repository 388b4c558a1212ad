//! Semantic color palette for terminal output.
//!
//! Uses owo-colors for zero-allocation terminal coloring. Every helper
//! degrades to plain text when colors are disabled.

use kubegate_rbac::Severity;
use owo_colors::{OwoColorize, Style};

/// Returns the style for success messages (green bold).
pub fn success_style() -> Style {
    Style::new().green().bold()
}

/// Returns the style for error messages (red bold).
pub fn error_style() -> Style {
    Style::new().red().bold()
}

/// Returns the style for warning messages (yellow).
pub fn warning_style() -> Style {
    Style::new().yellow()
}

/// Returns the style for informational messages (cyan).
pub fn info_style() -> Style {
    Style::new().cyan()
}

/// Returns the style for muted/secondary text (dimmed).
pub fn muted_style() -> Style {
    Style::new().dimmed()
}

/// Returns the style for headers (bold).
pub fn header_style() -> Style {
    Style::new().bold()
}

/// Returns the style for a finding severity.
pub fn severity_style(severity: Severity) -> Style {
    match severity {
        Severity::Critical => error_style(),
        Severity::Warning => warning_style(),
        Severity::Info => info_style(),
    }
}

fn paint<T: std::fmt::Display + ?Sized>(value: &T, style: Style) -> String {
    if super::no_color() {
        value.to_string()
    } else {
        value.style(style).to_string()
    }
}

/// Trait extension to apply semantic styles.
pub trait SemanticStyle: std::fmt::Display {
    /// Apply success styling (green bold).
    fn success(&self) -> String {
        paint(self, success_style())
    }
    /// Apply error styling (red bold).
    fn error(&self) -> String {
        paint(self, error_style())
    }
    /// Apply warning styling (yellow).
    fn warning(&self) -> String {
        paint(self, warning_style())
    }
    /// Apply info styling (cyan).
    fn info(&self) -> String {
        paint(self, info_style())
    }
    /// Apply muted styling (dimmed).
    fn muted(&self) -> String {
        paint(self, muted_style())
    }
    /// Apply header styling (bold).
    fn header(&self) -> String {
        paint(self, header_style())
    }
}

impl<T: std::fmt::Display + ?Sized> SemanticStyle for T {}

/// Renders a severity label in its color.
pub fn paint_severity(severity: Severity) -> String {
    paint(&severity, severity_style(severity))
}
