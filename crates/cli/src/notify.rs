//! Terminal notifications for interactive commands

use ac_core::{Notifier, Severity};
use owo_colors::OwoColorize;

/// Prints notifications for the user running `ac`
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => println!("{} {}", "✓".green(), message),
            Severity::Warning => eprintln!("{} {}", "warning:".yellow().bold(), message),
            Severity::Error => eprintln!("{} {}", "error:".red().bold(), message),
        }
    }
}
