//! CLI console utilities

use colored::*;

/// CLI console for formatted output
#[derive(Debug, Default)]
pub struct CliConsole;

impl CliConsole {
    pub const fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", "✓".green().bold(), message.green());
    }

    pub fn warn(&self, message: &str) {
        println!("{} {}", "⚠".yellow().bold(), message.yellow());
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red().bold(), message.red());
    }

    pub fn print_header(&self, title: &str) {
        println!();
        println!("{}", title.bold().underline());
        println!("{}", "=".repeat(title.len()).dimmed());
    }

    /// Print a `label: value` line
    pub fn field(&self, label: &str, value: impl std::fmt::Display) {
        let label = format!("{:<18}", format!("{}:", label));
        println!("  {} {}", label.dimmed(), value);
    }
}
