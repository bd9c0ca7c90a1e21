//! CLI presenter for output formatting

use std::io::{self, Write};

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::application::analyser::SILENCE_DB;

/// Width of the level meter in cells
const METER_WIDTH: usize = 12;

/// Presenter for CLI output formatting
pub struct Presenter {
    spinner: Option<ProgressBar>,
}

impl Presenter {
    /// Create a new presenter
    pub fn new() -> Self {
        Self { spinner: None }
    }

    /// Start a spinner with message
    pub fn start_spinner(&mut self, message: &str) {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        self.spinner = Some(spinner);
    }

    /// Update spinner message
    pub fn update_spinner(&self, message: &str) {
        if let Some(ref spinner) = self.spinner {
            spinner.set_message(message.to_string());
        }
    }

    /// Mark spinner as success and finish
    pub fn spinner_success(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✓".green(), message));
        }
    }

    /// Mark spinner as failed and finish
    pub fn spinner_fail(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✗".red(), message));
        }
    }

    /// Stop spinner without status
    pub fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    /// Print info message to stderr
    pub fn info(&self, message: &str) {
        eprintln!("{} {}", "ℹ".cyan(), message);
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        eprintln!("{} {}", "✓".green(), message);
    }

    /// Print warning message to stderr
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Output text to stdout (paths, config values)
    pub fn output(&self, text: &str) {
        println!("{}", text);
    }

    /// Prompt on stderr without a newline
    pub fn prompt(&self, text: &str) {
        eprint!("{} {}", "?".cyan(), text);
        let _ = io::stderr().flush();
    }

    /// Format recording progress, with a bar when there is a deadline
    pub fn format_progress(&self, elapsed_secs: u64, deadline_secs: Option<u64>) -> String {
        let Some(total) = deadline_secs else {
            return format!("{:>3}s", elapsed_secs);
        };

        let percent = if total > 0 {
            (elapsed_secs as f64 / total as f64 * 100.0).min(100.0)
        } else {
            100.0
        };

        let bar_width = 20;
        let filled = ((percent / 100.0) * bar_width as f64) as usize;
        let empty = bar_width - filled;

        format!(
            "[{}{}] {:>3}s / {}s",
            "█".repeat(filled).cyan(),
            "░".repeat(empty),
            elapsed_secs,
            total
        )
    }

    /// Format an input level (dBFS) as a short meter
    pub fn format_level(&self, level_db: Option<f32>) -> String {
        let db = level_db.unwrap_or(SILENCE_DB).clamp(-60.0, 0.0);
        let filled = (((db + 60.0) / 60.0) * METER_WIDTH as f32).round() as usize;
        let filled = filled.min(METER_WIDTH);
        let bar = "▮".repeat(filled);
        let bar = if db > -6.0 {
            bar.red()
        } else if db > -20.0 {
            bar.yellow()
        } else {
            bar.green()
        };
        format!("{}{} {:>4.0} dB", bar, "▯".repeat(METER_WIDTH - filled), db)
    }

    /// Show the preparation countdown
    pub fn show_preparation(&mut self, remaining_secs: u64) {
        self.start_spinner(&Self::preparation_message(remaining_secs));
    }

    pub fn update_preparation(&self, remaining_secs: u64) {
        self.update_spinner(&Self::preparation_message(remaining_secs));
    }

    fn preparation_message(remaining_secs: u64) -> String {
        format!(
            "Preparation: {}s left (Ctrl-C to start speaking now)",
            remaining_secs
        )
    }

    /// Update recording progress and level
    pub fn update_recording(
        &self,
        elapsed_secs: u64,
        deadline_secs: Option<u64>,
        level_db: Option<f32>,
    ) {
        let progress = self.format_progress(elapsed_secs, deadline_secs);
        let level = self.format_level(level_db);
        self.update_spinner(&format!("Recording {}  {}", progress, level));
    }

    /// Print a key-value pair (for config list)
    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}
