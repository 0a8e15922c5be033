//! Output formatting

use console::{style, Style, Term};
use serde::Serialize;
use std::time::Duration;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Writes command results to stdout
#[derive(Debug)]
pub struct Reporter {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
    /// Result format
    pub format: OutputFormat,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(false, false, OutputFormat::Text)
    }
}

impl Reporter {
    /// Create a new reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool, format: OutputFormat) -> Self {
        Self {
            term: Term::stdout(),
            use_color,
            quiet,
            format,
        }
    }

    /// Whether results are emitted as JSON
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Print a value as pretty JSON
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> serde_json::Result<()> {
        let rendered = serde_json::to_string_pretty(value)?;
        let _ = self.term.write_line(&rendered);
        Ok(())
    }

    /// Print a line verbatim
    pub fn line(&self, text: &str) {
        if self.quiet {
            return;
        }
        let _ = self.term.write_line(text);
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print an indented detail line
    pub fn detail(&self, message: &str) {
        if self.quiet {
            return;
        }
        let text = if self.use_color {
            style(message).dim().to_string()
        } else {
            message.to_string()
        };
        let _ = self.term.write_line(&format!("    {text}"));
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }

        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };

        let _ = self.term.write_line("");
        let _ = self.term.write_line(&styled);
    }

    /// Print the closing tally
    pub fn summary(&self, label: &str, passed: usize, failed: usize, duration: Duration) {
        if self.quiet && failed == 0 {
            return;
        }

        let _ = self.term.write_line("");
        let total = passed + failed;
        let duration_secs = duration.as_secs_f64();

        if self.use_color {
            let passed_style = Style::new().green().bold();
            let failed_style = Style::new().red().bold();
            let status = if failed > 0 {
                failed_style.apply_to("FAILED")
            } else {
                passed_style.apply_to("PASSED")
            };
            let _ = self.term.write_line(&format!(
                "{status} {total} {label} in {duration_secs:.2}s ({} passed, {} failed)",
                passed_style.apply_to(passed),
                if failed > 0 {
                    failed_style.apply_to(failed).to_string()
                } else {
                    failed.to_string()
                },
            ));
        } else {
            let status = if failed > 0 { "FAILED" } else { "PASSED" };
            let _ = self.term.write_line(&format!(
                "{status} {total} {label} in {duration_secs:.2}s ({passed} passed, {failed} failed)"
            ));
        }
    }
}
