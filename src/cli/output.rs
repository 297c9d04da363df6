//! CLI output formatting

use crate::core::Step;
use crate::host::{Diagnostic, HostError};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Spinner shown while a pipeline builds
pub fn create_spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Heading printed above the step listing
pub fn format_loaded_banner(pipeline: &str) -> String {
    format!("Loaded Pipeline: {}, please enter a step to run:", pipeline)
}

/// One line of the step listing: `[index]\t name`
pub fn format_step_line(index: usize, step: &Step) -> String {
    format!("[{}]\t {}", index, step.name())
}

pub fn format_build_success() -> String {
    format!("{} {}", CHECK, style("Compilation success!").green())
}

pub fn format_build_failure() -> String {
    format!("{} {}", CROSS, style("Compilation failed!").red())
}

/// Human-readable report of a failed build, one line per diagnostic or
/// missing reference
pub fn format_build_error(err: &HostError) -> String {
    match err {
        HostError::Compile { diagnostics, .. } => diagnostics
            .iter()
            .map(format_diagnostic)
            .collect::<Vec<_>>()
            .join("\n"),
        HostError::ReferenceMissing { paths, .. } => paths
            .iter()
            .map(|p| {
                format!(
                    "  {} Missing reference: {}",
                    WARN,
                    style(p.display()).yellow()
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => format!("  {}", style(other).red()),
    }
}

pub fn format_diagnostic(diagnostic: &Diagnostic) -> String {
    format!("  {}", style(diagnostic).red())
}

/// Line printed when a step halts the run
pub fn format_step_failure(name: &str, index: usize) -> String {
    format!("{} Step {} ({}) failed.", CROSS, style(name).red(), index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_loaded_banner_names_pipeline() {
        assert_eq!(
            format_loaded_banner("nightly"),
            "Loaded Pipeline: nightly, please enter a step to run:"
        );
    }

    #[test]
    fn test_format_step_line() {
        let step = Step::new("load_users", |_| Ok(true));
        assert_eq!(format_step_line(3, &step), "[3]\t load_users");
    }

    #[test]
    fn test_build_error_lists_every_missing_reference() {
        let err = HostError::ReferenceMissing {
            pipeline: "nightly".to_string(),
            paths: vec![PathBuf::from("/a/libone.so"), PathBuf::from("/a/libtwo.so")],
        };

        let report = console::strip_ansi_codes(&format_build_error(&err)).into_owned();
        assert_eq!(report.lines().count(), 2);
        assert!(report.contains("/a/libone.so"));
        assert!(report.contains("/a/libtwo.so"));
    }

    #[test]
    fn test_step_failure_line() {
        let line = console::strip_ansi_codes(&format_step_failure("load_users", 2)).into_owned();
        assert!(line.ends_with("Step load_users (2) failed."));
    }
}
