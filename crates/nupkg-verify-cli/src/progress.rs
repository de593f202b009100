//! Progress bar shown while package files are inspected.

use console::Term;
use indicatif::ProgressBar;
use indicatif::ProgressState;
use indicatif::ProgressStyle;
use nupkg_verify_core::InspectionProgress;
use nupkg_verify_core::PackageEntry;
use std::fmt::Write;

/// CLI progress bar wrapper implementing `InspectionProgress`.
///
/// Displays the file count, the file being inspected and an ETA when
/// running in a TTY. Automatically cleans up on drop.
pub struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    /// Creates a progress bar; its length is set once the package is open.
    #[must_use]
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new(0);

        // "Inspecting [████████░░░░] 12/25 files (3s) lib\net45\A.dll"
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix} [{bar:40.cyan/blue}] {pos}/{len} files ({eta}) {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .with_key("eta", |state: &ProgressState, w: &mut dyn Write| {
                    write!(w, "{}", humanize_duration(state.eta())).unwrap_or(());
                })
                .progress_chars("█▓░"),
        );
        bar.set_prefix(message.to_string());

        Self { bar }
    }

    /// Checks if we should show progress (TTY detection).
    #[must_use]
    pub fn should_show() -> bool {
        Term::stdout().is_term()
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

impl InspectionProgress for CliProgress {
    fn on_start(&mut self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn on_entry_start(&mut self, path: &str, _current: usize, _total: usize) {
        self.bar.set_message(path.to_string());
    }

    fn on_entry_complete(&mut self, _entry: &PackageEntry) {
        self.bar.inc(1);
    }

    fn on_complete(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Converts duration to human-readable format.
fn humanize_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h{}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}
