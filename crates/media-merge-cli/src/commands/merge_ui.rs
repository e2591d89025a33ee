use indicatif::{ProgressBar, ProgressStyle};
use media_merge_core::ProgressSink;
use std::io::IsTerminal;

/// Progress sink backed by an indicatif bar
///
/// In non-interactive mode the bar stays hidden and phase changes are logged
/// instead. A hidden bar still tracks title, position and length, so the
/// reporter's push/pop state round-trips either way.
pub struct MergeUI {
    bar: ProgressBar,
    interactive: bool,
}

impl MergeUI {
    pub fn new(show: bool) -> Self {
        let interactive = show && is_interactive();
        let bar = if interactive {
            let bar = ProgressBar::new(0);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            {
                bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
            }
            bar
        } else {
            tracing::info!(
                operation = "ui_init",
                mode = "non_interactive",
                "Running in non-interactive mode - progress bar disabled, using structured logging"
            );
            ProgressBar::hidden()
        };

        Self { bar, interactive }
    }

    /// Handle for finishing the bar once the worker has handed the sink back
    pub fn bar(&self) -> ProgressBar {
        self.bar.clone()
    }
}

impl ProgressSink for MergeUI {
    fn set_title(&self, title: &str) {
        if !self.interactive && title != self.bar.message() {
            tracing::info!(operation = "progress", phase = %title, "Progress phase");
        }
        self.bar.set_message(title.to_string());
    }

    fn title(&self) -> String {
        self.bar.message()
    }

    fn set_maximum(&self, maximum: u64) {
        self.bar.set_length(maximum);
    }

    fn maximum(&self) -> u64 {
        self.bar.length().unwrap_or(0)
    }

    fn set_value(&self, value: u64) {
        self.bar.set_position(value);
    }

    fn value(&self) -> u64 {
        self.bar.position()
    }

    fn inc_progress(&self) {
        self.bar.inc(1);
    }

    fn reset_progress(&self) {
        self.bar.set_position(0);
    }
}

pub fn is_interactive() -> bool {
    std::io::stdout().is_terminal() && std::io::stderr().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_merge_core::Progress;

    #[test]
    fn test_hidden_bar_round_trips_nested_state() {
        let ui = MergeUI::new(false);
        let bar = ui.bar();
        let mut progress = Progress::new(ui);

        progress.set_title("Loading snapshots");
        progress.set_maximum(2);
        progress.inc_progress();
        progress.push_state();
        progress.reset_progress();
        progress.set_title("Loading den");
        progress.set_maximum(50);
        progress.set_value(20);
        progress.pop_state();

        assert_eq!(bar.message(), "Loading snapshots");
        assert_eq!(bar.position(), 1);
        assert_eq!(bar.length(), Some(2));
    }
}
