//! Utility functions for the CLI.

use indicatif::{ProgressBar, ProgressStyle};
use srpack_repack::Progress;
use tracing_subscriber::EnvFilter;

/// Install the log subscriber; `RUST_LOG` overrides the level.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Create a progress bar with standard styling.
pub fn create_progress_bar(enable: bool) -> ProgressBar {
    if !enable {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░ ");
    pb.set_style(style);
    pb
}

/// Reflect an engine event on the progress bar.
pub fn update_progress(pb: &ProgressBar, event: Progress) {
    match event {
        Progress::Stage(stage) => pb.set_message(stage.to_string()),
        Progress::SegmentDone { id, index, total } => {
            pb.set_length(total as u64);
            pb.set_position(index as u64 + 1);
            pb.set_message(format!("segment {}", id));
        }
    }
}
