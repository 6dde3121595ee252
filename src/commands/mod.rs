use indicatif::{ProgressBar, ProgressStyle};

pub mod add;
pub mod api;
pub mod cards;
pub mod config;
pub mod groups;
pub mod stats;
pub mod study;
pub mod translate;

/// Create a spinner for indeterminate progress
pub(crate) fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}
