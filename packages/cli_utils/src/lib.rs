#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the Tableau exporter.
//!
//! Provides an `indicatif`-backed export bar behind the
//! [`ProgressCallback`] trait, [`init_logger`] which sets up
//! `indicatif-log-bridge` so that `log::info!` and friends are suspended
//! while the bar redraws, and a few `dialoguer` prompt helpers.

use std::sync::Arc;
use std::time::Duration;

use dialoguer::{Confirm, Input};
use indicatif::{ProgressBar, ProgressStyle};
use tableau_export::ProgressCallback;

pub use indicatif::MultiProgress;

/// An `indicatif` [`ProgressBar`] that implements [`ProgressCallback`].
pub struct IndicatifProgress {
    bar: ProgressBar,
}

impl IndicatifProgress {
    /// Creates a percentage bar for one export run.
    ///
    /// Task log lines are printed above the bar as they arrive.
    #[must_use]
    pub fn export_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new(100));
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {msg} {wide_bar:.cyan/dim} {pos:>3}% [{elapsed_precise}]",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
        );
        bar.set_message(message.to_string());

        Arc::new(Self { bar })
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_position(&self, percent: u8) {
        self.bar.set_position(u64::from(percent.min(100)));
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn log_line(&self, line: &str) {
        self.bar.println(line);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }

    fn abandon(&self, msg: String) {
        self.bar.abandon_with_message(msg);
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while progress bars redraw.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // already set in tests

    log::set_max_level(level);

    multi
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

/// Prompts for a line of text, pre-filled with `current`. Empty input is
/// allowed.
///
/// # Errors
///
/// Returns an error if the terminal cannot be read.
pub fn edit_text(prompt: &str, current: &str) -> dialoguer::Result<String> {
    Input::new()
        .with_prompt(prompt)
        .with_initial_text(current)
        .allow_empty(true)
        .interact_text()
}

/// Prompts for a secret without echoing it. Empty input keeps `current`.
///
/// # Errors
///
/// Returns an error if the terminal cannot be read.
pub fn edit_secret(prompt: &str, current: &str) -> dialoguer::Result<String> {
    let entered = dialoguer::Password::new()
        .with_prompt(format!("{prompt} (leave empty to keep)"))
        .allow_empty_password(true)
        .interact()?;
    Ok(if entered.is_empty() {
        current.to_string()
    } else {
        entered
    })
}

/// Asks a yes/no question.
///
/// # Errors
///
/// Returns an error if the terminal cannot be read.
pub fn confirm(prompt: &str, default: bool) -> dialoguer::Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()
}
