//! Wiring shared by the subcommands and the interactive menu.

use std::error::Error;
use std::path::Path;

use tableau_export::{ExportController, LifecycleState, SubmitOutcome};
use tableau_export_cli_utils::{IndicatifProgress, MultiProgress};
use tableau_export_client::HttpBackend;
use tableau_export_config::storage::FileStorage;
use tableau_export_config::{ConfigStore, StoreError};
use tableau_export_config_models::Configuration;

use crate::report;
use crate::settings::Settings;

pub type Controller = ExportController<HttpBackend>;

/// Backend client and configuration store for one CLI invocation.
pub struct Session {
    pub settings: Settings,
    pub backend: HttpBackend,
    pub store: ConfigStore<FileStorage>,
}

impl Session {
    /// Builds the HTTP client and reads saved configurations.
    ///
    /// A corrupted store is reported once and then used empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the store
    /// cannot be read.
    pub fn open(settings: Settings) -> Result<Self, Box<dyn Error>> {
        let backend = HttpBackend::new(&settings.backend_url, settings.request_timeout())?;
        let mut store = ConfigStore::new(FileStorage::new(&settings.store_dir));

        match store.reload() {
            Ok(()) => {}
            Err(e @ StoreError::Corrupted { .. }) => {
                eprintln!("Warning: {e}. Saved configurations were reset.");
            }
            Err(e) => return Err(e.into()),
        }

        log::debug!(
            "Using backend {} and store {}",
            backend.base_url(),
            settings.store_dir.display()
        );

        Ok(Self {
            settings,
            backend,
            store,
        })
    }

    #[must_use]
    pub fn controller(&self, config: Configuration) -> Controller {
        ExportController::new(self.backend.clone(), config)
            .with_poll_interval(self.settings.poll_interval())
    }

    /// Loads a saved configuration into a fresh controller.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the name is unknown or the snapshot is
    /// unreadable.
    pub fn load_controller(&self, name: &str) -> Result<Controller, StoreError> {
        Ok(self.controller(self.store.load(name)?))
    }
}

/// Uploads `excel` (and picks `sheet`) when the run needs a source file.
///
/// # Errors
///
/// Returns the backend error from the upload or sheet selection.
pub async fn prepare_source(
    ctl: &mut Controller,
    excel: Option<&Path>,
    sheet: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let Some(excel) = excel else {
        return Ok(());
    };

    ctl.upload_source(excel).await?;
    println!(
        "Uploaded {} ({} sheet(s))",
        excel.display(),
        ctl.sheets().len()
    );

    if let Some(sheet) = sheet.filter(|s| *s != ctl.config().sheet_name) {
        ctl.select_sheet(sheet).await?;
    }
    println!(
        "Using sheet '{}' with {} column(s)",
        ctl.config().sheet_name,
        ctl.columns().len()
    );
    Ok(())
}

/// Submits and follows an export until it settles. Ctrl-C stops following
/// it; the server job is not cancelled.
///
/// # Errors
///
/// Returns an error only if the Ctrl-C watcher cannot be joined.
pub async fn run_export(
    ctl: &mut Controller,
    multi: &MultiProgress,
) -> Result<LifecycleState, Box<dyn Error>> {
    let violations = ctl.violations();
    if !violations.is_empty() {
        report::print_violations(&violations);
        return Ok(LifecycleState::Idle);
    }

    ctl.set_progress(IndicatifProgress::export_bar(multi, "Submitting"));

    let handle = ctl.stop_handle();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Ctrl-C received, stopping status polling");
            handle.stop();
        }
    });

    let state = match ctl.submit().await {
        SubmitOutcome::Rejected(violations) => {
            report::print_violations(&violations);
            LifecycleState::Idle
        }
        SubmitOutcome::Polling { task_id } => {
            log::info!("Following task {task_id}");
            ctl.run_until_settled().await
        }
        SubmitOutcome::Completed { .. }
        | SubmitOutcome::Failed { .. }
        | SubmitOutcome::Stopped => ctl.state(),
    };

    watcher.abort();
    if let Err(e) = watcher.await
        && !e.is_cancelled()
    {
        return Err(e.into());
    }

    report::print_run_result(state, ctl.task());
    Ok(state)
}
