//! Export lifecycle: validate, submit, poll, finish.
//!
//! ```text
//! IDLE -> VALIDATING -> SUBMITTING -> POLLING -> COMPLETED | FAILED | STOPPED
//!   ^________________________ next submit ____________________________|
//! ```
//!
//! [`ExportController`] owns everything one exporting session needs: the
//! configuration being edited, the sheets/columns/views loaded from the
//! backend, the current [`ExportTask`] and its [`Poller`]. No failure
//! escapes `submit` or `poll_once`; each becomes a state transition or a
//! log line.
//!
//! Stopping is client-side only. The backend job keeps running.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use strum_macros::Display;
use tableau_export_client::{ClientError, ExportBackend, StartedExport};
use tableau_export_client_models::TaskStatus;
use tableau_export_config::{Violation, validate};
use tableau_export_config_models::Configuration;
use tokio::sync::watch;

use crate::poller::{DEFAULT_POLL_INTERVAL, Poller};
use crate::progress::{ProgressCallback, null_progress};
use crate::task::{ExportTask, LogSource};

/// Message recorded when a run is stopped from the client.
pub const STOP_MESSAGE: &str = "Export stopped by user. The server job may still be running.";

// ---------------------------------------------------------------------------
// States and outcomes
// ---------------------------------------------------------------------------

/// Where the controller is in an export run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    #[default]
    Idle,
    Validating,
    Submitting,
    Polling,
    Completed,
    Failed,
    Stopped,
}

impl LifecycleState {
    /// Whether an export run is in flight.
    #[must_use]
    pub const fn is_exporting(self) -> bool {
        matches!(self, Self::Submitting | Self::Polling)
    }
}

/// Result of [`ExportController::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing was sent; every violation is listed.
    Rejected(Vec<Violation>),
    /// The backend queued a task that is now being polled.
    Polling { task_id: String },
    /// The backend finished the export synchronously.
    Completed { message: String },
    /// The backend refused the request or could not be reached.
    Failed { error: String },
    /// A stop was requested while the request was in flight.
    Stopped,
}

/// Result of one [`ExportController::poll_once`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// No request was made and the poller is stopped.
    Skipped,
    /// A response arrived after the run was stopped and was dropped.
    Discarded,
    /// The task is still running.
    Pending(Option<TaskStatus>),
    /// The status request failed; polling continues.
    Unreachable(String),
    /// The task finished successfully.
    Completed,
    /// The task failed or is unknown to the backend.
    Failed(String),
}

/// Requests a stop from outside the controller (a Ctrl-C handler, say).
///
/// The controller notices the request at the next point it resumes.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        *self.tx.borrow()
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Drives export runs against an [`ExportBackend`].
pub struct ExportController<B> {
    backend: B,
    config: Configuration,
    sheets: Vec<String>,
    columns: Vec<String>,
    views: Vec<String>,
    state: LifecycleState,
    task: ExportTask,
    poller: Poller,
    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
    progress: Arc<dyn ProgressCallback>,
}

impl<B: ExportBackend> ExportController<B> {
    /// Creates an idle controller polling every [`DEFAULT_POLL_INTERVAL`].
    #[must_use]
    pub fn new(backend: B, config: Configuration) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            backend,
            config,
            sheets: Vec::new(),
            columns: Vec::new(),
            views: Vec::new(),
            state: LifecycleState::Idle,
            task: ExportTask::default(),
            poller: Poller::new(DEFAULT_POLL_INTERVAL),
            stop_tx: Arc::new(stop_tx),
            stop_rx,
            progress: null_progress(),
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, period: Duration) -> Self {
        self.poller = Poller::new(period);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn set_progress(&mut self, progress: Arc<dyn ProgressCallback>) {
        self.progress = progress;
    }

    // -- accessors ----------------------------------------------------------

    #[must_use]
    pub const fn config(&self) -> &Configuration {
        &self.config
    }

    /// Mutable access for editing. Changes take effect on the next submit.
    pub const fn config_mut(&mut self) -> &mut Configuration {
        &mut self.config
    }

    /// Swaps in a different configuration (a loaded snapshot, say).
    ///
    /// Sheets and columns are kept only if the new configuration still
    /// points at the same uploaded file.
    pub fn replace_config(&mut self, config: Configuration) {
        if config.excel_filepath != self.config.excel_filepath {
            self.sheets.clear();
            self.columns.clear();
        }
        self.config = config;
    }

    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    #[must_use]
    pub const fn task(&self) -> &ExportTask {
        &self.task
    }

    #[must_use]
    pub fn sheets(&self) -> &[String] {
        &self.sheets
    }

    /// Columns of the selected sheet. Empty when no file is loaded.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn views(&self) -> &[String] {
        &self.views
    }

    #[must_use]
    pub const fn is_exporting(&self) -> bool {
        self.state.is_exporting()
    }

    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: Arc::clone(&self.stop_tx),
        }
    }

    /// Problems that would block a submit right now.
    #[must_use]
    pub fn violations(&self) -> Vec<Violation> {
        validate(&self.config, &self.columns)
    }

    // -- session environment -------------------------------------------------

    /// Checks the configured PAT against the server.
    ///
    /// # Errors
    ///
    /// Returns the backend's refusal or the transport error.
    pub async fn test_connection(&self) -> Result<String, ClientError> {
        let message = self.backend.test_connection(&self.config).await?;
        Ok(message.unwrap_or_else(|| "Connection successful.".to_string()))
    }

    /// Fetches the workbook's views. Exclusions naming views that no
    /// longer exist are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the backend call fails; the previous view
    /// list is cleared.
    pub async fn load_views(&mut self) -> Result<&[String], ClientError> {
        match self.backend.load_views(&self.config).await {
            Ok(views) => {
                log::info!("Loaded {} view(s)", views.len());
                self.views = views;
                Ok(&self.views)
            }
            Err(e) => {
                self.views.clear();
                Err(e)
            }
        }
    }

    /// Uploads a spreadsheet and selects its first sheet.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on failure, after clearing the file handle,
    /// sheet and columns.
    pub async fn upload_source(&mut self, path: &Path) -> Result<(), ClientError> {
        match self.backend.upload_excel(path).await {
            Ok(upload) => {
                log::info!(
                    "Uploaded {} with {} sheet(s)",
                    path.display(),
                    upload.sheets.len()
                );
                self.config.excel_filepath = Some(upload.filepath);
                self.config.sheet_name = upload.sheets.first().cloned().unwrap_or_default();
                self.sheets = upload.sheets;
                self.columns = upload.columns;
                Ok(())
            }
            Err(e) => {
                log::warn!("Upload of {} failed: {e}", path.display());
                self.config.clear_source();
                self.sheets.clear();
                self.columns.clear();
                Err(e)
            }
        }
    }

    /// Switches to another sheet of the uploaded file and reloads columns.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Application`] if no file is uploaded, or the
    /// backend error. Columns are cleared on failure.
    pub async fn select_sheet(&mut self, sheet_name: &str) -> Result<(), ClientError> {
        let Some(filepath) = self.config.excel_filepath.clone() else {
            return Err(ClientError::Application(
                "Upload a source Excel file first".to_string(),
            ));
        };

        self.config.sheet_name = sheet_name.to_string();
        match self.backend.get_columns(&filepath, sheet_name).await {
            Ok(columns) => {
                log::debug!("Sheet '{sheet_name}' has {} column(s)", columns.len());
                self.columns = columns;
                Ok(())
            }
            Err(e) => {
                self.columns.clear();
                Err(e)
            }
        }
    }

    // -- lifecycle ------------------------------------------------------------

    /// Validates and submits the configuration.
    ///
    /// A run already in flight is stopped first, so two pollers never
    /// coexist. It stays stopped even if the new submit is rejected.
    pub async fn submit(&mut self) -> SubmitOutcome {
        if self.apply_stop() {
            log::info!("Stopped the previous run before a new submit");
        }
        self.stop_tx.send_replace(false);

        self.state = LifecycleState::Validating;
        let violations = self.violations();
        if !violations.is_empty() {
            for violation in &violations {
                log::warn!("Cannot submit: {violation}");
            }
            self.state = LifecycleState::Idle;
            return SubmitOutcome::Rejected(violations);
        }

        self.task = ExportTask::default();
        self.state = LifecycleState::Submitting;
        self.progress.set_position(0);
        self.progress
            .set_message("Submitting export request...".to_string());

        let result = self.backend.start_export(&self.config).await;

        if self.stop_requested() {
            self.apply_stop();
            return SubmitOutcome::Stopped;
        }

        match result {
            Ok(StartedExport {
                task_id: Some(task_id),
                message,
            }) => {
                let message = message.unwrap_or_else(|| "Export queued.".to_string());
                log::info!("Export queued as task {task_id}");
                self.task = ExportTask::queued(task_id.clone(), message.clone());
                self.record(LogSource::Client, &format!("{message} Task id: {task_id}"));
                self.progress.set_message(message);
                self.poller.start();
                self.state = LifecycleState::Polling;
                SubmitOutcome::Polling { task_id }
            }
            Ok(StartedExport {
                task_id: None,
                message,
            }) => {
                let message = message.unwrap_or_else(|| "Export completed.".to_string());
                log::info!("Export completed without a task: {message}");
                self.task.complete(message.clone());
                self.record(LogSource::Client, &message);
                self.state = LifecycleState::Completed;
                self.progress.set_position(100);
                self.progress.finish(message.clone());
                SubmitOutcome::Completed { message }
            }
            Err(e) => {
                let error = e.to_string();
                log::error!("Export request failed: {error}");
                self.fail_run(&error);
                SubmitOutcome::Failed { error }
            }
        }
    }

    /// Performs one status check for the running task.
    pub async fn poll_once(&mut self) -> PollOutcome {
        let Some(task_id) = self.polled_task_id() else {
            self.poller.stop();
            return PollOutcome::Skipped;
        };
        if self.stop_requested() {
            self.apply_stop();
            return PollOutcome::Skipped;
        }

        let result = self.backend.export_status(&task_id).await;

        if self.stop_requested() {
            self.apply_stop();
            return PollOutcome::Discarded;
        }
        if self.polled_task_id().as_deref() != Some(task_id.as_str()) {
            log::debug!("Dropping late status for task {task_id}");
            return PollOutcome::Discarded;
        }

        match result {
            Ok(response) => {
                let update = self.task.apply(&response);
                for line in &update.appended {
                    self.progress.log_line(line);
                }
                self.progress.set_position(self.task.progress());

                if !update.terminal {
                    self.progress.set_message(self.task.message().to_string());
                    return PollOutcome::Pending(update.status);
                }

                self.poller.stop();
                if update.status == Some(TaskStatus::Success) {
                    log::info!("Export task {task_id} completed");
                    self.state = LifecycleState::Completed;
                    self.progress.finish(self.task.message().to_string());
                    PollOutcome::Completed
                } else {
                    let error = self.task.message().to_string();
                    log::error!("Export task {task_id} failed: {error}");
                    self.state = LifecycleState::Failed;
                    self.progress.abandon(error.clone());
                    PollOutcome::Failed(error)
                }
            }
            Err(e) if e.is_not_found() => {
                let error = format!("Export task {task_id} was not found on the server.");
                log::error!("{error}");
                self.fail_run(&error);
                PollOutcome::Failed(error)
            }
            Err(e) => {
                let warning = format!("Status check failed: {e}");
                log::warn!("{warning} (task {task_id}, will retry on the next tick)");
                self.record(LogSource::Client, &format!("WARNING: {warning}"));
                PollOutcome::Unreachable(warning)
            }
        }
    }

    /// Stops the current run on the client side.
    ///
    /// Accepted while submitting or polling; returns whether it was.
    pub fn stop(&mut self) -> bool {
        self.stop_tx.send_replace(true);
        self.apply_stop()
    }

    /// Polls until the run settles or a stop is requested.
    ///
    /// Returns immediately if nothing is being polled.
    pub async fn run_until_settled(&mut self) -> LifecycleState {
        enum Event {
            Stop,
            Tick,
            Idle,
        }

        loop {
            let event = {
                let stop_rx = &mut self.stop_rx;
                let poller = &mut self.poller;
                tokio::select! {
                    biased;
                    _ = stop_rx.wait_for(|stop| *stop) => Event::Stop,
                    ticked = poller.tick() => if ticked { Event::Tick } else { Event::Idle },
                }
            };

            match event {
                Event::Stop => {
                    self.apply_stop();
                    break;
                }
                Event::Tick => {
                    self.poll_once().await;
                }
                Event::Idle => break,
            }
        }

        self.state
    }

    /// Forgets the current run and returns to idle.
    pub fn reset(&mut self) {
        self.poller.stop();
        self.stop_tx.send_replace(false);
        self.task = ExportTask::default();
        self.state = LifecycleState::Idle;
    }

    // -- internals ------------------------------------------------------------

    fn stop_requested(&self) -> bool {
        *self.stop_rx.borrow()
    }

    fn polled_task_id(&self) -> Option<String> {
        if self.state != LifecycleState::Polling || !self.task.is_active() {
            return None;
        }
        self.task.task_id().map(ToString::to_string)
    }

    fn apply_stop(&mut self) -> bool {
        self.poller.stop();
        if !self.state.is_exporting() {
            return false;
        }

        log::info!("{STOP_MESSAGE}");
        self.task.deactivate();
        self.task.set_message(STOP_MESSAGE);
        self.record(LogSource::Client, STOP_MESSAGE);
        self.state = LifecycleState::Stopped;
        self.progress.abandon(STOP_MESSAGE.to_string());
        true
    }

    fn fail_run(&mut self, error: &str) {
        self.poller.stop();
        if let Some(line) = self.task.fail(error) {
            self.progress.log_line(&line);
        }
        self.state = LifecycleState::Failed;
        self.progress.abandon(error.to_string());
    }

    fn record(&mut self, source: LogSource, line: &str) {
        if let Some(line) = self.task.append_log(source, line) {
            self.progress.log_line(&line);
        }
    }
}
