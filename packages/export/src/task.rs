//! Client-side record of one server export task.

use std::collections::VecDeque;

use strum_macros::Display;
use tableau_export_client_models::{StatusResponse, TaskStatus};

/// Number of log lines kept per task. Older lines are dropped first.
pub const MAX_LOG_LINES: usize = 150;

/// A new line is skipped if it equals one of this many most recent lines.
pub const DEDUP_WINDOW: usize = 5;

/// Origin of a task log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LogSource {
    /// Relayed from the backend's task log.
    #[strum(serialize = "[Server]")]
    Server,
    /// Produced locally by the controller.
    #[strum(serialize = "[Client]")]
    Client,
}

/// What a status payload did to the task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Status after the update, if the task has one.
    pub status: Option<TaskStatus>,
    /// Lines that were actually appended (after dedup).
    pub appended: Vec<String>,
    /// Whether the update ended the task.
    pub terminal: bool,
}

/// One in-flight or finished export job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTask {
    task_id: Option<String>,
    status: Option<TaskStatus>,
    progress: u8,
    message: String,
    active: bool,
    log: VecDeque<String>,
}

impl Default for ExportTask {
    fn default() -> Self {
        Self {
            task_id: None,
            status: None,
            progress: 0,
            message: String::new(),
            active: false,
            log: VecDeque::with_capacity(MAX_LOG_LINES),
        }
    }
}

impl ExportTask {
    /// A task the backend just queued.
    #[must_use]
    pub fn queued(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            task_id: Some(task_id.into()),
            status: Some(TaskStatus::Queued),
            message: message.into(),
            active: true,
            ..Self::default()
        }
    }

    /// Id assigned by the backend.
    #[must_use]
    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    /// Last recognised status.
    #[must_use]
    pub const fn status(&self) -> Option<TaskStatus> {
        self.status
    }

    /// Completion percentage.
    #[must_use]
    pub const fn progress(&self) -> u8 {
        self.progress
    }

    /// Latest status message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the task is still being followed.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Retained log lines, oldest first.
    pub fn log(&self) -> impl ExactSizeIterator<Item = &str> {
        self.log.iter().map(String::as_str)
    }

    pub(crate) fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    pub(crate) const fn deactivate(&mut self) {
        self.active = false;
    }

    /// Ends the task as finished with the synchronous result of a submit.
    pub(crate) fn complete(&mut self, message: impl Into<String>) {
        self.status = Some(TaskStatus::Success);
        self.progress = 100;
        self.message = message.into();
        self.active = false;
    }

    /// Ends the task as failed.
    pub(crate) fn fail(&mut self, message: impl Into<String>) -> Option<String> {
        let message = message.into();
        self.status = Some(TaskStatus::Failure);
        self.active = false;
        let line = self.append_log(LogSource::Client, &format!("ERROR: {message}"));
        self.message = message;
        line
    }

    /// Appends a tagged line unless it repeats one of the last
    /// [`DEDUP_WINDOW`] lines, then trims to [`MAX_LOG_LINES`].
    ///
    /// Returns the stored line when it was appended.
    pub fn append_log(&mut self, source: LogSource, line: &str) -> Option<String> {
        let tagged = format!("{source} {line}");
        if self
            .log
            .iter()
            .rev()
            .take(DEDUP_WINDOW)
            .any(|existing| *existing == tagged)
        {
            return None;
        }

        self.log.push_back(tagged.clone());
        while self.log.len() > MAX_LOG_LINES {
            self.log.pop_front();
        }
        Some(tagged)
    }

    /// Applies a status payload.
    ///
    /// Unknown or missing statuses leave the recorded status unchanged and
    /// only refresh the message.
    pub fn apply(&mut self, response: &StatusResponse) -> StatusUpdate {
        if let Some(progress) = response.progress {
            self.progress = progress;
        }

        let mut appended: Vec<String> = response
            .log
            .iter()
            .filter_map(|line| self.append_log(LogSource::Server, line))
            .collect();

        let status = response.task_status();
        let terminal = match status {
            Some(TaskStatus::Success) => {
                self.status = status;
                self.progress = 100;
                self.active = false;
                self.message = "Export completed successfully.".to_string();
                true
            }
            Some(TaskStatus::Failure) => {
                self.progress = response.progress.unwrap_or(0);
                let error = response
                    .error
                    .clone()
                    .unwrap_or_else(|| "Export failed on the server.".to_string());
                appended.extend(self.fail(error));
                true
            }
            Some(running) => {
                self.status = Some(running);
                self.message = format!("{running}: {}%", self.progress);
                false
            }
            None => {
                self.message = response.status.as_ref().map_or_else(
                    || format!("Waiting for status ({}%)", self.progress),
                    |raw| format!("{raw}: {}%", self.progress),
                );
                false
            }
        };

        StatusUpdate {
            status: self.status,
            appended,
            terminal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(raw: &str, progress: Option<u8>, log: &[&str]) -> StatusResponse {
        StatusResponse {
            status: Some(raw.to_string()),
            progress,
            log: log.iter().map(ToString::to_string).collect(),
            error: None,
        }
    }

    #[test]
    fn repeated_line_within_window_is_kept_once() {
        let mut task = ExportTask::queued("t1", "queued");
        let update = task.apply(&status(
            "PROGRESS",
            Some(10),
            &["Exporting view A", "Exporting view A", "Exporting view A"],
        ));

        assert_eq!(update.appended, vec!["[Server] Exporting view A"]);
        assert_eq!(task.log().len(), 1);
    }

    #[test]
    fn repeated_line_outside_window_is_appended_again() {
        let mut task = ExportTask::default();
        task.append_log(LogSource::Server, "start");
        for i in 0..DEDUP_WINDOW {
            task.append_log(LogSource::Server, &format!("line {i}"));
        }
        assert!(task.append_log(LogSource::Server, "start").is_some());
        assert!(task.append_log(LogSource::Client, "line 4").is_some());
    }

    #[test]
    fn log_keeps_only_latest_lines() {
        let mut task = ExportTask::default();
        for i in 0..200 {
            task.append_log(LogSource::Server, &format!("line {i}"));
        }

        assert_eq!(task.log().len(), MAX_LOG_LINES);
        assert_eq!(task.log().next(), Some("[Server] line 50"));
        assert_eq!(task.log().last(), Some("[Server] line 199"));
    }

    #[test]
    fn success_forces_full_progress() {
        let mut task = ExportTask::queued("t1", "queued");
        assert!(!task.apply(&status("PROGRESS", Some(42), &[])).terminal);
        assert_eq!(task.progress(), 42);

        let update = task.apply(&status("SUCCESS", None, &[]));
        assert!(update.terminal);
        assert_eq!(task.progress(), 100);
        assert!(!task.is_active());
        assert_eq!(task.status(), Some(TaskStatus::Success));
    }

    #[test]
    fn failure_uses_reported_progress_or_zero() {
        let mut task = ExportTask::queued("t1", "queued");
        task.apply(&status("PROGRESS", Some(60), &[]));

        let mut failed = status("FAILURE", None, &[]);
        failed.error = Some("View not found".to_string());
        let update = task.apply(&failed);

        assert!(update.terminal);
        assert_eq!(task.progress(), 0);
        assert_eq!(task.message(), "View not found");
        assert_eq!(task.log().last(), Some("[Client] ERROR: View not found"));
    }

    #[test]
    fn unknown_status_keeps_recorded_status() {
        let mut task = ExportTask::queued("t1", "queued");
        task.apply(&status("PROGRESS", Some(5), &[]));

        let update = task.apply(&status("STOPPED", None, &[]));
        assert!(!update.terminal);
        assert_eq!(task.status(), Some(TaskStatus::Progress));
        assert!(task.is_active());
        assert_eq!(task.message(), "STOPPED: 5%");
    }
}
