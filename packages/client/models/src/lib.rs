#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Bodies exchanged with the export backend.
//!
//! Request types borrow what they need from a [`Configuration`]; response
//! types are lenient about missing optional fields because the backend
//! omits them freely depending on task state.

use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{AsRefStr, Display};
use tableau_export_config_models::Configuration;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Body of `/test_connection`.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionRequest<'a> {
    /// Tableau server URL.
    pub server_url: &'a str,
    /// PAT name.
    pub token_name: &'a str,
    /// PAT secret.
    pub token_secret: &'a str,
    /// Site content URL.
    pub site_id: &'a str,
}

impl<'a> From<&'a Configuration> for ConnectionRequest<'a> {
    fn from(config: &'a Configuration) -> Self {
        Self {
            server_url: &config.server_url,
            token_name: &config.token_name,
            token_secret: &config.token_secret,
            site_id: &config.site_id,
        }
    }
}

/// Body of `/load_views`.
#[derive(Debug, Clone, Serialize)]
pub struct LoadViewsRequest<'a> {
    /// Connection settings.
    #[serde(flatten)]
    pub connection: ConnectionRequest<'a>,
    /// Workbook whose views are listed.
    pub workbook_name: &'a str,
}

impl<'a> From<&'a Configuration> for LoadViewsRequest<'a> {
    fn from(config: &'a Configuration) -> Self {
        Self {
            connection: ConnectionRequest::from(config),
            workbook_name: &config.workbook_name,
        }
    }
}

/// Body of `/get_columns`.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnsRequest<'a> {
    /// Server-side handle returned by `/upload_excel`.
    pub filepath: &'a str,
    /// Sheet to read the header row from.
    pub sheet_name: &'a str,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Fields every backend response may carry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    /// Application-level success flag.
    #[serde(default)]
    pub success: Option<bool>,
    /// Informational message.
    #[serde(default)]
    pub message: Option<String>,
    /// Application error, surfaced verbatim.
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of a successful `/load_views`.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewsResponse {
    /// Non-hidden view names, sorted by the backend.
    pub views: Vec<String>,
}

/// Body of a successful `/upload_excel`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadResponse {
    /// Server-side handle for later calls.
    pub filepath: String,
    /// Sheet names in workbook order.
    #[serde(default)]
    pub sheets: Vec<String>,
    /// Columns of the first sheet.
    #[serde(default)]
    pub columns: Vec<String>,
}

/// Body of a successful `/get_columns`.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnsResponse {
    /// Header row of the requested sheet.
    pub columns: Vec<String>,
}

/// Body of `/start_export`.
#[derive(Debug, Clone, Deserialize)]
pub struct StartExportResponse {
    /// Application-level success flag.
    #[serde(default)]
    pub success: Option<bool>,
    /// Informational message.
    #[serde(default)]
    pub message: Option<String>,
    /// Id of the queued task. Absent when the export ran synchronously.
    #[serde(default)]
    pub task_id: Option<String>,
    /// Application error.
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `/export_status/{task_id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StatusResponse {
    /// Raw task state (`PENDING`, `PROGRESS`, `SUCCESS`, ...).
    #[serde(default)]
    pub status: Option<String>,
    /// Percentage complete, if reported.
    #[serde(default, deserialize_with = "percentage")]
    pub progress: Option<u8>,
    /// Server-side log lines, oldest first.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub log: Vec<String>,
    /// Failure description.
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusResponse {
    /// Parsed status, if it is one the client knows.
    #[must_use]
    pub fn task_status(&self) -> Option<TaskStatus> {
        self.status.as_deref().and_then(TaskStatus::from_wire)
    }
}

/// Accepts any JSON number and clamps it into `0..=100`.
fn percentage<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(value.map(|v| v.round().clamp(0.0, 100.0) as u8))
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Recorded state of a server-side export task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Accepted but not yet running.
    Queued,
    /// Running.
    Progress,
    /// Finished successfully.
    Success,
    /// Finished with an error.
    Failure,
}

impl TaskStatus {
    /// Maps a backend task state. Unknown states return `None` and leave
    /// the recorded status unchanged.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" | "QUEUED" => Some(Self::Queued),
            "STARTED" | "PROGRESS" => Some(Self::Progress),
            "SUCCESS" => Some(Self::Success),
            "FAILURE" => Some(Self::Failure),
            _ => None,
        }
    }

    /// Whether polling ends in this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_payload_tolerates_missing_fields() {
        let body = serde_json::json!({ "status": "SUCCESS" });
        let status: StatusResponse = serde_json::from_value(body).unwrap();
        assert_eq!(status.task_status(), Some(TaskStatus::Success));
        assert_eq!(status.progress, None);
        assert!(status.log.is_empty());
    }

    #[test]
    fn status_payload_clamps_progress_and_accepts_null_log() {
        let body = serde_json::json!({
            "status": "PROGRESS",
            "progress": 42.6,
            "log": null,
            "error": null
        });
        let status: StatusResponse = serde_json::from_value(body).unwrap();
        assert_eq!(status.progress, Some(43));
        assert!(status.log.is_empty());

        let over: StatusResponse =
            serde_json::from_value(serde_json::json!({ "progress": 250 })).unwrap();
        assert_eq!(over.progress, Some(100));
    }

    #[test]
    fn wire_states_map_to_task_status() {
        assert_eq!(TaskStatus::from_wire("PENDING"), Some(TaskStatus::Queued));
        assert_eq!(TaskStatus::from_wire("started"), Some(TaskStatus::Progress));
        assert_eq!(TaskStatus::from_wire("STOPPED"), None);
        assert!(TaskStatus::Failure.is_terminal());
        assert!(!TaskStatus::Progress.is_terminal());
        assert_eq!(TaskStatus::Queued.to_string(), "QUEUED");
    }

    #[test]
    fn load_views_request_flattens_connection() {
        let config = Configuration {
            server_url: "https://t.example.com".to_string(),
            workbook_name: "Sales".to_string(),
            ..Configuration::default()
        };
        let body = serde_json::to_value(LoadViewsRequest::from(&config)).unwrap();
        assert_eq!(body["server_url"], "https://t.example.com");
        assert_eq!(body["workbook_name"], "Sales");
        assert_eq!(body["site_id"], "");
    }
}
