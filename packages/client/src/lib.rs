#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Client for the export backend.
//!
//! The backend signs in to Tableau, reads uploaded spreadsheets and renders
//! views; this crate only speaks its HTTP contract. Everything the
//! orchestration layer needs sits behind the [`ExportBackend`] trait so
//! the lifecycle controller can be exercised against a fake.
//!
//! [`HttpBackend`] is the `reqwest` implementation.

pub mod http;

use std::path::Path;

use async_trait::async_trait;
use tableau_export_client_models::StatusResponse;
use tableau_export_config_models::Configuration;

pub use http::HttpBackend;

/// Errors from backend calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request never produced a response (connect, timeout, body).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("{message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Backend `error` field, or a message derived from the status.
        message: String,
    },

    /// The backend answered 2xx but reported failure.
    #[error("{0}")]
    Application(String),

    /// A 2xx body did not have the expected shape.
    #[error("Unexpected response from {endpoint}: {message}")]
    Decode {
        /// Endpoint path.
        endpoint: String,
        /// What was wrong.
        message: String,
    },

    /// The backend base URL cannot carry a request path.
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    /// A local file could not be read for upload.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Whether the backend reported the resource as unknown (HTTP 404).
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// Result of a successful `/start_export`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedExport {
    /// Task to poll. `None` means the export already finished.
    pub task_id: Option<String>,
    /// Informational message from the backend.
    pub message: Option<String>,
}

/// An uploaded spreadsheet as seen by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedWorkbook {
    /// Server-side file handle.
    pub filepath: String,
    /// Sheet names.
    pub sheets: Vec<String>,
    /// Columns of the first sheet.
    pub columns: Vec<String>,
}

/// Operations offered by the export backend.
#[async_trait]
pub trait ExportBackend: Send + Sync {
    /// Signs in and out with the configured PAT.
    ///
    /// Returns the backend's confirmation message, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or sign-in is refused.
    async fn test_connection(&self, config: &Configuration) -> Result<Option<String>, ClientError>;

    /// Lists the workbook's non-hidden views. An empty list is a valid
    /// answer.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails.
    async fn load_views(&self, config: &Configuration) -> Result<Vec<String>, ClientError>;

    /// Uploads a local `.xlsx` file.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the file cannot be read or the backend
    /// rejects it.
    async fn upload_excel(&self, path: &Path) -> Result<UploadedWorkbook, ClientError>;

    /// Reads the header row of one sheet of an uploaded file.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails.
    async fn get_columns(&self, filepath: &str, sheet_name: &str)
    -> Result<Vec<String>, ClientError>;

    /// Submits the full configuration, secret included.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] unless the response is 2xx with
    /// `success: true`.
    async fn start_export(&self, config: &Configuration) -> Result<StartedExport, ClientError>;

    /// Fetches the current state of a task.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] for transport failures and non-2xx answers;
    /// see [`ClientError::is_not_found`].
    async fn export_status(&self, task_id: &str) -> Result<StatusResponse, ClientError>;
}
