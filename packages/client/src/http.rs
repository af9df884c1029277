//! `reqwest` implementation of [`ExportBackend`].
//!
//! Every call is made exactly once. There is no retry layer: the poller
//! already re-asks on its next tick, and the other calls are user-driven.
//!
//! Response handling is shared by all endpoints:
//!
//! 1. Non-2xx: the body's `error` field if it has one, otherwise
//!    `"Request failed with HTTP status {code}"`.
//! 2. 2xx: the body must be JSON; endpoint-specific checks follow
//!    (`success: true` for `/test_connection` and `/start_export`).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tableau_export_client_models::{
    ColumnsRequest, ColumnsResponse, ConnectionRequest, Envelope, LoadViewsRequest,
    StartExportResponse, StatusResponse, UploadResponse, ViewsResponse,
};
use tableau_export_config_models::Configuration;

use crate::{ClientError, ExportBackend, StartedExport, UploadedWorkbook};

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Multipart field the backend reads the spreadsheet from.
const UPLOAD_FIELD: &str = "excel_file";

/// HTTP client bound to one backend base URL.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Creates a client for `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the TLS backend cannot be
    /// initialized.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Wraps an existing `reqwest` client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Backend base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }

    /// `/export_status/{task_id}` with the id percent-encoded as one
    /// path segment.
    fn status_url(&self, task_id: &str) -> Result<reqwest::Url, ClientError> {
        let invalid = || ClientError::InvalidUrl(self.base_url.clone());
        let mut url = reqwest::Url::parse(&self.url("/export_status")).map_err(|_| invalid())?;
        url.path_segments_mut().map_err(|()| invalid())?.push(task_id);
        Ok(url)
    }

    async fn post_json<B, T>(&self, endpoint: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.client.post(self.url(endpoint)).json(body).send().await?;
        decode(endpoint, read_json(endpoint, response).await?)
    }
}

/// Reads a response body, turning non-2xx statuses into
/// [`ClientError::Status`].
async fn read_json(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<serde_json::Value, ClientError> {
    let status = response.status();
    let text = response.text().await?;
    let body = serde_json::from_str::<serde_json::Value>(&text).ok();

    if !status.is_success() {
        let message = body
            .as_ref()
            .and_then(|b| b.get("error"))
            .and_then(serde_json::Value::as_str)
            .map_or_else(
                || format!("Request failed with HTTP status {}", status.as_u16()),
                ToString::to_string,
            );
        log::warn!(
            "{endpoint} returned {status}\n  \
             body preview: {}",
            preview(&text)
        );
        return Err(ClientError::Status {
            status: status.as_u16(),
            message,
        });
    }

    body.ok_or_else(|| {
        log::warn!(
            "{endpoint} returned a non-JSON body\n  \
             body preview: {}",
            preview(&text)
        );
        ClientError::Decode {
            endpoint: endpoint.to_string(),
            message: "response body is not JSON".to_string(),
        }
    })
}

fn decode<T: DeserializeOwned>(endpoint: &str, body: serde_json::Value) -> Result<T, ClientError> {
    serde_json::from_value(body).map_err(|e| ClientError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

fn preview(text: &str) -> &str {
    if text.len() <= BODY_PREVIEW_LEN {
        return text;
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// 2xx bodies that still carry `success: false` or an `error` field.
fn application_error(
    success: Option<bool>,
    error: Option<String>,
    fallback: &str,
) -> Option<ClientError> {
    if success == Some(true) && error.is_none() {
        return None;
    }
    Some(ClientError::Application(
        error.unwrap_or_else(|| fallback.to_string()),
    ))
}

#[async_trait]
impl ExportBackend for HttpBackend {
    async fn test_connection(&self, config: &Configuration) -> Result<Option<String>, ClientError> {
        log::info!(
            "Testing connection to {} (site '{}')",
            config.server_url,
            config.site_id
        );
        let envelope: Envelope = self
            .post_json("/test_connection", &ConnectionRequest::from(config))
            .await?;

        if let Some(err) =
            application_error(envelope.success, envelope.error, "Connection test failed")
        {
            return Err(err);
        }
        Ok(envelope.message)
    }

    async fn load_views(&self, config: &Configuration) -> Result<Vec<String>, ClientError> {
        log::info!("Loading views for workbook '{}'", config.workbook_name);
        let response: ViewsResponse = self
            .post_json("/load_views", &LoadViewsRequest::from(config))
            .await?;
        log::debug!("Backend returned {} view(s)", response.views.len());
        Ok(response.views)
    }

    async fn upload_excel(&self, path: &Path) -> Result<UploadedWorkbook, ClientError> {
        const ENDPOINT: &str = "/upload_excel";

        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map_or_else(|| "upload.xlsx".to_string(), |n| n.to_string_lossy().into_owned());
        log::info!("Uploading {} ({} bytes)", path.display(), bytes.len());

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .client
            .post(self.url(ENDPOINT))
            .multipart(form)
            .send()
            .await?;
        let upload: UploadResponse = decode(ENDPOINT, read_json(ENDPOINT, response).await?)?;

        Ok(UploadedWorkbook {
            filepath: upload.filepath,
            sheets: upload.sheets,
            columns: upload.columns,
        })
    }

    async fn get_columns(
        &self,
        filepath: &str,
        sheet_name: &str,
    ) -> Result<Vec<String>, ClientError> {
        let response: ColumnsResponse = self
            .post_json(
                "/get_columns",
                &ColumnsRequest {
                    filepath,
                    sheet_name,
                },
            )
            .await?;
        Ok(response.columns)
    }

    async fn start_export(&self, config: &Configuration) -> Result<StartedExport, ClientError> {
        log::info!(
            "Starting {} export of workbook '{}'",
            config.export_mode,
            config.workbook_name
        );
        let response: StartExportResponse = self.post_json("/start_export", config).await?;

        if let Some(err) = application_error(
            response.success,
            response.error,
            "Export request was not accepted",
        ) {
            return Err(err);
        }

        Ok(StartedExport {
            task_id: response.task_id.filter(|id| !id.is_empty()),
            message: response.message,
        })
    }

    async fn export_status(&self, task_id: &str) -> Result<StatusResponse, ClientError> {
        let endpoint = format!("/export_status/{task_id}");
        let cache_buster = chrono::Utc::now().timestamp_millis().to_string();

        let response = self
            .client
            .get(self.status_url(task_id)?)
            .query(&[("_", cache_buster.as_str())])
            .send()
            .await?;

        decode(&endpoint, read_json(&endpoint, response).await?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tableau_export_client_models::TaskStatus;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn backend(server: &MockServer) -> HttpBackend {
        HttpBackend::new(server.uri(), Duration::from_secs(5)).unwrap()
    }

    fn config() -> Configuration {
        Configuration {
            server_url: "https://tableau.example.com".to_string(),
            token_name: "exporter".to_string(),
            token_secret: "pat-secret".to_string(),
            workbook_name: "Sales".to_string(),
            ..Configuration::default()
        }
    }

    #[tokio::test]
    async fn start_export_sends_secret_and_returns_task_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/start_export"))
            .and(body_partial_json(json!({
                "token_secret": "pat-secret",
                "export_mode": "automate"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "Export process initiated.",
                "task_id": "abc-123"
            })))
            .mount(&server)
            .await;

        let started = backend(&server).start_export(&config()).await.unwrap();
        assert_eq!(started.task_id.as_deref(), Some("abc-123"));
        assert_eq!(
            started.message.as_deref(),
            Some("Export process initiated.")
        );
    }

    #[tokio::test]
    async fn start_export_without_task_id_is_synchronous_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/start_export"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "success": true, "message": "Done." })),
            )
            .mount(&server)
            .await;

        let started = backend(&server).start_export(&config()).await.unwrap();
        assert_eq!(started.task_id, None);
    }

    #[tokio::test]
    async fn start_export_requires_success_flag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/start_export"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "task_id": "x" })))
            .mount(&server)
            .await;

        let err = backend(&server).start_export(&config()).await.unwrap_err();
        assert!(matches!(err, ClientError::Application(_)));
    }

    #[tokio::test]
    async fn error_field_is_surfaced_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/start_export"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "success": false,
                "error": "Invalid configuration: Missing Sheet Name for automate mode."
            })))
            .mount(&server)
            .await;

        let err = backend(&server).start_export(&config()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: Missing Sheet Name for automate mode."
        );
    }

    #[tokio::test]
    async fn non_json_failure_gets_status_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/start_export"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
            .mount(&server)
            .await;

        let err = backend(&server).start_export(&config()).await.unwrap_err();
        assert_eq!(err.to_string(), "Request failed with HTTP status 502");
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn export_status_parses_payload_and_busts_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/export_status/abc-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "task_id": "abc-123",
                "status": "PROGRESS",
                "progress": 42,
                "log": ["[10:00:00] Connected to Tableau."],
                "error": null
            })))
            .mount(&server)
            .await;

        let status = backend(&server).export_status("abc-123").await.unwrap();
        assert_eq!(status.task_status(), Some(TaskStatus::Progress));
        assert_eq!(status.progress, Some(42));
        assert_eq!(status.log.len(), 1);

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].url.query_pairs().any(|(k, _)| k == "_"));
    }

    #[tokio::test]
    async fn export_status_404_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/export_status/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = backend(&server).export_status("gone").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn export_status_encodes_task_id_as_one_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/export_status/batch%2F7%3Fx"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "PENDING"
            })))
            .mount(&server)
            .await;

        let status = backend(&server).export_status("batch/7?x").await.unwrap();
        assert_eq!(status.task_status(), Some(TaskStatus::Queued));

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests[0].url.path(), "/export_status/batch%2F7%3Fx");
    }

    #[test]
    fn status_url_rejects_unusable_base() {
        let backend = HttpBackend::with_client(reqwest::Client::new(), "mailto:ops@example.com");
        assert!(matches!(
            backend.status_url("t-1"),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_connection_reports_refusal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/test_connection"))
            .and(body_partial_json(json!({ "site_id": "" })))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "success": false,
                "error": "Authentication failed. Check PAT Name/Secret and Site ID."
            })))
            .mount(&server)
            .await;

        let err = backend(&server).test_connection(&config()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Authentication failed. Check PAT Name/Secret and Site ID."
        );
    }

    #[tokio::test]
    async fn load_views_accepts_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/load_views"))
            .and(body_partial_json(json!({ "workbook_name": "Sales" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "success": true, "views": [] })),
            )
            .mount(&server)
            .await;

        let views = backend(&server).load_views(&config()).await.unwrap();
        assert!(views.is_empty());
    }

    #[tokio::test]
    async fn upload_then_get_columns() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload_excel"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "filename": "stores.xlsx",
                "filepath": "uploaded_configs/stores.xlsx",
                "sheets": ["Stores", "Regions"],
                "columns": ["Store", "Region"]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/get_columns"))
            .and(body_partial_json(json!({
                "filepath": "uploaded_configs/stores.xlsx",
                "sheet_name": "Regions"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "success": true, "columns": ["Region", "Manager"] })),
            )
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("stores.xlsx");
        std::fs::write(&file, b"PK\x03\x04 not really a workbook").unwrap();

        let client = backend(&server);
        let upload = client.upload_excel(&file).await.unwrap();
        assert_eq!(upload.sheets, vec!["Stores", "Regions"]);

        let columns = client
            .get_columns(&upload.filepath, "Regions")
            .await
            .unwrap();
        assert_eq!(columns, vec!["Region", "Manager"]);

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"excel_file\""));
        assert!(body.contains("filename=\"stores.xlsx\""));
    }

    #[tokio::test]
    async fn upload_of_missing_file_is_io_error() {
        let server = MockServer::start().await;
        let err = backend(&server)
            .upload_excel(Path::new("/definitely/not/here.xlsx"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Io(_)));
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let text = "é".repeat(BODY_PREVIEW_LEN);
        assert!(preview(&text).len() <= BODY_PREVIEW_LEN);
    }
}
