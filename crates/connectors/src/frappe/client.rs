use crate::{
    error::ConfigError,
    frappe::{
        config::FrappeConfig,
        dto::{ErrorBody, JobDocument, JobUpdate, MethodEnvelope, ResourceEnvelope},
    },
};
use async_trait::async_trait;
use import_core::{
    error::ServiceError,
    service::{JobControlService, LogService},
};
use model::{
    job::{ErrorReport, ImportJob, JobId, RunningJob, StartAck, StatusReport},
    log::{LogRecord, RawLogRecord},
};
use reqwest::{
    Method, RequestBuilder, Response, StatusCode, Url,
    header::{ACCEPT, AUTHORIZATION},
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

const LOG_DOCTYPE: &str = "Data Import Log";
const ERROR_LOG_DOCTYPE: &str = "Error Log";

/// HTTP client for the import endpoints of a Frappe site.
#[derive(Debug, Clone)]
pub struct FrappeClient {
    http: reqwest::Client,
    config: FrappeConfig,
}

impl FrappeClient {
    pub fn new(config: FrappeConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &FrappeConfig {
        &self.config
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ServiceError::Transport(format!("{} is not a base URL", self.config.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// A whitelisted method of the import module.
    fn import_method(&self, method: Method, name: &str) -> Result<RequestBuilder, ServiceError> {
        let path = format!("{}.{name}", self.config.method_root);
        self.method(method, &path)
    }

    fn method(&self, method: Method, path: &str) -> Result<RequestBuilder, ServiceError> {
        let url = self.url(&["api", "method", path])?;
        Ok(self.http.request(method, url))
    }

    fn resource(&self, method: Method, job_id: &JobId) -> Result<RequestBuilder, ServiceError> {
        let url = self.url(&["api", "resource", &self.config.doctype, job_id.as_str()])?;
        Ok(self.http.request(method, url))
    }

    async fn send(&self, request: RequestBuilder, job_id: &JobId) -> Result<Response, ServiceError> {
        let mut request = request.header(ACCEPT, "application/json");
        if let Some(auth) = self.config.auth_header() {
            request = request.header(AUTHORIZATION, auth);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = classify_failure(status, &body, job_id);
        warn!(job_id = %job_id, %status, error = %err, "Frappe request failed");
        Err(err)
    }

    async fn call<T>(&self, request: RequestBuilder, job_id: &JobId) -> Result<Option<T>, ServiceError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(request, job_id).await?;
        let envelope: MethodEnvelope<T> = response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;
        Ok(envelope.message)
    }

    async fn call_required<T>(&self, request: RequestBuilder, job_id: &JobId) -> Result<T, ServiceError>
    where
        T: DeserializeOwned,
    {
        self.call(request, job_id)
            .await?
            .ok_or_else(|| ServiceError::Decode("response has no message".to_string()))
    }

    async fn document(&self, request: RequestBuilder, job_id: &JobId) -> Result<ImportJob, ServiceError> {
        let response = self.send(request, job_id).await?;
        let envelope: ResourceEnvelope<JobDocument> = response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;
        ImportJob::try_from(envelope.data)
    }

    async fn download(&self, name: &str, job_id: &JobId) -> Result<Vec<u8>, ServiceError> {
        debug!(job_id = %job_id, method = name, "Downloading import export");
        let request = self
            .import_method(Method::POST, name)?
            .form(&[("data_import_name", job_id.as_str())]);
        let response = self.send(request, job_id).await?;
        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl JobControlService for FrappeClient {
    async fn start(&self, job_id: &JobId) -> Result<StartAck, ServiceError> {
        debug!(job_id = %job_id, "Requesting import start");
        let request = self
            .import_method(Method::POST, "form_start_import")?
            .json(&json!({ "data_import": job_id }));
        let ack = self.call::<StartAck>(request, job_id).await?;
        Ok(ack.unwrap_or_default())
    }

    async fn stop(&self, job_id: &JobId) -> Result<(), ServiceError> {
        debug!(job_id = %job_id, "Requesting import stop");
        let request = self
            .import_method(Method::POST, "stop_import")?
            .json(&json!({ "data_import": job_id }));
        self.send(request, job_id).await?;
        Ok(())
    }

    async fn fetch_job(&self, job_id: &JobId) -> Result<ImportJob, ServiceError> {
        let request = self.resource(Method::GET, job_id)?;
        self.document(request, job_id).await
    }

    async fn save(&self, job: &ImportJob) -> Result<ImportJob, ServiceError> {
        debug!(job_id = %job.id, "Saving import");
        let request = self
            .resource(Method::PUT, &job.id)?
            .json(&JobUpdate::from(job));
        self.document(request, &job.id).await
    }

    async fn status(&self, job_id: &JobId) -> Result<StatusReport, ServiceError> {
        let request = self
            .import_method(Method::GET, "get_import_status")?
            .query(&[("data_import_name", job_id.as_str())]);
        self.call_required(request, job_id).await
    }

    async fn running_job(&self) -> Result<Option<RunningJob>, ServiceError> {
        let request = self.import_method(Method::GET, "get_running_import_job")?;
        self.call(request, &JobId::new("")).await
    }

    async fn latest_error(&self, job_id: &JobId) -> Result<Option<ErrorReport>, ServiceError> {
        let filters = json!({ "method": job_id }).to_string();
        let fields = json!(["method", "error"]).to_string();
        let request = self.method(Method::GET, "frappe.client.get_list")?.query(&[
            ("doctype", ERROR_LOG_DOCTYPE),
            ("filters", filters.as_str()),
            ("fields", fields.as_str()),
            ("order_by", "creation desc"),
            ("limit_page_length", "1"),
        ]);

        let reports: Option<Vec<ErrorReport>> = self.call(request, job_id).await?;
        Ok(reports.and_then(|reports| reports.into_iter().next()))
    }
}

#[async_trait]
impl LogService for FrappeClient {
    async fn logs(&self, job_id: &JobId) -> Result<Vec<LogRecord>, ServiceError> {
        let request = self
            .import_method(Method::GET, "get_import_logs")?
            .query(&[("data_import", job_id.as_str())]);
        let raw: Option<Vec<RawLogRecord>> = self.call(request, job_id).await?;

        Ok(raw
            .unwrap_or_default()
            .into_iter()
            .map(LogRecord::from)
            .collect())
    }

    async fn log_count(&self, job_id: &JobId) -> Result<u64, ServiceError> {
        let filters = json!({ "data_import": job_id }).to_string();
        let request = self
            .method(Method::GET, "frappe.client.get_count")?
            .query(&[("doctype", LOG_DOCTYPE), ("filters", filters.as_str())]);
        Ok(self.call::<u64>(request, job_id).await?.unwrap_or(0))
    }

    async fn errored_rows(&self, job_id: &JobId) -> Result<Vec<u8>, ServiceError> {
        self.download("download_errored_template", job_id).await
    }

    async fn full_log(&self, job_id: &JobId) -> Result<Vec<u8>, ServiceError> {
        self.download("download_import_log", job_id).await
    }
}

fn transport_error(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        ServiceError::Timeout
    } else if err.is_decode() {
        ServiceError::Decode(err.to_string())
    } else {
        ServiceError::Transport(err.to_string())
    }
}

fn classify_failure(status: StatusCode, body: &str, job_id: &JobId) -> ServiceError {
    let error: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let reason = error.summary().unwrap_or_else(|| status.to_string());

    if status == StatusCode::NOT_FOUND || error.is_missing_document() {
        return ServiceError::NotFound(job_id.clone());
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ServiceError::Rejected(reason),
        _ => ServiceError::Transport(format!("{status}: {reason}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frappe::config::DEFAULT_METHOD_ROOT;
    use model::status::JobStatus;
    use std::time::Duration;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, header, method, path, query_param},
    };

    fn method_path(name: &str) -> String {
        format!("/api/method/{DEFAULT_METHOD_ROOT}.{name}")
    }

    fn client(server: &MockServer) -> FrappeClient {
        let config = FrappeConfig::new(&server.uri())
            .unwrap()
            .with_credentials("key", "secret");
        FrappeClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn fetches_job_document_with_token_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/resource/Data%20Import%20Custom/DIC-0001"))
            .and(header("authorization", "token key:secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "name": "DIC-0001",
                    "status": "Running",
                    "import_type": "Insert New Records",
                    "reference_doctype": "Customer",
                    "import_file": "/private/files/customers.csv",
                    "payload_count": 40
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let job = client(&server)
            .fetch_job(&JobId::new("DIC-0001"))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.totals.total_records, 40);
        assert_eq!(job.reference_doctype, "Customer");
    }

    #[tokio::test]
    async fn missing_document_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "exc_type": "DoesNotExistError"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .fetch_job(&JobId::new("DIC-404"))
            .await
            .unwrap_err();

        assert_eq!(err, ServiceError::NotFound(JobId::new("DIC-404")));
    }

    #[tokio::test]
    async fn does_not_exist_error_on_a_method_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(method_path("get_import_status")))
            .respond_with(ResponseTemplate::new(417).set_body_json(json!({
                "exc_type": "DoesNotExistError",
                "exception": "Data Import Custom DIC-9 not found"
            })))
            .mount(&server)
            .await;

        let err = client(&server).status(&JobId::new("DIC-9")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn status_unwraps_message_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(method_path("get_import_status")))
            .and(query_param("data_import_name", "DIC-0001"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"status": "Partial Success", "success": 7, "failed": 3, "total_records": 10}
            })))
            .mount(&server)
            .await;

        let report = client(&server).status(&JobId::new("DIC-0001")).await.unwrap();

        assert_eq!(report.status, JobStatus::PartialSuccess);
        assert_eq!((report.success, report.failed, report.total_records), (7, 3, 10));
    }

    #[tokio::test]
    async fn start_and_stop_post_the_job_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(method_path("form_start_import")))
            .and(body_json(json!({"data_import": "DIC-0001"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"message": "Import job queued, processing in background."}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(method_path("stop_import")))
            .and(body_json(json!({"data_import": "DIC-0001"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"message": "Import Stopped..."}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let job_id = JobId::new("DIC-0001");

        let ack = client.start(&job_id).await.unwrap();
        assert_eq!(ack.message, "Import job queued, processing in background.");
        client.stop(&job_id).await.unwrap();
    }

    #[tokio::test]
    async fn permission_errors_are_rejections() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "exc_type": "PermissionError",
                "_server_messages": "[\"{\\\"message\\\": \\\"Not permitted\\\"}\"]"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .start(&JobId::new("DIC-0001"))
            .await
            .unwrap_err();

        assert_eq!(err, ServiceError::Rejected("Not permitted".into()));
    }

    #[tokio::test]
    async fn server_errors_are_transport_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = client(&server)
            .logs(&JobId::new("DIC-0001"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Transport(reason) if reason.starts_with("502")));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let config = FrappeConfig::new(&server.uri())
            .unwrap()
            .with_timeout(Duration::from_millis(100));
        let err = FrappeClient::new(config)
            .unwrap()
            .status(&JobId::new("DIC-0001"))
            .await
            .unwrap_err();

        assert_eq!(err, ServiceError::Timeout);
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let err = client(&server)
            .status(&JobId::new("DIC-0001"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Decode(_)));
    }

    #[tokio::test]
    async fn logs_recover_malformed_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(method_path("get_import_logs")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": [
                    {"success": 1, "docname": "CUST-0001", "messages": "[]", "exception": null, "row_indexes": "[2]"},
                    {"success": 0, "docname": null, "messages": "[{\"message\": \"Bad email\"}]", "exception": "Traceback", "row_indexes": "[3,"}
                ]
            })))
            .mount(&server)
            .await;

        let logs = client(&server).logs(&JobId::new("DIC-0001")).await.unwrap();

        assert_eq!(logs.len(), 2);
        assert!(logs[0].succeeded);
        assert_eq!(logs[1].row_indexes.to_string(), "[3,");
        assert_eq!(logs[1].messages[0].message, "Bad email");
    }

    #[tokio::test]
    async fn log_count_and_error_report_use_client_methods() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/method/frappe.client.get_count"))
            .and(query_param("doctype", "Data Import Log"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": 12})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/method/frappe.client.get_list"))
            .and(query_param("doctype", "Error Log"))
            .and(query_param("limit_page_length", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": [{"method": "DIC-0001", "error": "Traceback (most recent call last)"}]
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let job_id = JobId::new("DIC-0001");

        assert_eq!(client.log_count(&job_id).await.unwrap(), 12);
        let report = client.latest_error(&job_id).await.unwrap().unwrap();
        assert_eq!(report.method, "DIC-0001");
    }

    #[tokio::test]
    async fn running_job_may_be_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(method_path("get_running_import_job")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        assert_eq!(client(&server).running_job().await.unwrap(), None);
    }

    #[tokio::test]
    async fn exports_are_raw_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(method_path("download_errored_template")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"Name,Error\n".to_vec()))
            .mount(&server)
            .await;

        let bytes = client(&server)
            .errored_rows(&JobId::new("DIC-0001"))
            .await
            .unwrap();
        assert_eq!(bytes, b"Name,Error\n");
    }
}
