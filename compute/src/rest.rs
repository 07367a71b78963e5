use std::time;

use async_trait::async_trait;
use http::{HeaderValue, Method, StatusCode};
use reqwest::header;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::Config;
use crate::disks::{CallSettings, DisksApi};
use crate::error::ComputeError;
use crate::requests::{
    AddResourcePoliciesDiskRequest, AggregatedListDisksRequest, CreateSnapshotDiskRequest,
    DeleteDiskRequest, DisksRequest, GetDiskRequest, GetIamPolicyDiskRequest, InsertDiskRequest,
    ListDisksRequest, RemoveResourcePoliciesDiskRequest, ResizeDiskRequest,
    SetIamPolicyDiskRequest, SetLabelsDiskRequest, TestIamPermissionsDiskRequest,
};
use crate::retry::parse_retry_after_header;
use crate::types::{
    Disk, DiskAggregatedList, DiskList, Operation, Policy, TestPermissionsResponse,
};

pub const X_GOOG_API_CLIENT: &str = "x-goog-api-client";

/// Version of this client, reported as `gapic/<version>`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const API_PATH: [&str; 3] = ["compute", "v1", "projects"];

/// Join key-value pairs as `key/value` separated by spaces.
pub fn x_goog_header(keyval: &[(&str, &str)]) -> String {
    keyval
        .iter()
        .map(|(k, v)| format!("{}/{}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

fn rust_version() -> &'static str {
    option_env!("CARGO_PKG_RUST_VERSION")
        .filter(|v| !v.is_empty())
        .unwrap_or("UNKNOWN")
}

fn client_info_header(keyval: &[(&str, &str)]) -> Result<HeaderValue, ComputeError> {
    let mut kv = vec![("gl-rust", rust_version())];
    kv.extend_from_slice(keyval);
    kv.extend([("gapic", VERSION), ("rest", "UNKNOWN")]);

    Ok(HeaderValue::from_str(&x_goog_header(&kv))?)
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Prefer the message of a Google error envelope, then the raw body, then the status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => envelope.error.message,
        _ if !body.trim().is_empty() => body.trim().to_owned(),
        _ => status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_owned(),
    }
}

fn record_request_metrics<T>(
    operation: &'static str,
    result: &Result<T, ComputeError>,
    elapsed: time::Duration,
) {
    let status = match result {
        Ok(_) => StatusCode::OK.as_str().to_owned(),
        Err(error) => error
            .status()
            .map(|status| status.as_str().to_owned())
            .unwrap_or_else(|| "error".to_owned()),
    };
    let labels = [("operation", operation.to_owned()), ("status", status)];

    metrics::counter!("compute_requests_total", &labels).increment(1);
    metrics::histogram!("compute_request_duration_seconds", &labels)
        .record(elapsed.as_secs_f64());
}

/// Disks client speaking JSON over HTTP to the Compute Engine REST API.
pub struct DisksRestClient {
    /// Base URL every request path is appended to.
    endpoint: Url,
    /// `None` once the client has been closed.
    client: Option<reqwest::Client>,
    /// Value of the `x-goog-api-client` header sent with each request.
    x_goog_api_client: HeaderValue,
    access_token: Option<String>,
}

impl DisksRestClient {
    pub fn new(config: &Config) -> Result<Self, ComputeError> {
        let endpoint = Url::parse(&config.endpoint)?;
        if endpoint.cannot_be_a_base() {
            return Err(ComputeError::InvalidEndpoint(config.endpoint.clone()));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("compute-disks/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout.0)
            .build()?;

        Ok(Self {
            endpoint,
            client: Some(client),
            x_goog_api_client: client_info_header(&[])?,
            access_token: config.access_token.clone(),
        })
    }

    /// The `x-goog-api-client` value currently sent with each request.
    pub fn client_info(&self) -> &HeaderValue {
        &self.x_goog_api_client
    }

    fn url<R: DisksRequest>(&self, request: &R) -> Result<Url, ComputeError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| ComputeError::InvalidEndpoint(self.endpoint.to_string()))?
            .pop_if_empty()
            .extend(API_PATH)
            .extend(request.path());

        let query = request.query();
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter());
        }

        Ok(url)
    }

    #[instrument(skip_all, fields(operation = R::OPERATION))]
    async fn execute<R: DisksRequest>(
        &self,
        request: &R,
        settings: &CallSettings,
    ) -> Result<R::Response, ComputeError> {
        let client = self.client.as_ref().ok_or(ComputeError::Closed)?;
        let url = self.url(request)?;
        let body = request
            .body()
            .map(serde_json::to_vec)
            .transpose()
            .map_err(ComputeError::Encode)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(attempt, %url, "sending request");

            let start = time::Instant::now();
            let result = self
                .send(client, R::METHOD, url.clone(), body.clone())
                .await;
            record_request_metrics(R::OPERATION, &result, start.elapsed());

            match result {
                Err(error) if settings.should_retry(&error, attempt) => {
                    let interval = settings.retry_interval(attempt, error.retry_after());
                    warn!(attempt, ?interval, "retrying request: {}", error);
                    tokio::time::sleep(interval).await;
                }
                result => return result,
            }
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        client: &reqwest::Client,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<T, ComputeError> {
        let mut request = client
            .request(method, url)
            .header(X_GOOG_API_CLIENT, self.x_goog_api_client.clone());
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status != StatusCode::OK {
            let retry_after = parse_retry_after_header(response.headers());
            // The status is the error; an unreadable body only loses the message.
            let body = response.text().await.unwrap_or_default();

            return Err(ComputeError::Status {
                status,
                message: error_message(status, &body),
                retry_after,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(ComputeError::Decode)
    }
}

#[async_trait]
impl DisksApi for DisksRestClient {
    async fn add_resource_policies(
        &self,
        request: &AddResourcePoliciesDiskRequest,
        settings: &CallSettings,
    ) -> Result<Operation, ComputeError> {
        self.execute(request, settings).await
    }

    async fn aggregated_list(
        &self,
        request: &AggregatedListDisksRequest,
        settings: &CallSettings,
    ) -> Result<DiskAggregatedList, ComputeError> {
        self.execute(request, settings).await
    }

    async fn create_snapshot(
        &self,
        request: &CreateSnapshotDiskRequest,
        settings: &CallSettings,
    ) -> Result<Operation, ComputeError> {
        self.execute(request, settings).await
    }

    async fn delete(
        &self,
        request: &DeleteDiskRequest,
        settings: &CallSettings,
    ) -> Result<Operation, ComputeError> {
        self.execute(request, settings).await
    }

    async fn get(
        &self,
        request: &GetDiskRequest,
        settings: &CallSettings,
    ) -> Result<Disk, ComputeError> {
        self.execute(request, settings).await
    }

    async fn get_iam_policy(
        &self,
        request: &GetIamPolicyDiskRequest,
        settings: &CallSettings,
    ) -> Result<Policy, ComputeError> {
        self.execute(request, settings).await
    }

    async fn insert(
        &self,
        request: &InsertDiskRequest,
        settings: &CallSettings,
    ) -> Result<Operation, ComputeError> {
        self.execute(request, settings).await
    }

    async fn list(
        &self,
        request: &ListDisksRequest,
        settings: &CallSettings,
    ) -> Result<DiskList, ComputeError> {
        self.execute(request, settings).await
    }

    async fn remove_resource_policies(
        &self,
        request: &RemoveResourcePoliciesDiskRequest,
        settings: &CallSettings,
    ) -> Result<Operation, ComputeError> {
        self.execute(request, settings).await
    }

    async fn resize(
        &self,
        request: &ResizeDiskRequest,
        settings: &CallSettings,
    ) -> Result<Operation, ComputeError> {
        self.execute(request, settings).await
    }

    async fn set_iam_policy(
        &self,
        request: &SetIamPolicyDiskRequest,
        settings: &CallSettings,
    ) -> Result<Policy, ComputeError> {
        self.execute(request, settings).await
    }

    async fn set_labels(
        &self,
        request: &SetLabelsDiskRequest,
        settings: &CallSettings,
    ) -> Result<Operation, ComputeError> {
        self.execute(request, settings).await
    }

    async fn test_iam_permissions(
        &self,
        request: &TestIamPermissionsDiskRequest,
        settings: &CallSettings,
    ) -> Result<TestPermissionsResponse, ComputeError> {
        self.execute(request, settings).await
    }

    fn set_google_client_info(&mut self, keyval: &[(&str, &str)]) -> Result<(), ComputeError> {
        self.x_goog_api_client = client_info_header(keyval)?;
        Ok(())
    }

    fn close(&mut self) {
        // Dropping the client releases its connection pool.
        self.client = None;
    }
}
