use std::time;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::ComputeError;
use crate::requests::{
    AddResourcePoliciesDiskRequest, AggregatedListDisksRequest, CreateSnapshotDiskRequest,
    DeleteDiskRequest, GetDiskRequest, GetIamPolicyDiskRequest, InsertDiskRequest,
    ListDisksRequest, RemoveResourcePoliciesDiskRequest, ResizeDiskRequest,
    SetIamPolicyDiskRequest, SetLabelsDiskRequest, TestIamPermissionsDiskRequest,
};
use crate::rest::DisksRestClient;
use crate::retry::RetryPolicy;
use crate::types::{
    Disk, DiskAggregatedList, DiskList, Operation, Policy, TestPermissionsResponse,
};

/// Retry behaviour of a single operation. The default attempts a call once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallSettings {
    pub retry_policy: Option<RetryPolicy>,
    /// Total attempts, including the first one.
    pub max_attempts: u32,
}

impl CallSettings {
    pub fn with_retries(retry_policy: RetryPolicy, max_attempts: u32) -> Self {
        Self {
            retry_policy: Some(retry_policy),
            max_attempts,
        }
    }

    /// Whether a call that failed with `error` on its `attempt`-th try (1-based) should go again.
    pub fn should_retry(&self, error: &ComputeError, attempt: u32) -> bool {
        self.retry_policy.is_some() && attempt < self.max_attempts && error.is_retryable()
    }

    pub fn retry_interval(
        &self,
        attempt: u32,
        retry_after: Option<time::Duration>,
    ) -> time::Duration {
        self.retry_policy
            .unwrap_or_default()
            .time_until_next_retry(attempt.saturating_sub(1), retry_after)
    }
}

/// Settings for each operation of [`DisksClient`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DisksCallOptions {
    pub add_resource_policies: CallSettings,
    pub aggregated_list: CallSettings,
    pub create_snapshot: CallSettings,
    pub delete: CallSettings,
    pub get: CallSettings,
    pub get_iam_policy: CallSettings,
    pub insert: CallSettings,
    pub list: CallSettings,
    pub remove_resource_policies: CallSettings,
    pub resize: CallSettings,
    pub set_iam_policy: CallSettings,
    pub set_labels: CallSettings,
    pub test_iam_permissions: CallSettings,
}

impl DisksCallOptions {
    /// Retry the read-only operations. Mutations are attempted once, as a
    /// repeated insert or resize may not be idempotent.
    pub fn from_config(config: &Config) -> Self {
        if config.max_attempts <= 1 {
            return Self::default();
        }

        let settings =
            CallSettings::with_retries(config.retry_policy.provide(), config.max_attempts);

        Self {
            aggregated_list: settings,
            get: settings,
            get_iam_policy: settings,
            list: settings,
            test_iam_permissions: settings,
            ..Self::default()
        }
    }
}

/// Transport behind [`DisksClient`].
#[async_trait]
pub trait DisksApi: Send + Sync {
    /// Adds existing resource policies to a disk.
    async fn add_resource_policies(
        &self,
        request: &AddResourcePoliciesDiskRequest,
        settings: &CallSettings,
    ) -> Result<Operation, ComputeError>;

    /// Retrieves disks across all scopes of a project, grouped by scope.
    async fn aggregated_list(
        &self,
        request: &AggregatedListDisksRequest,
        settings: &CallSettings,
    ) -> Result<DiskAggregatedList, ComputeError>;

    async fn create_snapshot(
        &self,
        request: &CreateSnapshotDiskRequest,
        settings: &CallSettings,
    ) -> Result<Operation, ComputeError>;

    /// Deletes a disk. Snapshots taken from it are kept.
    async fn delete(
        &self,
        request: &DeleteDiskRequest,
        settings: &CallSettings,
    ) -> Result<Operation, ComputeError>;

    async fn get(
        &self,
        request: &GetDiskRequest,
        settings: &CallSettings,
    ) -> Result<Disk, ComputeError>;

    async fn get_iam_policy(
        &self,
        request: &GetIamPolicyDiskRequest,
        settings: &CallSettings,
    ) -> Result<Policy, ComputeError>;

    async fn insert(
        &self,
        request: &InsertDiskRequest,
        settings: &CallSettings,
    ) -> Result<Operation, ComputeError>;

    /// Retrieves one page of the disks in a zone.
    async fn list(
        &self,
        request: &ListDisksRequest,
        settings: &CallSettings,
    ) -> Result<DiskList, ComputeError>;

    async fn remove_resource_policies(
        &self,
        request: &RemoveResourcePoliciesDiskRequest,
        settings: &CallSettings,
    ) -> Result<Operation, ComputeError>;

    /// Grows a disk. Disks can't be shrunk.
    async fn resize(
        &self,
        request: &ResizeDiskRequest,
        settings: &CallSettings,
    ) -> Result<Operation, ComputeError>;

    /// Replaces any existing policy on the disk.
    async fn set_iam_policy(
        &self,
        request: &SetIamPolicyDiskRequest,
        settings: &CallSettings,
    ) -> Result<Policy, ComputeError>;

    async fn set_labels(
        &self,
        request: &SetLabelsDiskRequest,
        settings: &CallSettings,
    ) -> Result<Operation, ComputeError>;

    async fn test_iam_permissions(
        &self,
        request: &TestIamPermissionsDiskRequest,
        settings: &CallSettings,
    ) -> Result<TestPermissionsResponse, ComputeError>;

    /// Rebuild the `x-goog-api-client` header around the given key-value pairs.
    fn set_google_client_info(&mut self, keyval: &[(&str, &str)]) -> Result<(), ComputeError>;

    /// Release the underlying connection. Later calls fail with [`ComputeError::Closed`].
    fn close(&mut self);
}

/// Client for the Compute Engine disks API.
///
/// Every operation is routed to the transport with its entry of `call_options`.
pub struct DisksClient {
    api: Box<dyn DisksApi>,
    pub call_options: DisksCallOptions,
}

impl DisksClient {
    /// Create a client speaking REST to `config.endpoint`.
    pub fn new(config: &Config) -> Result<Self, ComputeError> {
        let api = DisksRestClient::new(config)?;
        info!(endpoint = %config.endpoint, "created disks client");

        Ok(Self {
            api: Box::new(api),
            call_options: DisksCallOptions::from_config(config),
        })
    }

    pub fn from_api(api: Box<dyn DisksApi>, call_options: DisksCallOptions) -> Self {
        Self { api, call_options }
    }

    pub async fn add_resource_policies(
        &self,
        request: &AddResourcePoliciesDiskRequest,
    ) -> Result<Operation, ComputeError> {
        self.api
            .add_resource_policies(request, &self.call_options.add_resource_policies)
            .await
    }

    pub async fn aggregated_list(
        &self,
        request: &AggregatedListDisksRequest,
    ) -> Result<DiskAggregatedList, ComputeError> {
        self.api
            .aggregated_list(request, &self.call_options.aggregated_list)
            .await
    }

    pub async fn create_snapshot(
        &self,
        request: &CreateSnapshotDiskRequest,
    ) -> Result<Operation, ComputeError> {
        self.api
            .create_snapshot(request, &self.call_options.create_snapshot)
            .await
    }

    pub async fn delete(&self, request: &DeleteDiskRequest) -> Result<Operation, ComputeError> {
        self.api.delete(request, &self.call_options.delete).await
    }

    pub async fn get(&self, request: &GetDiskRequest) -> Result<Disk, ComputeError> {
        self.api.get(request, &self.call_options.get).await
    }

    pub async fn get_iam_policy(
        &self,
        request: &GetIamPolicyDiskRequest,
    ) -> Result<Policy, ComputeError> {
        self.api
            .get_iam_policy(request, &self.call_options.get_iam_policy)
            .await
    }

    pub async fn insert(&self, request: &InsertDiskRequest) -> Result<Operation, ComputeError> {
        self.api.insert(request, &self.call_options.insert).await
    }

    pub async fn list(&self, request: &ListDisksRequest) -> Result<DiskList, ComputeError> {
        self.api.list(request, &self.call_options.list).await
    }

    /// Fetch every page of `list`, starting from `request.page_token`.
    pub async fn list_all(&self, request: &ListDisksRequest) -> Result<Vec<Disk>, ComputeError> {
        let mut request = request.clone();
        let mut disks = Vec::new();

        loop {
            let page = self.list(&request).await?;
            debug!(count = page.items.len(), "fetched page of disks");
            disks.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => request.page_token = Some(token),
                _ => return Ok(disks),
            }
        }
    }

    pub async fn remove_resource_policies(
        &self,
        request: &RemoveResourcePoliciesDiskRequest,
    ) -> Result<Operation, ComputeError> {
        self.api
            .remove_resource_policies(request, &self.call_options.remove_resource_policies)
            .await
    }

    pub async fn resize(&self, request: &ResizeDiskRequest) -> Result<Operation, ComputeError> {
        self.api.resize(request, &self.call_options.resize).await
    }

    pub async fn set_iam_policy(
        &self,
        request: &SetIamPolicyDiskRequest,
    ) -> Result<Policy, ComputeError> {
        self.api
            .set_iam_policy(request, &self.call_options.set_iam_policy)
            .await
    }

    pub async fn set_labels(
        &self,
        request: &SetLabelsDiskRequest,
    ) -> Result<Operation, ComputeError> {
        self.api
            .set_labels(request, &self.call_options.set_labels)
            .await
    }

    pub async fn test_iam_permissions(
        &self,
        request: &TestIamPermissionsDiskRequest,
    ) -> Result<TestPermissionsResponse, ComputeError> {
        self.api
            .test_iam_permissions(request, &self.call_options.test_iam_permissions)
            .await
    }

    pub fn set_google_client_info(&mut self, keyval: &[(&str, &str)]) -> Result<(), ComputeError> {
        self.api.set_google_client_info(keyval)
    }

    /// Close the connection to the API. The client can't be used afterwards.
    pub fn close(&mut self) {
        self.api.close()
    }
}
