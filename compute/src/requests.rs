//! One request type per disks operation: path identifiers, optional query
//! parameters and, for mutating calls, the body resource.

use std::fmt::Display;

use http::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::{
    Disk, DiskAggregatedList, DiskList, DisksAddResourcePoliciesRequest,
    DisksRemoveResourcePoliciesRequest, DisksResizeRequest, Operation, Policy, Snapshot,
    TestPermissionsRequest, TestPermissionsResponse, ZoneSetLabelsRequest, ZoneSetPolicyRequest,
};

/// Query parameters, kept in the order they are pushed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(&'static str, String)>);

impl QueryParams {
    /// Add `key` only when a value is set.
    pub fn push<T: Display>(&mut self, key: &'static str, value: Option<&T>) {
        if let Some(value) = value {
            self.0.push((key, value.to_string()));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

/// How a request maps onto the REST surface.
///
/// `path` returns the segments following `compute/v1/projects`; each is
/// percent-encoded on its own when the URL is built.
pub trait DisksRequest: Send + Sync {
    type Body: Serialize + Send + Sync;
    type Response: DeserializeOwned + Send;

    const OPERATION: &'static str;
    const METHOD: Method;

    fn path(&self) -> Vec<&str>;

    fn query(&self) -> QueryParams {
        QueryParams::default()
    }

    fn body(&self) -> Option<&Self::Body> {
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct AddResourcePoliciesDiskRequest {
    pub project: String,
    pub zone: String,
    pub disk: String,
    pub request_id: Option<String>,
    pub body: DisksAddResourcePoliciesRequest,
}

impl DisksRequest for AddResourcePoliciesDiskRequest {
    type Body = DisksAddResourcePoliciesRequest;
    type Response = Operation;

    const OPERATION: &'static str = "add_resource_policies";
    const METHOD: Method = Method::POST;

    fn path(&self) -> Vec<&str> {
        vec![
            self.project.as_str(),
            "zones",
            self.zone.as_str(),
            "disks",
            self.disk.as_str(),
            "addResourcePolicies",
        ]
    }

    fn query(&self) -> QueryParams {
        let mut params = QueryParams::default();
        params.push("requestId", self.request_id.as_ref());
        params
    }

    fn body(&self) -> Option<&Self::Body> {
        Some(&self.body)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AggregatedListDisksRequest {
    pub project: String,
    pub filter: Option<String>,
    pub include_all_scopes: Option<bool>,
    pub max_results: Option<u32>,
    pub order_by: Option<String>,
    pub page_token: Option<String>,
    pub return_partial_success: Option<bool>,
}

impl DisksRequest for AggregatedListDisksRequest {
    type Body = ();
    type Response = DiskAggregatedList;

    const OPERATION: &'static str = "aggregated_list";
    const METHOD: Method = Method::GET;

    fn path(&self) -> Vec<&str> {
        vec![self.project.as_str(), "aggregated", "disks"]
    }

    fn query(&self) -> QueryParams {
        let mut params = QueryParams::default();
        params.push("filter", self.filter.as_ref());
        params.push("includeAllScopes", self.include_all_scopes.as_ref());
        params.push("maxResults", self.max_results.as_ref());
        params.push("orderBy", self.order_by.as_ref());
        params.push("pageToken", self.page_token.as_ref());
        params.push("returnPartialSuccess", self.return_partial_success.as_ref());
        params
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateSnapshotDiskRequest {
    pub project: String,
    pub zone: String,
    pub disk: String,
    pub guest_flush: Option<bool>,
    pub request_id: Option<String>,
    pub body: Snapshot,
}

impl DisksRequest for CreateSnapshotDiskRequest {
    type Body = Snapshot;
    type Response = Operation;

    const OPERATION: &'static str = "create_snapshot";
    const METHOD: Method = Method::POST;

    fn path(&self) -> Vec<&str> {
        vec![
            self.project.as_str(),
            "zones",
            self.zone.as_str(),
            "disks",
            self.disk.as_str(),
            "createSnapshot",
        ]
    }

    fn query(&self) -> QueryParams {
        let mut params = QueryParams::default();
        params.push("guestFlush", self.guest_flush.as_ref());
        params.push("requestId", self.request_id.as_ref());
        params
    }

    fn body(&self) -> Option<&Self::Body> {
        Some(&self.body)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeleteDiskRequest {
    pub project: String,
    pub zone: String,
    pub disk: String,
    pub request_id: Option<String>,
}

impl DisksRequest for DeleteDiskRequest {
    type Body = ();
    type Response = Operation;

    const OPERATION: &'static str = "delete";
    const METHOD: Method = Method::DELETE;

    fn path(&self) -> Vec<&str> {
        vec![
            self.project.as_str(),
            "zones",
            self.zone.as_str(),
            "disks",
            self.disk.as_str(),
        ]
    }

    fn query(&self) -> QueryParams {
        let mut params = QueryParams::default();
        params.push("requestId", self.request_id.as_ref());
        params
    }
}

#[derive(Debug, Clone, Default)]
pub struct GetDiskRequest {
    pub project: String,
    pub zone: String,
    pub disk: String,
}

impl DisksRequest for GetDiskRequest {
    type Body = ();
    type Response = Disk;

    const OPERATION: &'static str = "get";
    const METHOD: Method = Method::GET;

    fn path(&self) -> Vec<&str> {
        vec![
            self.project.as_str(),
            "zones",
            self.zone.as_str(),
            "disks",
            self.disk.as_str(),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct GetIamPolicyDiskRequest {
    pub project: String,
    pub zone: String,
    pub resource: String,
    pub options_requested_policy_version: Option<i32>,
}

impl DisksRequest for GetIamPolicyDiskRequest {
    type Body = ();
    type Response = Policy;

    const OPERATION: &'static str = "get_iam_policy";
    const METHOD: Method = Method::GET;

    fn path(&self) -> Vec<&str> {
        vec![
            self.project.as_str(),
            "zones",
            self.zone.as_str(),
            "disks",
            self.resource.as_str(),
            "getIamPolicy",
        ]
    }

    fn query(&self) -> QueryParams {
        let mut params = QueryParams::default();
        params.push(
            "optionsRequestedPolicyVersion",
            self.options_requested_policy_version.as_ref(),
        );
        params
    }
}

#[derive(Debug, Clone, Default)]
pub struct InsertDiskRequest {
    pub project: String,
    pub zone: String,
    pub request_id: Option<String>,
    pub source_image: Option<String>,
    pub body: Disk,
}

impl DisksRequest for InsertDiskRequest {
    type Body = Disk;
    type Response = Operation;

    const OPERATION: &'static str = "insert";
    const METHOD: Method = Method::POST;

    fn path(&self) -> Vec<&str> {
        vec![self.project.as_str(), "zones", self.zone.as_str(), "disks"]
    }

    fn query(&self) -> QueryParams {
        let mut params = QueryParams::default();
        params.push("requestId", self.request_id.as_ref());
        params.push("sourceImage", self.source_image.as_ref());
        params
    }

    fn body(&self) -> Option<&Self::Body> {
        Some(&self.body)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListDisksRequest {
    pub project: String,
    pub zone: String,
    pub filter: Option<String>,
    pub max_results: Option<u32>,
    pub order_by: Option<String>,
    pub page_token: Option<String>,
    pub return_partial_success: Option<bool>,
}

impl DisksRequest for ListDisksRequest {
    type Body = ();
    type Response = DiskList;

    const OPERATION: &'static str = "list";
    const METHOD: Method = Method::GET;

    fn path(&self) -> Vec<&str> {
        vec![self.project.as_str(), "zones", self.zone.as_str(), "disks"]
    }

    fn query(&self) -> QueryParams {
        let mut params = QueryParams::default();
        params.push("filter", self.filter.as_ref());
        params.push("maxResults", self.max_results.as_ref());
        params.push("orderBy", self.order_by.as_ref());
        params.push("pageToken", self.page_token.as_ref());
        params.push("returnPartialSuccess", self.return_partial_success.as_ref());
        params
    }
}

#[derive(Debug, Clone, Default)]
pub struct RemoveResourcePoliciesDiskRequest {
    pub project: String,
    pub zone: String,
    pub disk: String,
    pub request_id: Option<String>,
    pub body: DisksRemoveResourcePoliciesRequest,
}

impl DisksRequest for RemoveResourcePoliciesDiskRequest {
    type Body = DisksRemoveResourcePoliciesRequest;
    type Response = Operation;

    const OPERATION: &'static str = "remove_resource_policies";
    const METHOD: Method = Method::POST;

    fn path(&self) -> Vec<&str> {
        vec![
            self.project.as_str(),
            "zones",
            self.zone.as_str(),
            "disks",
            self.disk.as_str(),
            "removeResourcePolicies",
        ]
    }

    fn query(&self) -> QueryParams {
        let mut params = QueryParams::default();
        params.push("requestId", self.request_id.as_ref());
        params
    }

    fn body(&self) -> Option<&Self::Body> {
        Some(&self.body)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResizeDiskRequest {
    pub project: String,
    pub zone: String,
    pub disk: String,
    pub request_id: Option<String>,
    pub body: DisksResizeRequest,
}

impl DisksRequest for ResizeDiskRequest {
    type Body = DisksResizeRequest;
    type Response = Operation;

    const OPERATION: &'static str = "resize";
    const METHOD: Method = Method::POST;

    fn path(&self) -> Vec<&str> {
        vec![
            self.project.as_str(),
            "zones",
            self.zone.as_str(),
            "disks",
            self.disk.as_str(),
            "resize",
        ]
    }

    fn query(&self) -> QueryParams {
        let mut params = QueryParams::default();
        params.push("requestId", self.request_id.as_ref());
        params
    }

    fn body(&self) -> Option<&Self::Body> {
        Some(&self.body)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SetIamPolicyDiskRequest {
    pub project: String,
    pub zone: String,
    pub resource: String,
    pub body: ZoneSetPolicyRequest,
}

impl DisksRequest for SetIamPolicyDiskRequest {
    type Body = ZoneSetPolicyRequest;
    type Response = Policy;

    const OPERATION: &'static str = "set_iam_policy";
    const METHOD: Method = Method::POST;

    fn path(&self) -> Vec<&str> {
        vec![
            self.project.as_str(),
            "zones",
            self.zone.as_str(),
            "disks",
            self.resource.as_str(),
            "setIamPolicy",
        ]
    }

    fn body(&self) -> Option<&Self::Body> {
        Some(&self.body)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SetLabelsDiskRequest {
    pub project: String,
    pub zone: String,
    pub resource: String,
    pub request_id: Option<String>,
    pub body: ZoneSetLabelsRequest,
}

impl DisksRequest for SetLabelsDiskRequest {
    type Body = ZoneSetLabelsRequest;
    type Response = Operation;

    const OPERATION: &'static str = "set_labels";
    const METHOD: Method = Method::POST;

    fn path(&self) -> Vec<&str> {
        vec![
            self.project.as_str(),
            "zones",
            self.zone.as_str(),
            "disks",
            self.resource.as_str(),
            "setLabels",
        ]
    }

    fn query(&self) -> QueryParams {
        let mut params = QueryParams::default();
        params.push("requestId", self.request_id.as_ref());
        params
    }

    fn body(&self) -> Option<&Self::Body> {
        Some(&self.body)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestIamPermissionsDiskRequest {
    pub project: String,
    pub zone: String,
    pub resource: String,
    pub body: TestPermissionsRequest,
}

impl DisksRequest for TestIamPermissionsDiskRequest {
    type Body = TestPermissionsRequest;
    type Response = TestPermissionsResponse;

    const OPERATION: &'static str = "test_iam_permissions";
    const METHOD: Method = Method::POST;

    fn path(&self) -> Vec<&str> {
        vec![
            self.project.as_str(),
            "zones",
            self.zone.as_str(),
            "disks",
            self.resource.as_str(),
            "testIamPermissions",
        ]
    }

    fn body(&self) -> Option<&Self::Body> {
        Some(&self.body)
    }
}
