//! JSON:API document shapes and error envelopes.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::error;
use tracker_core::{
    AssigneeRef, CoreError, Relationships, WorkItem, SYSTEM_ASSIGNEE,
};

/// Resource type of work items.
pub const TYPE_WORK_ITEMS: &str = "workitems";
/// Resource type of work item types.
pub const TYPE_WORK_ITEM_TYPES: &str = "workitemtypes";
/// Resource type of identities.
pub const TYPE_IDENTITIES: &str = "identities";

pub const ERROR_CODE_NOT_FOUND: &str = "not_found";
pub const ERROR_CODE_BAD_PARAMETER: &str = "bad_parameter";
pub const ERROR_CODE_VERSION_CONFLICT: &str = "version_conflict";
pub const ERROR_CODE_INTERNAL_ERROR: &str = "internal_error";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssigneeData {
    /// `null` removes the assignee.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationAssignee {
    /// `null` removes the assignee.
    #[serde(default)]
    pub data: Option<AssigneeData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationBaseType {
    pub data: ResourceIdentifier,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemRelationships {
    #[serde(rename = "baseType", default, skip_serializing_if = "Option::is_none")]
    pub base_type: Option<RelationBaseType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<RelationAssignee>,
}

impl WorkItemRelationships {
    /// The relationship changes requested by this block.
    #[must_use]
    pub fn to_relationships(&self) -> Relationships {
        let assignee = self.assignee.as_ref().map(|rel| {
            match rel.data.as_ref().and_then(|d| d.id.as_ref()) {
                Some(id) => AssigneeRef::Set(id.clone()),
                None => AssigneeRef::Clear,
            }
        });
        Relationships { assignee }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLinks {
    #[serde(rename = "self")]
    pub self_link: String,
}

/// A work item resource object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItemData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<WorkItemRelationships>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<ResourceLinks>,
}

impl WorkItemData {
    /// Render a stored work item. `attributes` must be its wire form; the
    /// assignee is moved from the attributes into the relationships.
    #[must_use]
    pub fn from_work_item(item: &WorkItem, mut attributes: Map<String, Value>, base_url: &str) -> Self {
        let assignee = attributes
            .remove(SYSTEM_ASSIGNEE)
            .and_then(|v| v.as_str().map(String::from))
            .map(|id| RelationAssignee {
                data: Some(AssigneeData {
                    id: Some(id),
                    kind: Some(TYPE_IDENTITIES.to_string()),
                }),
            });

        Self {
            id: Some(item.id.to_string()),
            kind: TYPE_WORK_ITEMS.to_string(),
            attributes,
            relationships: Some(WorkItemRelationships {
                base_type: Some(RelationBaseType {
                    data: ResourceIdentifier {
                        id: item.type_name.clone(),
                        kind: TYPE_WORK_ITEM_TYPES.to_string(),
                    },
                }),
                assignee,
            }),
            links: Some(ResourceLinks {
                self_link: format!("{base_url}/api/{TYPE_WORK_ITEMS}/{}", item.id),
            }),
        }
    }

    /// Check the resource type names work items.
    ///
    /// # Errors
    /// Returns `CoreError::BadParameter` for any other type.
    pub fn expect_work_item(&self) -> Result<(), CoreError> {
        if self.kind == TYPE_WORK_ITEMS {
            Ok(())
        } else {
            Err(CoreError::bad_parameter("data.type", &self.kind))
        }
    }
}

/// Single-resource document, used for requests and responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItemDocument {
    pub data: WorkItemData,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMeta {
    #[serde(rename = "totalCount")]
    pub total_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItemListDocument {
    pub links: PagingLinks,
    pub meta: ListMeta,
    pub data: Vec<WorkItemData>,
}

/// A JSON:API error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonApiError {
    pub code: String,
    pub status: String,
    pub title: String,
    pub detail: String,
}

/// A JSON:API errors document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonApiErrors {
    pub errors: Vec<JsonApiError>,
}

/// Error returned by handlers.
#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl ApiError {
    /// The JSON:API representation of the error and its status code.
    ///
    /// Internal errors are logged here and answered with a generic detail.
    #[must_use]
    pub fn to_jsonapi(&self) -> (JsonApiError, StatusCode) {
        let (code, title, status) = match &self.0 {
            CoreError::NotFound { .. } => {
                (ERROR_CODE_NOT_FOUND, "Not found error", StatusCode::NOT_FOUND)
            }
            CoreError::BadParameter { .. } => (
                ERROR_CODE_BAD_PARAMETER,
                "Bad parameter error",
                StatusCode::BAD_REQUEST,
            ),
            CoreError::VersionConflict(_) => (
                ERROR_CODE_VERSION_CONFLICT,
                "Version conflict error",
                StatusCode::BAD_REQUEST,
            ),
            CoreError::Internal(_) => (
                ERROR_CODE_INTERNAL_ERROR,
                "Internal error",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        };

        let detail = if let CoreError::Internal(detail) = &self.0 {
            error!(detail = %detail, "Internal error");
            "internal error".to_string()
        } else {
            self.0.to_string()
        };

        let err = JsonApiError {
            code: code.to_string(),
            status: status.as_u16().to_string(),
            title: title.to_string(),
            detail,
        };
        (err, status)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (err, status) = self.to_jsonapi();
        (status, Json(JsonApiErrors { errors: vec![err] })).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}
