//! HTTP server exposing work items as JSON:API resources.

pub mod jsonapi;

use anyhow::Result;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use jsonapi::{
    ApiError, ListMeta, PagingLinks, WorkItemData, WorkItemDocument, WorkItemListDocument,
    TYPE_WORK_ITEMS, TYPE_WORK_ITEM_TYPES,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracker_core::{
    CoreError, ItemFilter, NewWorkItem, PageLink, PageRequest, PartialUpdate, WorkItem,
    WorkItemType,
};
use tracker_store::{PagingSettings, TypeStore, WorkItemRepository};

/// Server state shared across handlers.
///
/// The repository is swapped whole when a type is added, so a request keeps
/// the schema snapshot it started with.
pub struct AppState {
    repository: RwLock<WorkItemRepository>,
    types: Arc<dyn TypeStore>,
    paging: PagingSettings,
    /// Used for links when a request carries no `Host` header.
    default_authority: String,
}

impl AppState {
    #[must_use]
    pub fn new(
        repository: WorkItemRepository,
        types: Arc<dyn TypeStore>,
        paging: PagingSettings,
        default_authority: impl Into<String>,
    ) -> Self {
        Self {
            repository: RwLock::new(repository),
            types,
            paging,
            default_authority: default_authority.into(),
        }
    }

    fn repository(&self) -> WorkItemRepository {
        self.repository.read().clone()
    }

    /// Persist a new type and publish a repository that knows it.
    fn add_type(&self, work_item_type: WorkItemType) -> Result<(), CoreError> {
        let mut repository = self.repository.write();
        let extended = repository.with_type(work_item_type.clone())?;
        self.types.save_type(&work_item_type)?;
        info!(name = %work_item_type.name, "Registered work item type");
        *repository = extended;
        Ok(())
    }

    fn base_url(&self, headers: &HeaderMap) -> String {
        let authority = headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or(&self.default_authority);
        format!("http://{authority}")
    }

}

fn render(
    repository: &WorkItemRepository,
    item: &WorkItem,
    base_url: &str,
) -> Result<WorkItemData, CoreError> {
    let attributes = repository.to_wire(item)?;
    Ok(WorkItemData::from_work_item(item, attributes, base_url))
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/workitems", get(list_work_items).post(create_work_item))
        .route(
            "/api/workitems/{id}",
            get(show_work_item)
                .patch(update_work_item)
                .delete(delete_work_item),
        )
        .route(
            "/api/workitemtypes",
            get(list_work_item_types).post(create_work_item_type),
        )
        .route("/api/workitemtypes/{name}", get(show_work_item_type))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server.
///
/// # Errors
/// Returns error if binding fails or server encounters an error.
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let app = router(Arc::new(state));

    let addr = format!("{host}:{port}");
    info!(address = %addr, "Starting work item server");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Request/Response types ---

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default)]
    filter: Option<String>,
    #[serde(rename = "page[offset]", default)]
    page_offset: Option<String>,
    #[serde(rename = "page[limit]", default)]
    page_limit: Option<String>,
}

#[derive(Debug, Serialize)]
struct TypeData<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    attributes: &'a WorkItemType,
}

#[derive(Debug, Serialize)]
struct TypeDocument<'a> {
    data: TypeData<'a>,
}

#[derive(Debug, Deserialize)]
struct NewTypeData {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    attributes: WorkItemType,
}

#[derive(Debug, Deserialize)]
struct NewTypeDocument {
    data: NewTypeData,
}

#[derive(Debug, Serialize)]
struct TypeListDocument<'a> {
    data: Vec<TypeData<'a>>,
}

impl<'a> From<&'a WorkItemType> for TypeData<'a> {
    fn from(work_item_type: &'a WorkItemType) -> Self {
        Self {
            id: &work_item_type.name,
            kind: TYPE_WORK_ITEM_TYPES,
            attributes: work_item_type,
        }
    }
}

// --- Handlers ---

async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_work_items(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<WorkItemListDocument>, ApiError> {
    let Query(params) = params
        .map_err(|rejection| CoreError::bad_parameter("query", rejection.body_text()))?;
    let filter = ItemFilter::parse(params.filter.as_deref().unwrap_or_default())?;

    let limit = params
        .page_limit
        .as_deref()
        .map(|raw| {
            raw.trim()
                .parse::<i64>()
                .map_err(|_| CoreError::bad_parameter("page[limit]", raw))
        })
        .transpose()?;
    let page = PageRequest::from_params(
        params.page_offset.as_deref(),
        limit,
        state.paging.default_limit,
        state.paging.max_limit,
    );

    let repository = state.repository();
    let result = repository.list(&filter, page)?;

    let base_url = state.base_url(&headers);
    let collection_url = format!("{base_url}/api/{TYPE_WORK_ITEMS}");
    let href = |link: PageLink| format!("{collection_url}?{}", link.to_query());

    let data = result
        .items
        .iter()
        .map(|item| render(&repository, item, &base_url))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(WorkItemListDocument {
        links: PagingLinks {
            first: Some(href(result.links.first)),
            prev: result.links.prev.map(href),
            next: result.links.next.map(href),
            last: Some(href(result.links.last)),
        },
        meta: ListMeta {
            total_count: result.total_count,
        },
        data,
    }))
}

async fn show_work_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<WorkItemDocument>, ApiError> {
    let repository = state.repository();
    let item = repository.load(&id)?;
    let data = render(&repository, &item, &state.base_url(&headers))?;
    Ok(Json(WorkItemDocument { data }))
}

async fn create_work_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<WorkItemDocument>, JsonRejection>,
) -> Result<(StatusCode, Json<WorkItemDocument>), ApiError> {
    let Json(doc) = payload.map_err(reject_body)?;
    doc.data.expect_work_item()?;

    let relationships = doc.data.relationships.unwrap_or_default();
    let type_name = relationships
        .base_type
        .as_ref()
        .map(|rel| rel.data.id.clone())
        .ok_or_else(|| CoreError::bad_parameter("data.relationships.baseType", "null"))?;

    let new = NewWorkItem {
        type_name,
        attributes: doc.data.attributes,
        relationships: Some(relationships.to_relationships()),
    };
    let repository = state.repository();
    let item = repository.create(&new)?;

    let data = render(&repository, &item, &state.base_url(&headers))?;
    Ok((StatusCode::CREATED, Json(WorkItemDocument { data })))
}

async fn update_work_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<WorkItemDocument>, JsonRejection>,
) -> Result<Json<WorkItemDocument>, ApiError> {
    let Json(doc) = payload.map_err(reject_body)?;
    doc.data.expect_work_item()?;

    if let Some(body_id) = &doc.data.id {
        if *body_id != id {
            return Err(CoreError::bad_parameter("data.id", body_id).into());
        }
    }

    let relationships = doc.data.relationships.map(|r| r.to_relationships());
    let update = PartialUpdate::from_attributes(id, doc.data.attributes, relationships);
    let repository = state.repository();
    let item = repository.save(&update)?;

    let data = render(&repository, &item, &state.base_url(&headers))?;
    Ok(Json(WorkItemDocument { data }))
}

async fn delete_work_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.repository().delete(&id)?;
    Ok(StatusCode::OK)
}

async fn list_work_item_types(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let repository = state.repository();
    let doc = TypeListDocument {
        data: repository
            .registry()
            .types()
            .into_iter()
            .map(TypeData::from)
            .collect(),
    };
    Ok(Json(serde_json::to_value(doc).map_err(CoreError::from)?))
}

async fn show_work_item_type(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let repository = state.repository();
    let work_item_type = repository.registry().lookup(&name)?;
    let doc = TypeDocument {
        data: TypeData::from(work_item_type),
    };
    Ok(Json(serde_json::to_value(doc).map_err(CoreError::from)?))
}

async fn create_work_item_type(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewTypeDocument>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let Json(doc) = payload.map_err(reject_body)?;
    if doc.data.kind != TYPE_WORK_ITEM_TYPES {
        return Err(CoreError::bad_parameter("data.type", &doc.data.kind).into());
    }
    let work_item_type = doc.data.attributes;
    if let Some(id) = doc.data.id.as_ref().filter(|id| **id != work_item_type.name) {
        return Err(CoreError::bad_parameter("data.id", id).into());
    }

    let doc = TypeDocument {
        data: TypeData::from(&work_item_type),
    };
    let body = serde_json::to_value(doc).map_err(CoreError::from)?;
    state.add_type(work_item_type)?;
    Ok((StatusCode::CREATED, Json(body)))
}

fn reject_body(rejection: JsonRejection) -> ApiError {
    CoreError::bad_parameter("data", rejection.body_text()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use tracker_core::SchemaRegistry;
    use tracker_store::{Identity, MemoryIdentityStore, MemoryStorage, MemoryTypeStore};

    fn app_with_types(identities: Vec<Identity>, types: Arc<MemoryTypeStore>) -> Router {
        let repository = WorkItemRepository::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryIdentityStore::with_identities(identities)),
            Arc::new(SchemaRegistry::with_builtin()),
        );
        router(Arc::new(AppState::new(
            repository,
            types,
            PagingSettings::default(),
            "tracker.test",
        )))
    }

    fn app_with(identities: Vec<Identity>) -> Router {
        app_with_types(identities, Arc::new(MemoryTypeStore::new()))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn create_body(title: &str) -> Value {
        json!({
            "data": {
                "type": "workitems",
                "attributes": {"system.title": title, "system.state": "new"},
                "relationships": {
                    "baseType": {"data": {"id": "system.userstory", "type": "workitemtypes"}}
                }
            }
        })
    }

    #[tokio::test]
    async fn test_status() {
        let app = app_with(vec![]);
        let (status, body) = call(&app, Method::GET, "/api/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("ok"));
    }

    #[tokio::test]
    async fn test_create_show_and_update() {
        let alice = Identity::new("alice");
        let app = app_with(vec![alice.clone()]);

        let (status, created) =
            call(&app, Method::POST, "/api/workitems", Some(create_body("Ship it"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["data"]["id"], json!("1"));
        assert_eq!(created["data"]["attributes"]["version"], json!(0));

        let patch = json!({
            "data": {
                "id": "1",
                "type": "workitems",
                "attributes": {"version": "0", "system.state": "open"},
                "relationships": {
                    "assignee": {"data": {"id": alice.id.to_string(), "type": "identities"}}
                }
            }
        });
        let (status, updated) = call(&app, Method::PATCH, "/api/workitems/1", Some(patch)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["data"]["attributes"]["version"], json!(1));
        assert_eq!(updated["data"]["attributes"]["system.state"], json!("open"));
        assert_eq!(updated["data"]["attributes"]["system.title"], json!("Ship it"));
        assert_eq!(
            updated["data"]["relationships"]["assignee"]["data"]["id"],
            json!(alice.id.to_string())
        );
        assert_eq!(
            updated["data"]["links"]["self"],
            json!("http://tracker.test/api/workitems/1")
        );

        let (status, shown) = call(&app, Method::GET, "/api/workitems/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(shown, updated);
    }

    #[tokio::test]
    async fn test_update_errors() {
        let app = app_with(vec![]);
        call(&app, Method::POST, "/api/workitems", Some(create_body("Target"))).await;

        let stale = json!({"data": {"type": "workitems", "attributes": {"version": 5}}});
        let (status, body) = call(&app, Method::PATCH, "/api/workitems/1", Some(stale)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["code"], json!("version_conflict"));

        let missing = json!({"data": {"type": "workitems", "attributes": {"system.title": "x"}}});
        let (_, body) = call(&app, Method::PATCH, "/api/workitems/1", Some(missing)).await;
        assert_eq!(body["errors"][0]["code"], json!("version_conflict"));

        let unknown = json!({"data": {"type": "workitems", "attributes": {"version": 0, "nope": 1}}});
        let (status, body) = call(&app, Method::PATCH, "/api/workitems/1", Some(unknown)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["code"], json!("bad_parameter"));

        let body_ok = json!({"data": {"type": "workitems", "attributes": {"version": 0}}});
        let (status, body) =
            call(&app, Method::PATCH, "/api/workitems/abc", Some(body_ok.clone())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["errors"][0]["status"], json!("404"));

        let mismatched = json!({"data": {"id": "2", "type": "workitems", "attributes": {"version": 0}}});
        let (status, _) = call(&app, Method::PATCH, "/api/workitems/1", Some(mismatched)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&app, Method::GET, "/api/workitems/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["attributes"]["version"], json!(0));
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_parameter() {
        let app = app_with(vec![]);
        let (status, body) =
            call(&app, Method::POST, "/api/workitems", Some(json!({"nodata": true}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["code"], json!("bad_parameter"));
    }

    #[tokio::test]
    async fn test_list_paging_links() {
        let app = app_with(vec![]);
        for n in 0..95 {
            call(
                &app,
                Method::POST,
                "/api/workitems",
                Some(create_body(&format!("Item {n}"))),
            )
            .await;
        }

        let (status, body) = call(
            &app,
            Method::GET,
            "/api/workitems?page%5Boffset%5D=40&page%5Blimit%5D=20",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["totalCount"], json!(95));
        assert_eq!(body["data"].as_array().unwrap().len(), 20);
        let base = "http://tracker.test/api/workitems";
        assert_eq!(
            body["links"],
            json!({
                "first": format!("{base}?page[offset]=0&page[limit]=0"),
                "prev": format!("{base}?page[offset]=20&page[limit]=20"),
                "next": format!("{base}?page[offset]=60&page[limit]=20"),
                "last": format!("{base}?page[offset]=80&page[limit]=15"),
            })
        );
    }

    #[tokio::test]
    async fn test_list_empty_and_filtered() {
        let app = app_with(vec![]);
        let (status, body) = call(&app, Method::GET, "/api/workitems", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["totalCount"], json!(0));
        assert!(body["links"].get("prev").is_none());
        assert!(body["links"].get("next").is_none());

        call(&app, Method::POST, "/api/workitems", Some(create_body("Match"))).await;
        let (_, body) = call(
            &app,
            Method::GET,
            "/api/workitems?filter=%7B%22system.title%22%3A%22Match%22%7D",
            None,
        )
        .await;
        assert_eq!(body["meta"]["totalCount"], json!(1));

        let (status, body) = call(&app, Method::GET, "/api/workitems?filter=%7Bbroken", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["code"], json!("bad_parameter"));
    }

    #[tokio::test]
    async fn test_unreadable_query_uses_error_envelope() {
        let app = app_with(vec![]);
        let (status, body) = call(
            &app,
            Method::GET,
            "/api/workitems?page%5Blimit%5D=1&page%5Blimit%5D=2",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["code"], json!("bad_parameter"));
        assert_eq!(body["errors"][0]["status"], json!("400"));
    }

    #[tokio::test]
    async fn test_delete_work_item() {
        let app = app_with(vec![]);
        call(&app, Method::POST, "/api/workitems", Some(create_body("Remove me"))).await;

        let (status, _) = call(&app, Method::DELETE, "/api/workitems/1", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&app, Method::GET, "/api/workitems/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        for uri in ["/api/workitems/1", "/api/workitems/abc"] {
            let (status, body) = call(&app, Method::DELETE, uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body["errors"][0]["code"], json!("not_found"));
        }
    }

    #[tokio::test]
    async fn test_work_item_types() {
        let app = app_with(vec![]);
        let (status, body) = call(&app, Method::GET, "/api/workitemtypes", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["id"], json!("system.userstory"));

        let (status, _) = call(&app, Method::GET, "/api/workitemtypes/system.bug", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_work_item_type() {
        let types = Arc::new(MemoryTypeStore::new());
        let app = app_with_types(vec![], types.clone());
        let bug = json!({
            "data": {
                "type": "workitemtypes",
                "id": "custom.bug",
                "attributes": {
                    "name": "custom.bug",
                    "fields": [
                        {"name": "system.title", "kind": "string", "required": true},
                        {"name": "severity", "kind": "enum", "values": ["low", "high"]}
                    ]
                }
            }
        });

        let (status, body) =
            call(&app, Method::POST, "/api/workitemtypes", Some(bug.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["id"], json!("custom.bug"));
        assert_eq!(types.saved().len(), 1);

        let (status, _) = call(&app, Method::GET, "/api/workitemtypes/custom.bug", None).await;
        assert_eq!(status, StatusCode::OK);

        let item = json!({
            "data": {
                "type": "workitems",
                "attributes": {"system.title": "Crash", "severity": "high"},
                "relationships": {
                    "baseType": {"data": {"id": "custom.bug", "type": "workitemtypes"}}
                }
            }
        });
        let (status, created) = call(&app, Method::POST, "/api/workitems", Some(item)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["data"]["attributes"]["severity"], json!("high"));

        let (status, body) = call(&app, Method::POST, "/api/workitemtypes", Some(bug)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["code"], json!("bad_parameter"));
        assert_eq!(types.saved().len(), 1);

        let reviewer = json!({
            "data": {
                "type": "workitemtypes",
                "attributes": {"name": "custom.review", "fields": [{"name": "reviewer", "kind": "user"}]}
            }
        });
        let (status, _) = call(&app, Method::POST, "/api/workitemtypes", Some(reviewer)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(types.saved().len(), 1);
    }
}
