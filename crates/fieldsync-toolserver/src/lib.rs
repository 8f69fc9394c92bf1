//! HTTP tool server for fieldsync workspaces.
//!
//! Exposes the field catalog, name resolution and partial issue updates over
//! a local JSON API.

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use fieldsync_core::{
    CancellationToken, CodecKind, CodecRegistry, CoreError, FieldCatalog, FieldDefinition,
    FieldValueEntry, Issue, IssueContext, ValueCodec,
};
use fieldsync_fs::{FsError, Workspace};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Server state shared across handlers.
struct AppState {
    workspace_path: PathBuf,
    shutdown: CancellationToken,
    /// Serializes read-modify-write cycles on the same issue.
    issue_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AppState {
    async fn issue_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.issue_locks.lock().await;
        Arc::clone(locks.entry(key.to_string()).or_default())
    }
}

/// Build the API router for a workspace.
///
/// Requests in flight observe `shutdown` as their cancellation signal.
pub fn router(workspace_path: &std::path::Path, shutdown: CancellationToken) -> Router {
    let state = Arc::new(AppState {
        workspace_path: workspace_path.to_path_buf(),
        shutdown,
        issue_locks: Mutex::new(HashMap::new()),
    });

    Router::new()
        .route("/health", get(health))
        .route("/fields", get(list_fields))
        .route("/fields/resolve", post(resolve_field))
        .route("/issues/{key}", get(get_issue))
        .route("/issues/{key}/fields", post(update_fields))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the tool server and run until `shutdown` is cancelled.
///
/// # Errors
/// Returns error if binding fails or server encounters an error.
pub async fn serve(
    workspace_path: &std::path::Path,
    host: &str,
    port: u16,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = router(workspace_path, shutdown.clone());

    let addr = format!("{host}:{port}");
    info!(address = %addr, "Starting tool server");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!("Tool server stopped");
    Ok(())
}

// --- Request/Response types ---

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldsQuery {
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    issue_type_id: Option<String>,
    #[serde(default)]
    issue_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveRequest {
    name: String,
    project: String,
    #[serde(default)]
    issue_type_id: Option<String>,
    #[serde(default)]
    issue_type: Option<String>,
    /// Resolve within the project even when the name is unique.
    #[serde(default)]
    project_only: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResolveResponse {
    name: String,
    id: String,
}

/// One field value as returned by the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct EntryView {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub values: Option<Vec<String>>,
    pub codec: String,
}

impl From<&FieldValueEntry> for EntryView {
    fn from(entry: &FieldValueEntry) -> Self {
        Self {
            id: entry.id().to_string(),
            name: entry.name().map(String::from),
            values: entry.values().map(<[String]>::to_vec),
            codec: entry.codec().name().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IssueResponse {
    key: String,
    context: IssueContext,
    fields: Vec<EntryView>,
}

/// A single field edit. Exactly one of `name` or `id` identifies the field;
/// `values: null` clears it. Without `codec`, a new entry takes the codec
/// configured for the field's schema type.
#[derive(Debug, Deserialize)]
struct FieldAssignment {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    id: Option<String>,
    values: Option<Vec<String>>,
    #[serde(default)]
    codec: Option<CodecKind>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateFieldsRequest {
    assignments: Vec<FieldAssignment>,
    /// Compute the payload without saving it.
    #[serde(default)]
    dry_run: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct UpdateFieldsResponse {
    key: String,
    payload: Map<String, Value>,
    saved: bool,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Handlers ---

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_fields(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FieldsQuery>,
) -> Result<Json<Vec<FieldDefinition>>, AppError> {
    let ws = Workspace::open(&state.workspace_path)?;

    let scope = query.project.map(|project| IssueContext {
        project_key: project,
        issue_type_id: query.issue_type_id,
        issue_type_name: query.issue_type,
    }
    .scope());

    let fields = ws.catalog().fetch(scope.as_ref()).await?;
    Ok(Json(fields))
}

async fn resolve_field(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, AppError> {
    let ws = Workspace::open(&state.workspace_path)?;
    let cancel = state.shutdown.child_token();

    let context = IssueContext {
        project_key: req.project,
        issue_type_id: req.issue_type_id,
        issue_type_name: req.issue_type,
    };
    let force_scoped = req.project_only || ws.config().fields.search_by_project_only;

    let id = ws
        .resolver()
        .resolve(&req.name, &context, force_scoped, &cancel)
        .await?;

    Ok(Json(ResolveResponse { name: req.name, id }))
}

async fn get_issue(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<IssueResponse>, AppError> {
    let ws = Workspace::open(&state.workspace_path)?;
    let cancel = state.shutdown.child_token();

    let issue = ws.fetch_issue(&key, ws.resolver(), &cancel).await?;

    Ok(Json(IssueResponse {
        key,
        context: issue.context().clone(),
        fields: issue.custom_fields().iter().map(EntryView::from).collect(),
    }))
}

async fn update_fields(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(req): Json<UpdateFieldsRequest>,
) -> Result<Json<UpdateFieldsResponse>, AppError> {
    let ws = Workspace::open(&state.workspace_path)?;
    let cancel = state.shutdown.child_token();
    let registry = ws.config().codec_registry();

    let lock = state.issue_lock(&key).await;
    let _guard = lock.lock().await;

    let mut issue = ws.fetch_issue(&key, ws.resolver(), &cancel).await?;
    for assignment in req.assignments {
        apply_assignment(&mut issue, assignment, &registry, &cancel).await?;
    }

    let payload = issue.update_payload()?;
    let saved = !req.dry_run && !payload.is_empty();
    if saved {
        ws.save_issue(&key, &payload)?;
    }

    info!(key = %key, fields = payload.len(), saved, "Updated issue fields");

    Ok(Json(UpdateFieldsResponse {
        key,
        payload,
        saved,
    }))
}

async fn apply_assignment<C: FieldCatalog>(
    issue: &mut Issue<C>,
    assignment: FieldAssignment,
    registry: &CodecRegistry,
    cancel: &CancellationToken,
) -> Result<(), AppError> {
    let codec = assignment.codec.map(ValueCodec::from);
    let fields = issue.custom_fields_mut();

    match (assignment.name, assignment.id, codec) {
        (Some(name), None, Some(codec)) => {
            fields.assign(&name, assignment.values, codec, cancel).await?;
        }
        (Some(name), None, None) => {
            fields
                .assign_from_schema(&name, assignment.values, registry, cancel)
                .await?;
        }
        (None, Some(id), codec) => {
            fields
                .assign_by_id(&id, assignment.values, codec, registry, cancel)
                .await?;
        }
        _ => {
            return Err(AppError::bad_request(
                "each assignment needs exactly one of 'name' or 'id'",
            ));
        }
    }
    Ok(())
}

// --- Error handling ---

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct BadRequest(String);

struct AppError(anyhow::Error);

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self(BadRequest(message.into()).into())
    }

    fn status(&self) -> StatusCode {
        if self.0.downcast_ref::<BadRequest>().is_some() {
            return StatusCode::BAD_REQUEST;
        }

        let core = self.0.downcast_ref::<CoreError>().or_else(|| {
            match self.0.downcast_ref::<FsError>() {
                Some(FsError::Core(core)) => Some(core),
                _ => None,
            }
        });

        match (core, self.0.downcast_ref::<FsError>()) {
            (Some(CoreError::FieldNotFound { .. }), _)
            | (_, Some(FsError::IssueNotFound(_) | FsError::WorkspaceNotFound(_))) => {
                StatusCode::NOT_FOUND
            }
            (Some(CoreError::AmbiguousField { .. }), _) => StatusCode::CONFLICT,
            (Some(CoreError::Codec { .. }), _) | (_, Some(FsError::InvalidIssueKey(_))) => {
                StatusCode::BAD_REQUEST
            }
            (Some(CoreError::Cancelled), _) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
