//! The minimal HTTP surface (§4.12): driving an already-persisted run and
//! reading back its trace. Workflow/block/connector CRUD is out of scope.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use veil_engine::{RunExecutor, RunStore, RuntimeContext, WorkflowStore};
use veil_workflow::{ExecutionStep, RunStatus, WorkflowGraph};

#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<RunExecutor>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods([Method::GET, Method::POST]).allow_headers(Any);

    Router::new()
        .route("/runs/:id/execute", axum::routing::post(execute_run))
        .route(
            "/workflows/:workflow_id/runs/:run_id/trace",
            axum::routing::get(get_trace),
        )
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ExecuteQuery {
    org_id: String,
}

async fn execute_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Query(query): Query<ExecuteQuery>,
) -> Response {
    let runtime = RuntimeContext::new();
    match state.executor.execute(&run_id, &query.org_id, &runtime).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// §6's trace surface response shape.
#[derive(Debug, Serialize)]
struct TraceResponse {
    workflow_id: String,
    run_id: String,
    status: RunStatus,
    created_at: chrono::DateTime<chrono::Utc>,
    graph: WorkflowGraph,
    steps: Vec<ExecutionStep>,
    outputs: veil_workflow::DataObject,
}

async fn get_trace(State(state): State<AppState>, Path((workflow_id, run_id)): Path<(String, String)>) -> Response {
    let run = match state.executor.run_store.get(&run_id).await {
        Ok(run) => run,
        Err(e) => return (StatusCode::NOT_FOUND, e.to_string()).into_response(),
    };
    if run.workflow_id != workflow_id {
        return (StatusCode::NOT_FOUND, "run does not belong to workflow").into_response();
    }

    let graph = match state.executor.workflow_store.get_graph(&workflow_id).await {
        Ok(graph) => graph,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    let result = run.result.unwrap_or_default();
    let response = TraceResponse {
        workflow_id,
        run_id,
        status: run.status,
        created_at: run.created_at,
        graph,
        steps: result.steps,
        outputs: result.outputs,
    };

    Json(response).into_response()
}
