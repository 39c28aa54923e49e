//! HTTP surface of the runner.
//!
//! Four routes: submit a job, read its status, accept task results from the
//! runner containers, and a bare liveness check. Bodies are JSON and are
//! validated through typed serde extraction; a rejected body surfaces as a
//! 400 instead of axum's default.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{SchedulerError, StoreError};
use crate::models::{JobDetails, TaskRecord, TaskResult, TaskSubmission};
use crate::runner::JobRunner;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct ApiState {
    pub runner: Arc<JobRunner>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub image_name: String,
    pub callback_url: String,
    /// Missing or empty task lists are rejected by the scheduler.
    #[serde(default)]
    pub tasks: Vec<TaskSubmission>,
}

#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct TaskResultRequest {
    pub task_name: String,
    pub task_status: i64,
    pub task_result: TaskResult,
}

/// Error response with the HTTP status the failure maps to.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    NotFound(String),
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Unavailable(message) => (StatusCode::SERVICE_UNAVAILABLE, message),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        if e.is_not_found() {
            ApiError::NotFound(e.to_string())
        } else {
            ApiError::Unavailable(e.to_string())
        }
    }
}

impl From<SchedulerError> for ApiError {
    fn from(e: SchedulerError) -> Self {
        match e {
            SchedulerError::NoTasks | SchedulerError::DuplicateTask { .. } => {
                ApiError::Validation(e.to_string())
            }
            SchedulerError::UnknownJob { .. } => ApiError::NotFound(e.to_string()),
            SchedulerError::Store(store) => store.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

/// Build the router over the given state.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/submit", post(submit_job))
        .route("/status/{job_id}", get(job_status))
        .route("/status/{job_id}/tasks", get(job_tasks))
        .route("/result/{job_id}", post(report_result))
        .route("/test", get(liveness))
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn serve(port: u16, state: ApiState) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("swarmer API listening on {}", addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

async fn submit_job(
    State(state): State<ApiState>,
    payload: Result<Json<SubmitJobRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    tracing::info!("received request to create a new job");
    let id = state
        .runner
        .create_new_job(&request.image_name, &request.callback_url, &request.tasks)
        .await?;
    let location = format!("/status/{id}");
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(SubmitJobResponse { id }),
    )
        .into_response())
}

async fn job_status(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobDetails>, ApiError> {
    tracing::info!("received request for status of job {}", job_id);
    Ok(Json(state.runner.get_job(&job_id).await?))
}

async fn job_tasks(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<Json<Vec<TaskRecord>>, ApiError> {
    Ok(Json(state.runner.get_job_tasks(&job_id).await?))
}

async fn report_result(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
    payload: Result<Json<TaskResultRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(request) = payload?;
    tracing::info!("received results for a task in job {}", job_id);
    state
        .runner
        .complete_task(
            &job_id,
            &request.task_name,
            request.task_status,
            &request.task_result,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn liveness() -> &'static str {
    "I am ALIVE"
}
