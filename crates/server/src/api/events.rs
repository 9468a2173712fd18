//! Event ingress: storage notifications, build completion, training status.
//!
//! Every handler answers 200 with the outcome when the event was processed or
//! deliberately skipped. Failures map to a status the event source can act on:
//! 503 means "redeliver later", any other error status means "do not retry".

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;
use trainflow_core::{
    orchestrator::{PipelineStart, SubmittedJob, TrainingStatusReport},
    parse_storage_notification, BuildCompletedEvent, OrchestrationError, Outcome,
    TrainingStatusEvent,
};

use crate::state::AppState;

/// Error body for event endpoints
#[derive(Debug, Serialize)]
pub struct EventErrorResponse {
    pub error: String,
    /// Whether redelivering the same event may succeed
    pub retryable: bool,
}

type EventError = (StatusCode, Json<EventErrorResponse>);

/// Result for one object in a storage notification
#[derive(Debug, Serialize)]
pub struct StorageEventResult {
    pub bucket: String,
    pub object_key: String,
    pub result: Outcome<PipelineStart>,
}

#[derive(Debug, Serialize)]
pub struct StorageEventResponse {
    pub results: Vec<StorageEventResult>,
}

pub fn status_for(error: &OrchestrationError) -> StatusCode {
    match error {
        OrchestrationError::InvalidEvent(_) => StatusCode::BAD_REQUEST,
        OrchestrationError::RecordNotFound(_) => StatusCode::NOT_FOUND,
        OrchestrationError::SubmissionRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        OrchestrationError::TransientBackend(_) => StatusCode::SERVICE_UNAVAILABLE,
        OrchestrationError::Configuration(_)
        | OrchestrationError::MissingArtifact(_)
        | OrchestrationError::Store(_)
        | OrchestrationError::Lease(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: OrchestrationError) -> EventError {
    (
        status_for(&error),
        Json(EventErrorResponse {
            error: error.to_string(),
            retryable: error.is_retryable(),
        }),
    )
}

fn bad_request(message: String) -> EventError {
    (
        StatusCode::BAD_REQUEST,
        Json(EventErrorResponse {
            error: message,
            retryable: false,
        }),
    )
}

/// Accepts either a flat `{bucket, object_key}` event or a `Records` envelope.
pub async fn storage_event(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<StorageEventResponse>, EventError> {
    let Json(value) = payload.map_err(|e| bad_request(e.body_text()))?;
    let events = parse_storage_notification(&value).map_err(|e| {
        warn!("Rejected storage notification: {}", e);
        bad_request(e.to_string())
    })?;

    let mut results = Vec::with_capacity(events.len());
    for event in events {
        let result = state
            .controller()
            .on_object_created(&event)
            .await
            .map_err(error_response)?;
        results.push(StorageEventResult {
            bucket: event.bucket,
            object_key: event.object_key,
            result,
        });
    }

    Ok(Json(StorageEventResponse { results }))
}

pub async fn build_completed(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BuildCompletedEvent>, JsonRejection>,
) -> Result<Json<Outcome<SubmittedJob>>, EventError> {
    let Json(event) = payload.map_err(|e| bad_request(e.body_text()))?;
    state
        .controller()
        .on_build_completed(&event)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn training_status(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TrainingStatusEvent>, JsonRejection>,
) -> Result<Json<Outcome<TrainingStatusReport>>, EventError> {
    let Json(event) = payload.map_err(|e| bad_request(e.body_text()))?;
    state
        .controller()
        .on_training_status(&event)
        .await
        .map(Json)
        .map_err(error_response)
}
