//! Read-only job record queries.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use trainflow_core::{JobFilter, JobRecord, JobStatus};

use crate::state::AppState;

/// Maximum allowed limit for job queries
const MAX_LIMIT: i64 = 1000;

const DEFAULT_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    /// Filter by status (pending, submitted, in_progress, succeeded, failed)
    pub status: Option<String>,
    pub source_commit: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobRecord>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct JobErrorResponse {
    pub error: String,
}

fn job_error(status: StatusCode, error: String) -> (StatusCode, Json<JobErrorResponse>) {
    (status, Json(JobErrorResponse { error }))
}

pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<ListJobsResponse>, (StatusCode, Json<JobErrorResponse>)> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut base_filter = JobFilter::new();
    if let Some(ref status) = params.status {
        let status: JobStatus = status
            .parse()
            .map_err(|e: String| job_error(StatusCode::BAD_REQUEST, e))?;
        base_filter = base_filter.with_status(status);
    }
    if let Some(ref commit) = params.source_commit {
        base_filter = base_filter.with_source_commit(commit);
    }

    let query_filter = base_filter.clone().with_limit(limit).with_offset(offset);

    let jobs = state.job_store().list(&query_filter).map_err(|e| {
        job_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to list jobs: {}", e),
        )
    })?;
    let total = state.job_store().count(&base_filter).map_err(|e| {
        job_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to count jobs: {}", e),
        )
    })?;

    Ok(Json(ListJobsResponse {
        jobs,
        total,
        limit,
        offset,
    }))
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(job_name): Path<String>,
) -> Result<Json<JobRecord>, (StatusCode, Json<JobErrorResponse>)> {
    match state.job_store().get(&job_name) {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(job_error(
            StatusCode::NOT_FOUND,
            format!("Job not found: {}", job_name),
        )),
        Err(e) => Err(job_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to get job: {}", e),
        )),
    }
}
