//! Read access to the audit trail.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trainflow_core::{AuditError, AuditFilter, AuditRecord};

use crate::state::AppState;

const PAGE_MAX: i64 = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct AuditQueryParams {
    pub job_name: Option<String>,
    pub execution_id: Option<String>,
    /// e.g. `deployment_requested`
    pub event_type: Option<String>,
    /// RFC 3339, inclusive
    pub from: Option<DateTime<Utc>>,
    /// RFC 3339, inclusive
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl AuditQueryParams {
    /// The unpaginated filter; pagination is applied separately.
    fn filter(&self) -> AuditFilter {
        let base = AuditFilter::new().with_time_range(self.from, self.to);
        let base = match &self.job_name {
            Some(job) => base.with_job_name(job.as_str()),
            None => base,
        };
        let base = match &self.execution_id {
            Some(execution) => base.with_execution_id(execution.as_str()),
            None => base,
        };
        match &self.event_type {
            Some(event_type) => base.with_event_type(event_type.as_str()),
            None => base,
        }
    }

    fn page(&self) -> (i64, i64) {
        let default_limit = AuditFilter::new().limit;
        (
            self.limit.unwrap_or(default_limit).clamp(1, PAGE_MAX),
            self.offset.unwrap_or(0).max(0),
        )
    }
}

#[derive(Debug, Serialize)]
pub struct AuditQueryResponse {
    pub events: Vec<AuditRecord>,
    /// Matches before pagination.
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct AuditErrorResponse {
    pub error: String,
}

type AuditApiError = (StatusCode, Json<AuditErrorResponse>);

fn store_failure(e: AuditError) -> AuditApiError {
    tracing::error!("Audit query failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(AuditErrorResponse {
            error: e.to_string(),
        }),
    )
}

pub async fn query_audit(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<AuditQueryResponse>, AuditApiError> {
    let filter = params.filter();
    let (limit, offset) = params.page();
    let store = state.audit_store();

    let total = store.count(&filter).map_err(store_failure)?;
    let events = store
        .query(&filter.with_limit(limit).with_offset(offset))
        .map_err(store_failure)?;

    Ok(Json(AuditQueryResponse {
        events,
        total,
        limit,
        offset,
    }))
}
