//! Job progress endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::processing::{JobProgress, QueueStats};
use crate::server::state::AppState;
use crate::types::{parse_id, parse_session_id, JobFilter};

/// Response for the job list
#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobProgress>,
    pub stats: QueueStats,
}

/// GET /jobs - List jobs, newest first, with queue statistics
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(filter): Query<JobFilter>,
) -> Result<Json<JobListResponse>> {
    let session_id = filter
        .session_id
        .as_deref()
        .map(parse_session_id)
        .transpose()?;

    let queue = state.job_queue();
    Ok(Json(JobListResponse {
        jobs: queue.list_jobs(session_id),
        stats: queue.stats(),
    }))
}

/// GET /jobs/:id - Get job progress
pub async fn get_job_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobProgress>> {
    let job_id = parse_id("job_id", &id)?;
    state
        .job_queue()
        .get_progress(job_id)
        .map(Json)
        .ok_or_else(|| Error::JobNotFound(job_id.to_string()))
}
