//! Database models for the durable job queue.

use crate::types::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database request for enqueueing a job
#[derive(Debug, Clone)]
pub struct JobCreateDBRequest {
    pub job_type: String,
    pub payload: serde_json::Value,
    pub run_at: DateTime<Utc>,
}

/// Database response for a queued job
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobDBResponse {
    pub id: JobId,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub run_at: DateTime<Utc>,
    pub status: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
