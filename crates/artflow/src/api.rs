//! Service surface for the intake form and the admin console.
//!
//! Framework-free handlers over the store and pipeline; a thin HTTP
//! layer (out of scope here) mounts these one-to-one. Every handler
//! returns the `ApiResponse` envelope.

use serde::Serialize;

use crate::pipeline::Pipeline;
use crate::store::{SubmissionPage, SubmissionPatch, SubmissionQuery, SubmissionStore};
use crate::submission::{RequestPayload, Submission, SubmissionStatus, TaskResult};

/// Response wrapper for API calls.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Outcome of an intake submission. The submission id is always
/// returned, whether or not provisioning succeeded; on failure the
/// stored record carries the error detail.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub submission_id: String,
    pub status: SubmissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_result: Option<TaskResult>,
}

/// Outcome of an admin retry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryResponse {
    pub submission_id: String,
    pub task_result: TaskResult,
}

/// Accepts a new art request: persists it, then runs the provisioning
/// pipeline within the lifetime of the call.
pub async fn submit_request(
    store: &SubmissionStore,
    pipeline: &Pipeline,
    payload: RequestPayload,
) -> ApiResponse<SubmitResponse> {
    let submission = match store.create(payload) {
        Ok(submission) => submission,
        Err(e) => return ApiResponse::err(format!("Database error: {}", e)),
    };

    let (status, task_result) = match pipeline.run(&submission.id).await {
        Ok(task_result) => (SubmissionStatus::Complete, Some(task_result)),
        Err(e) => {
            log::error!("Pipeline failed for submission {}: {}", submission.id, e);
            (SubmissionStatus::Error, None)
        }
    };

    ApiResponse::ok(SubmitResponse {
        submission_id: submission.id,
        status,
        task_result,
    })
}

/// Fetches a single submission by id.
pub fn get_submission(store: &SubmissionStore, id: &str) -> ApiResponse<Submission> {
    match store.get(id) {
        Ok(Some(submission)) => ApiResponse::ok(submission),
        Ok(None) => ApiResponse::err(format!("Submission not found: {}", id)),
        Err(e) => ApiResponse::err(format!("Database error: {}", e)),
    }
}

/// Applies a partial update; `last_modified` is always stamped.
pub fn update_submission(
    store: &SubmissionStore,
    id: &str,
    patch: SubmissionPatch,
) -> ApiResponse<Submission> {
    match store.update(id, patch) {
        Ok(Some(submission)) => ApiResponse::ok(submission),
        Ok(None) => ApiResponse::err(format!("Submission not found: {}", id)),
        Err(e) => ApiResponse::err(format!("Database error: {}", e)),
    }
}

/// Retries a failed submission from the step that failed. Only
/// submissions in `error` are retryable; anything else is rejected
/// without touching the record.
pub async fn retry_submission(pipeline: &Pipeline, id: &str) -> ApiResponse<RetryResponse> {
    match pipeline.retry(id).await {
        Ok(task_result) => ApiResponse::ok(RetryResponse {
            submission_id: id.to_string(),
            task_result,
        }),
        // Rejections (not found, wrong status, concurrent claim) perform
        // no writes; step failures leave the record in `error` with its
        // detail updated by the pipeline.
        Err(e) => ApiResponse::err(e.to_string()),
    }
}

/// Lists submissions for the admin console, newest first.
pub fn list_submissions(
    store: &SubmissionStore,
    query: &SubmissionQuery,
) -> ApiResponse<SubmissionPage> {
    match store.list(query) {
        Ok(page) => ApiResponse::ok(page),
        Err(e) => ApiResponse::err(format!("Database error: {}", e)),
    }
}
