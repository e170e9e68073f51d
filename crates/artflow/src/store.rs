//! Typed submission store over the database layer.
//!
//! All reads and writes of [`Submission`] go through here; the raw
//! row/JSON mapping never leaks past this module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::submission_repo::{self, SubmissionFilter, SubmissionRow};
use crate::db::{Database, DatabaseError};
use crate::submission::{
    DriveResult, ErrorDetail, FailedStep, RequestPayload, Submission, SubmissionStatus, TaskResult,
};

// ============================================================================
// Helpers
// ============================================================================

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::warn!("parse_timestamp: failed to parse '{}': {}", s, e);
            Utc::now()
        })
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn decode_json<T: serde::de::DeserializeOwned>(
    raw: &str,
    id: &str,
    column: &'static str,
) -> Result<T, DatabaseError> {
    serde_json::from_str(raw).map_err(|e| DatabaseError::CorruptColumn {
        id: id.to_string(),
        column,
        source: e,
    })
}

// ============================================================================
// Query / page types
// ============================================================================

/// Listing parameters for the admin view.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionQuery {
    pub status: Option<SubmissionStatus>,
    /// Case-insensitive exact match on requestor email.
    pub email: Option<String>,
    /// Free-text search over client name, title, request type and email.
    pub search: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// One page of submissions plus the total count across all pages.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPage {
    pub submissions: Vec<Submission>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

/// Partial update for a submission; absent fields are left untouched.
/// Pipeline-owned fields (status, results, error detail) are not
/// patchable: only the orchestrator moves a submission through its
/// lifecycle, so `complete` always implies a stored task result.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPatch {
    pub request_payload: Option<RequestPayload>,
}

// ============================================================================
// Store
// ============================================================================

/// Mediates all submission persistence. Cheap to clone.
#[derive(Clone)]
pub struct SubmissionStore {
    db: Database,
}

impl SubmissionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts a fresh submission built from the given payload.
    pub fn create(&self, payload: RequestPayload) -> Result<Submission, DatabaseError> {
        let submission = Submission::new(payload);
        submission_repo::insert(&self.db, &to_row(&submission))?;
        Ok(submission)
    }

    /// Fetches a submission by id.
    pub fn get(&self, id: &str) -> Result<Option<Submission>, DatabaseError> {
        match submission_repo::find_by_id(&self.db, id)? {
            Some(row) => Ok(Some(from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Writes the submission back, stamping `last_modified`.
    pub fn save(&self, submission: &mut Submission) -> Result<(), DatabaseError> {
        submission.last_modified = Utc::now();
        submission_repo::update(&self.db, &to_row(submission))
    }

    /// Partial field merge; always stamps `last_modified`. Returns the
    /// updated submission, or `None` when the id does not exist.
    pub fn update(
        &self,
        id: &str,
        patch: SubmissionPatch,
    ) -> Result<Option<Submission>, DatabaseError> {
        let Some(mut submission) = self.get(id)? else {
            return Ok(None);
        };

        if let Some(payload) = patch.request_payload {
            submission.request_payload = payload;
        }

        self.save(&mut submission)?;
        Ok(Some(submission))
    }

    /// Lists submissions newest-first with filters and pagination.
    pub fn list(&self, query: &SubmissionQuery) -> Result<SubmissionPage, DatabaseError> {
        let filter = SubmissionFilter {
            status: query.status.map(|s| s.as_str().to_string()),
            email: query.email.clone(),
            search: query.search.clone(),
            limit: query.limit,
            offset: query.offset,
        };

        let (rows, total) = submission_repo::query(&self.db, &filter)?;
        let submissions = rows
            .into_iter()
            .map(from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SubmissionPage {
            submissions,
            total,
            limit: query.limit.unwrap_or(100),
            offset: query.offset.unwrap_or(0),
        })
    }

    /// Counts submissions in the given status.
    pub fn count_by_status(&self, status: SubmissionStatus) -> Result<u64, DatabaseError> {
        submission_repo::count_by_status(&self.db, status.as_str())
    }

    /// Compare-and-swap claim for retry: `error → processing`.
    ///
    /// Returns `false` when no row is currently in `error` under this id,
    /// which turns a concurrent double-retry into a detectable conflict
    /// instead of a silent double execution. The error columns are left
    /// in place so the retry counter survives the claim.
    pub fn claim_for_retry(&self, id: &str) -> Result<bool, DatabaseError> {
        submission_repo::transition_status(
            &self.db,
            id,
            SubmissionStatus::Error.as_str(),
            SubmissionStatus::Processing.as_str(),
            &format_timestamp(Utc::now()),
        )
    }
}

// ============================================================================
// Row conversion
// ============================================================================

fn to_row(sub: &Submission) -> SubmissionRow {
    let payload = &sub.request_payload;
    SubmissionRow {
        id: sub.id.clone(),
        client_name: payload.client_name.clone(),
        title: payload.title.clone(),
        request_type: payload.request_type.clone(),
        requestor_email: payload.requestor_email.clone(),
        // Serializing our own derived types cannot fail.
        payload: serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string()),
        status: sub.status.as_str().to_string(),
        drive_result: sub
            .drive_result
            .as_ref()
            .and_then(|r| serde_json::to_string(r).ok()),
        task_result: sub
            .task_result
            .as_ref()
            .and_then(|r| serde_json::to_string(r).ok()),
        error_step: sub.error_detail.as_ref().map(|d| d.step.as_str().to_string()),
        error_message: sub.error_detail.as_ref().map(|d| d.message.clone()),
        retry_count: sub.error_detail.as_ref().map(|d| d.retry_count).unwrap_or(0),
        error_at: sub
            .error_detail
            .as_ref()
            .map(|d| format_timestamp(d.timestamp)),
        created_at: format_timestamp(sub.created_at),
        last_modified: format_timestamp(sub.last_modified),
        completed_at: sub.completed_at.map(format_timestamp),
    }
}

fn from_row(row: SubmissionRow) -> Result<Submission, DatabaseError> {
    let status = SubmissionStatus::parse(&row.status, &row.id);

    // Error detail is only observable while the submission is in `error`.
    // The columns may linger through a retry claim (so the counter
    // survives), but the domain type never exposes them outside `Error`.
    let error_detail = if status == SubmissionStatus::Error {
        row.error_step.as_deref().map(|step| ErrorDetail {
            step: FailedStep::parse(step, &row.id),
            message: row.error_message.clone().unwrap_or_default(),
            retry_count: row.retry_count,
            timestamp: row
                .error_at
                .as_deref()
                .map(parse_timestamp)
                .unwrap_or_else(Utc::now),
        })
    } else {
        None
    };

    let drive_result: Option<DriveResult> = row
        .drive_result
        .as_deref()
        .map(|raw| decode_json(raw, &row.id, "drive_result"))
        .transpose()?;
    let task_result: Option<TaskResult> = row
        .task_result
        .as_deref()
        .map(|raw| decode_json(raw, &row.id, "task_result"))
        .transpose()?;
    let request_payload: RequestPayload = decode_json(&row.payload, &row.id, "payload")?;

    Ok(Submission {
        id: row.id,
        status,
        request_payload,
        drive_result,
        task_result,
        error_detail,
        created_at: parse_timestamp(&row.created_at),
        last_modified: parse_timestamp(&row.last_modified),
        completed_at: row.completed_at.as_deref().map(parse_timestamp),
    })
}

/// The lingering retry counter for a row, regardless of status.
///
/// Used by the pipeline to carry the count across a retry claim, where
/// the status is already `processing` and the domain type hides the
/// error detail.
pub(crate) fn stored_retry_count(
    store: &SubmissionStore,
    id: &str,
) -> Result<u32, DatabaseError> {
    Ok(submission_repo::find_by_id(&store.db, id)?
        .map(|row| row.retry_count)
        .unwrap_or(0))
}
