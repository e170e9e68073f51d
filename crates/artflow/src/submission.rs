//! Domain model for art request submissions.
//!
//! Wire forms are camelCase JSON; timestamps are `chrono::DateTime<Utc>`
//! serialized as RFC3339. The row-level representation lives in
//! [`crate::db::submission_repo`]; conversions are in [`crate::store`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Draft,
    Processing,
    Complete,
    Error,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Draft => "draft",
            SubmissionStatus::Processing => "processing",
            SubmissionStatus::Complete => "complete",
            SubmissionStatus::Error => "error",
        }
    }

    /// Parses a stored status string. Unknown values default to `Draft`
    /// with a warning rather than failing the whole read.
    pub fn parse(s: &str, submission_id: &str) -> Self {
        match s {
            "draft" => SubmissionStatus::Draft,
            "processing" => SubmissionStatus::Processing,
            "complete" => SubmissionStatus::Complete,
            "error" => SubmissionStatus::Error,
            other => {
                log::warn!(
                    "Unknown submission status '{}' for {}, defaulting to Draft",
                    other,
                    submission_id
                );
                SubmissionStatus::Draft
            }
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pipeline step recorded as having failed.
///
/// An explicit tagged variant rather than a raw string: an unrecognized
/// stored value parses to `Unknown`, and retry treats `Unknown` like
/// `Drive` (re-provision from the start) as a deliberate branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailedStep {
    Drive,
    Task,
    Unknown,
}

impl FailedStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailedStep::Drive => "drive",
            FailedStep::Task => "task",
            FailedStep::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str, submission_id: &str) -> Self {
        match s {
            "drive" => FailedStep::Drive,
            "task" => FailedStep::Task,
            other => {
                log::warn!(
                    "Unknown failed step '{}' for {}, treating as unknown",
                    other,
                    submission_id
                );
                FailedStep::Unknown
            }
        }
    }
}

impl std::fmt::Display for FailedStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for a single attachment captured by the intake form.
///
/// The file bytes live at `download_url` (uploaded out-of-band by the
/// form); the Drive step fetches them from there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMeta {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    pub download_url: String,
}

/// The immutable business data captured from the form.
///
/// Opaque to the pipeline beyond being handed to each step; the listing
/// additionally searches over client/title/type/email.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload {
    pub client_name: String,
    pub request_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub requestor_name: String,
    #[serde(default)]
    pub requestor_email: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentMeta>,
}

/// A file the Drive step uploaded to the destination folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub file_id: String,
    pub url: String,
    pub name: String,
}

/// Output of the Drive provisioning step. Present once the step has
/// succeeded at least once; never cleared by a later Task failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveResult {
    pub folder_id: String,
    pub folder_url: String,
    #[serde(default)]
    pub uploaded_files: Vec<UploadedFile>,
}

/// Output of the Task creation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub task_id: String,
    pub task_url: String,
}

/// Error bookkeeping for a failed pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub step: FailedStep,
    pub message: String,
    pub retry_count: u32,
    pub timestamp: DateTime<Utc>,
}

/// A stored art request submission — the unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub status: SubmissionStatus,
    pub request_payload: RequestPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive_result: Option<DriveResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_result: Option<TaskResult>,
    /// Present only while `status == Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<ErrorDetail>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Submission {
    /// Creates a fresh submission in `Draft`.
    pub fn new(payload: RequestPayload) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: SubmissionStatus::Draft,
            request_payload: payload,
            drive_result: None,
            task_result: None,
            error_detail: None,
            created_at: now,
            last_modified: now,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            SubmissionStatus::Draft,
            SubmissionStatus::Processing,
            SubmissionStatus::Complete,
            SubmissionStatus::Error,
        ] {
            assert_eq!(SubmissionStatus::parse(status.as_str(), "s1"), status);
        }
    }

    #[test]
    fn test_unknown_status_defaults_to_draft() {
        assert_eq!(
            SubmissionStatus::parse("superseded", "s1"),
            SubmissionStatus::Draft
        );
    }

    #[test]
    fn test_failed_step_parse() {
        assert_eq!(FailedStep::parse("drive", "s1"), FailedStep::Drive);
        assert_eq!(FailedStep::parse("task", "s1"), FailedStep::Task);
        assert_eq!(FailedStep::parse("upload", "s1"), FailedStep::Unknown);
        assert_eq!(FailedStep::parse("", "s1"), FailedStep::Unknown);
    }

    #[test]
    fn test_new_submission_starts_in_draft() {
        let sub = Submission::new(RequestPayload {
            client_name: "Acme".to_string(),
            request_type: "Mockup".to_string(),
            ..Default::default()
        });
        assert!(!sub.id.is_empty());
        assert_eq!(sub.status, SubmissionStatus::Draft);
        assert!(sub.drive_result.is_none());
        assert!(sub.task_result.is_none());
        assert!(sub.error_detail.is_none());
        assert!(sub.completed_at.is_none());
        assert_eq!(sub.created_at, sub.last_modified);
    }

    #[test]
    fn test_payload_serde_is_camel_case() {
        let payload = RequestPayload {
            client_name: "Acme".to_string(),
            request_type: "Mockup".to_string(),
            requestor_email: "jess@example.com".to_string(),
            attachments: vec![AttachmentMeta {
                name: "logo.png".to_string(),
                mime_type: Some("image/png".to_string()),
                size_bytes: Some(1024),
                download_url: "https://uploads.example/logo.png".to_string(),
            }],
            ..Default::default()
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["clientName"], "Acme");
        assert_eq!(json["requestType"], "Mockup");
        assert_eq!(json["attachments"][0]["downloadUrl"], "https://uploads.example/logo.png");

        let back: RequestPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_error_detail_serde() {
        let detail = ErrorDetail {
            step: FailedStep::Drive,
            message: "quota exceeded".to_string(),
            retry_count: 1,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["step"], "drive");
        assert_eq!(json["retryCount"], 1);
    }
}
