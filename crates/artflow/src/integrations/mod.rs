//! External collaborator contracts and vendor clients.
//!
//! The orchestrator only sees three narrow capability traits; the real
//! Drive/Asana/Slack clients live behind them so tests can swap in fakes.

use async_trait::async_trait;
use thiserror::Error;

use crate::submission::{DriveResult, RequestPayload, TaskResult};

pub mod asana;
pub mod drive;
pub mod slack;

pub use asana::AsanaClient;
pub use drive::DriveClient;
pub use slack::SlackNotifier;

/// Maximum length for vendor error bodies carried into errors and logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Truncates a vendor error response body to a reasonable length so
/// oversized (or sensitive) payloads never flood logs.
pub(crate) fn truncate_error_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body.to_string()
    }
}

/// Surfaces non-success statuses as [`StepError::Api`] with a truncated body.
pub(crate) async fn check_status(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, StepError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(StepError::Api {
        service,
        status: status.as_u16(),
        body: truncate_error_body(&body),
    })
}

/// A single step failure against an external service.
#[derive(Error, Debug)]
pub enum StepError {
    /// Transport-level failure (DNS, TLS, timeout, connection reset).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("{service} returned {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// The service answered 2xx but the body was not the expected shape.
    #[error("{service} response missing '{field}'")]
    MalformedResponse {
        service: &'static str,
        field: &'static str,
    },

    /// An attachment could not be fetched or uploaded.
    #[error("Attachment '{name}' failed: {reason}")]
    Attachment { name: String, reason: String },
}

/// Context handed to the failure notifier.
#[derive(Debug, Clone)]
pub struct FailureAlert {
    pub submission_id: String,
    pub step_label: String,
    pub error_message: String,
    pub payload: RequestPayload,
}

/// Creates/locates the destination storage folder and uploads the
/// submission's attachments. Must be safe to call again after a partial
/// failure; folder lookup is by deterministic name, so a re-run reuses
/// the folder instead of duplicating it. All-or-nothing per invocation:
/// on any failure no partial [`DriveResult`] is returned.
#[async_trait]
pub trait ProvisionStorage: Send + Sync {
    async fn provision(&self, payload: &RequestPayload) -> Result<DriveResult, StepError>;
}

/// Creates the tracked task in the external PM tool, pointing at the
/// provisioned folder. Never mutates storage state.
#[async_trait]
pub trait CreateTrackedTask: Send + Sync {
    async fn create_task(
        &self,
        payload: &RequestPayload,
        drive: &DriveResult,
    ) -> Result<TaskResult, StepError>;
}

/// Posts a structured failure alert to the messaging channel.
/// Fire-and-forget from the orchestrator's perspective.
#[async_trait]
pub trait NotifyFailure: Send + Sync {
    async fn notify(&self, alert: &FailureAlert) -> Result<(), StepError>;
}
