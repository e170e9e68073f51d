pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod integrations;
pub mod logging;
pub mod pipeline;
pub mod store;
pub mod submission;

pub use api::{ApiResponse, RetryResponse, SubmitResponse};
pub use config::{load_config, Config, ConfigError};
pub use error::{ArtflowError, Result};
pub use integrations::{
    AsanaClient, CreateTrackedTask, DriveClient, FailureAlert, NotifyFailure, ProvisionStorage,
    SlackNotifier, StepError,
};
pub use pipeline::{Pipeline, PipelineError};
pub use store::{SubmissionPage, SubmissionPatch, SubmissionQuery, SubmissionStore};
pub use submission::{
    AttachmentMeta, DriveResult, ErrorDetail, FailedStep, RequestPayload, Submission,
    SubmissionStatus, TaskResult, UploadedFile,
};
