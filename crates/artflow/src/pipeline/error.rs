use thiserror::Error;

use crate::db::DatabaseError;
use crate::integrations::StepError;
use crate::submission::{FailedStep, SubmissionStatus};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Submission not found: {id}")]
    NotFound { id: String },

    #[error("Submission {id} is in status '{status}', expected '{expected}'")]
    InvalidState {
        id: String,
        status: SubmissionStatus,
        expected: SubmissionStatus,
    },

    #[error("Submission {id} was already claimed by a concurrent retry")]
    Conflict { id: String },

    #[error("{step} step failed: {source}")]
    Step {
        step: FailedStep,
        #[source]
        source: StepError,
    },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
