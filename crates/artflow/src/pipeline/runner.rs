//! Pipeline orchestrator.
//!
//! Sequences the Drive and Task steps for a submission, persisting
//! status transitions before and after each step so a failed run can
//! resume from the exact step that failed. Collaborators are held as
//! trait objects, so tests replace them with fakes.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info_span, warn, Instrument};

use crate::integrations::{CreateTrackedTask, FailureAlert, NotifyFailure, ProvisionStorage, StepError};
use crate::store::{stored_retry_count, SubmissionStore};
use crate::submission::{ErrorDetail, FailedStep, Submission, SubmissionStatus, TaskResult};

use super::error::PipelineError;

/// Which step an execution begins at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartAt {
    Drive,
    Task,
}

pub struct Pipeline {
    store: SubmissionStore,
    storage: Arc<dyn ProvisionStorage>,
    tasks: Arc<dyn CreateTrackedTask>,
    notifier: Arc<dyn NotifyFailure>,
}

impl Pipeline {
    pub fn new(
        store: SubmissionStore,
        storage: Arc<dyn ProvisionStorage>,
        tasks: Arc<dyn CreateTrackedTask>,
        notifier: Arc<dyn NotifyFailure>,
    ) -> Self {
        Self {
            store,
            storage,
            tasks,
            notifier,
        }
    }

    /// Runs the full pipeline for a fresh submission (`draft` or
    /// `processing`). Returns the created task on success.
    pub async fn run(&self, submission_id: &str) -> Result<TaskResult, PipelineError> {
        let mut submission =
            self.store
                .get(submission_id)?
                .ok_or_else(|| PipelineError::NotFound {
                    id: submission_id.to_string(),
                })?;

        match submission.status {
            SubmissionStatus::Draft | SubmissionStatus::Processing => {}
            status => {
                return Err(PipelineError::InvalidState {
                    id: submission_id.to_string(),
                    status,
                    expected: SubmissionStatus::Draft,
                })
            }
        }

        // Read the lingering counter before the save below clears the
        // row's error columns: a `processing` submission may be a
        // claimed retry whose process died before executing any step,
        // and resuming it must continue the count.
        let prior_retries = stored_retry_count(&self.store, submission_id)?;
        submission.status = SubmissionStatus::Processing;
        self.store.save(&mut submission)?;
        let span = info_span!("pipeline_run", submission_id = %submission_id);
        self.execute(submission, StartAt::Drive, prior_retries)
            .instrument(span)
            .await
    }

    /// Retries a failed submission, resuming from the step recorded in
    /// its error detail:
    /// - `task`: skip Drive, reuse the persisted drive result.
    /// - `drive` or anything unrecognized: re-run the full sequence —
    ///   partial uploads may be incomplete, so re-provisioning is the
    ///   conservative default.
    ///
    /// The first write is a compare-and-swap `error → processing`; a
    /// concurrent retry that lost the race gets `Conflict` instead of
    /// running the steps twice.
    pub async fn retry(&self, submission_id: &str) -> Result<TaskResult, PipelineError> {
        let mut submission =
            self.store
                .get(submission_id)?
                .ok_or_else(|| PipelineError::NotFound {
                    id: submission_id.to_string(),
                })?;

        if submission.status != SubmissionStatus::Error {
            return Err(PipelineError::InvalidState {
                id: submission_id.to_string(),
                status: submission.status,
                expected: SubmissionStatus::Error,
            });
        }

        let failed_step = submission
            .error_detail
            .as_ref()
            .map(|d| d.step)
            .unwrap_or(FailedStep::Unknown);
        let prior_retries = submission
            .error_detail
            .as_ref()
            .map(|d| d.retry_count)
            .unwrap_or(0);

        if !self.store.claim_for_retry(submission_id)? {
            return Err(PipelineError::Conflict {
                id: submission_id.to_string(),
            });
        }
        submission.status = SubmissionStatus::Processing;
        submission.error_detail = None;

        // Resuming at Task requires the persisted drive result; without
        // it the submission is mid-provisioning and everything reruns.
        let start = match failed_step {
            FailedStep::Task if submission.drive_result.is_some() => StartAt::Task,
            FailedStep::Task => {
                warn!(
                    submission_id = %submission_id,
                    "Task-step retry without a stored drive result, re-running Drive"
                );
                StartAt::Drive
            }
            FailedStep::Drive | FailedStep::Unknown => StartAt::Drive,
        };

        let span = info_span!(
            "pipeline_retry",
            submission_id = %submission_id,
            failed_step = failed_step.as_str(),
        );
        self.execute(submission, start, prior_retries)
            .instrument(span)
            .await
    }

    async fn execute(
        &self,
        mut submission: Submission,
        start: StartAt,
        prior_retries: u32,
    ) -> Result<TaskResult, PipelineError> {
        if start == StartAt::Drive {
            let provisioned = self
                .storage
                .provision(&submission.request_payload)
                .instrument(info_span!("drive_step"))
                .await;

            match provisioned {
                Ok(result) => {
                    submission.drive_result = Some(result);
                    self.store.save(&mut submission)?;
                }
                Err(e) => {
                    return self
                        .fail(submission, FailedStep::Drive, e, prior_retries)
                        .await;
                }
            }
        }

        // Set either just above or in a previous successful Drive run.
        let drive_result = submission
            .drive_result
            .clone()
            .expect("drive result present after drive step");

        let created = self
            .tasks
            .create_task(&submission.request_payload, &drive_result)
            .instrument(info_span!("task_step"))
            .await;

        match created {
            Ok(task_result) => {
                submission.task_result = Some(task_result.clone());
                submission.status = SubmissionStatus::Complete;
                submission.completed_at = Some(Utc::now());
                submission.error_detail = None;
                self.store.save(&mut submission)?;
                Ok(task_result)
            }
            Err(e) => {
                self.fail(submission, FailedStep::Task, e, prior_retries)
                    .await
            }
        }
    }

    /// Persists the failure, fires the notification, and surfaces the
    /// step error. The notifier's own failure is logged and never masks
    /// the pipeline error.
    async fn fail(
        &self,
        mut submission: Submission,
        step: FailedStep,
        error: StepError,
        prior_retries: u32,
    ) -> Result<TaskResult, PipelineError> {
        let message = error.to_string();

        submission.status = SubmissionStatus::Error;
        submission.error_detail = Some(ErrorDetail {
            step,
            message: message.clone(),
            retry_count: prior_retries + 1,
            timestamp: Utc::now(),
        });
        self.store.save(&mut submission)?;

        let alert = FailureAlert {
            submission_id: submission.id.clone(),
            step_label: step.as_str().to_string(),
            error_message: message,
            payload: submission.request_payload.clone(),
        };
        if let Err(e) = self.notifier.notify(&alert).await {
            warn!(
                submission_id = %submission.id,
                "Failure notification could not be delivered: {}", e
            );
        }

        Err(PipelineError::Step {
            step,
            source: error,
        })
    }
}
