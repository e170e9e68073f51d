//! Shared fakes and harness for pipeline integration tests.
//!
//! The fakes count invocations and replay scripted outcomes so tests
//! can assert exactly which steps ran and in which order.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use artflow::db::Database;
use artflow::integrations::{
    CreateTrackedTask, FailureAlert, NotifyFailure, ProvisionStorage, StepError,
};
use artflow::store::SubmissionStore;
use artflow::submission::{DriveResult, RequestPayload, TaskResult};
use artflow::Pipeline;

/// Scripted outcome for a fake step.
pub enum Outcome<T> {
    Ok(T),
    Fail(&'static str),
}

fn to_step_error(service: &'static str, message: &str) -> StepError {
    StepError::Api {
        service,
        status: 500,
        body: message.to_string(),
    }
}

/// Fake Drive collaborator: counts calls, replays scripted outcomes.
/// Once the script is exhausted it keeps returning the last default.
pub struct FakeDrive {
    pub calls: AtomicUsize,
    outcomes: Mutex<VecDeque<Outcome<DriveResult>>>,
}

impl FakeDrive {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            outcomes: Mutex::new(VecDeque::new()),
        })
    }

    pub fn push(&self, outcome: Outcome<DriveResult>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn default_result() -> DriveResult {
        DriveResult {
            folder_id: "f1".to_string(),
            folder_url: "https://drive/f1".to_string(),
            uploaded_files: vec![],
        }
    }
}

#[async_trait]
impl ProvisionStorage for FakeDrive {
    async fn provision(&self, _: &RequestPayload) -> Result<DriveResult, StepError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.outcomes.lock().unwrap().pop_front() {
            Some(Outcome::Ok(result)) => Ok(result),
            Some(Outcome::Fail(message)) => Err(to_step_error("Drive", message)),
            None => Ok(Self::default_result()),
        }
    }
}

/// Fake Asana collaborator.
pub struct FakeTasks {
    pub calls: AtomicUsize,
    outcomes: Mutex<VecDeque<Outcome<TaskResult>>>,
    /// Drive call count observed at the moment of each task call, for
    /// asserting step ordering.
    pub drive_counts_at_call: Mutex<Vec<usize>>,
    drive: Arc<FakeDrive>,
}

impl FakeTasks {
    pub fn new(drive: Arc<FakeDrive>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            outcomes: Mutex::new(VecDeque::new()),
            drive_counts_at_call: Mutex::new(Vec::new()),
            drive,
        })
    }

    pub fn push(&self, outcome: Outcome<TaskResult>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn default_result() -> TaskResult {
        TaskResult {
            task_id: "t1".to_string(),
            task_url: "https://asana/t1".to_string(),
        }
    }
}

#[async_trait]
impl CreateTrackedTask for FakeTasks {
    async fn create_task(
        &self,
        _: &RequestPayload,
        _: &DriveResult,
    ) -> Result<TaskResult, StepError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.drive_counts_at_call
            .lock()
            .unwrap()
            .push(self.drive.call_count());
        match self.outcomes.lock().unwrap().pop_front() {
            Some(Outcome::Ok(result)) => Ok(result),
            Some(Outcome::Fail(message)) => Err(to_step_error("Asana", message)),
            None => Ok(Self::default_result()),
        }
    }
}

/// Fake Slack notifier recording every alert it receives.
pub struct FakeNotifier {
    pub alerts: Mutex<Vec<FailureAlert>>,
    pub fail_next: AtomicUsize,
}

impl FakeNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            alerts: Mutex::new(Vec::new()),
            fail_next: AtomicUsize::new(0),
        })
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }

    pub fn last_step_label(&self) -> Option<String> {
        self.alerts
            .lock()
            .unwrap()
            .last()
            .map(|a| a.step_label.clone())
    }
}

#[async_trait]
impl NotifyFailure for FakeNotifier {
    async fn notify(&self, alert: &FailureAlert) -> Result<(), StepError> {
        self.alerts.lock().unwrap().push(alert.clone());
        if self.fail_next.swap(0, Ordering::SeqCst) > 0 {
            return Err(StepError::Api {
                service: "Slack",
                status: 503,
                body: "webhook unavailable".to_string(),
            });
        }
        Ok(())
    }
}

/// Everything a pipeline test needs, wired over an in-memory database.
pub struct Harness {
    pub db: Database,
    pub store: SubmissionStore,
    pub pipeline: Pipeline,
    pub drive: Arc<FakeDrive>,
    pub tasks: Arc<FakeTasks>,
    pub notifier: Arc<FakeNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        let db = Database::open_in_memory().unwrap();
        let store = SubmissionStore::new(db.clone());
        let drive = FakeDrive::new();
        let tasks = FakeTasks::new(drive.clone());
        let notifier = FakeNotifier::new();
        let pipeline = Pipeline::new(
            store.clone(),
            drive.clone(),
            tasks.clone(),
            notifier.clone(),
        );

        Self {
            db,
            store,
            pipeline,
            drive,
            tasks,
            notifier,
        }
    }

    /// Overwrites the recorded failing step at row level, simulating an
    /// older or foreign writer having stored an unrecognized value.
    pub fn corrupt_error_step(&self, id: &str, step: &str) {
        self.db
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE submissions SET error_step = ?2 WHERE id = ?1",
                    rusqlite::params![id, step],
                )?;
                Ok(())
            })
            .unwrap();
    }

    pub fn payload(&self) -> RequestPayload {
        RequestPayload {
            client_name: "Acme".to_string(),
            request_type: "Mockup".to_string(),
            title: "Spring mockups".to_string(),
            requestor_name: "Jess".to_string(),
            requestor_email: "jess@example.com".to_string(),
            ..Default::default()
        }
    }
}
