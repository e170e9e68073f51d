//! Asana task creation client.
//!
//! Implements [`CreateTrackedTask`]: files a task in the configured
//! project with a formatted description pointing at the provisioned
//! Drive folder and its uploaded files.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::fmt::Write;

use crate::config::AsanaConfig;
use crate::submission::{DriveResult, RequestPayload, TaskResult};

use super::{check_status, CreateTrackedTask, StepError};

#[derive(Debug, Deserialize)]
struct TaskData {
    gid: String,
    #[serde(default)]
    permalink_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskEnvelope {
    data: TaskData,
}

pub struct AsanaClient {
    client: Client,
    api_base: String,
    token: SecretString,
    project_gid: String,
    custom_fields: HashMap<String, String>,
}

impl AsanaClient {
    pub fn new(config: AsanaConfig) -> Self {
        Self {
            client: Client::new(),
            api_base: config.api_base,
            token: config.access_token,
            project_gid: config.project_gid,
            custom_fields: config.custom_fields,
        }
    }

    fn task_name(payload: &RequestPayload) -> String {
        if payload.title.trim().is_empty() {
            format!("{}: {}", payload.client_name, payload.request_type)
        } else {
            format!("{}: {}", payload.client_name, payload.title)
        }
    }

    /// Task description block: request fields plus folder and file links.
    fn task_notes(payload: &RequestPayload, drive: &DriveResult) -> String {
        // writeln! to a String cannot fail; discard the Results.
        let mut notes = String::new();
        let _ = writeln!(notes, "Client: {}", payload.client_name);
        let _ = writeln!(notes, "Request type: {}", payload.request_type);
        if !payload.requestor_name.is_empty() {
            let _ = writeln!(notes, "Requested by: {}", payload.requestor_name);
        }
        if !payload.requestor_email.is_empty() {
            let _ = writeln!(notes, "Contact: {}", payload.requestor_email);
        }
        if !payload.products.is_empty() {
            let _ = writeln!(notes, "Products: {}", payload.products.join(", "));
        }
        if let Some(extra) = &payload.notes {
            let _ = writeln!(notes, "\nNotes:\n{}", extra);
        }

        let _ = writeln!(notes, "\nDrive folder: {}", drive.folder_url);
        if !drive.uploaded_files.is_empty() {
            let _ = writeln!(notes, "Files:");
            for file in &drive.uploaded_files {
                let _ = writeln!(notes, "- {}: {}", file.name, file.url);
            }
        }

        notes
    }
}

#[async_trait]
impl CreateTrackedTask for AsanaClient {
    async fn create_task(
        &self,
        payload: &RequestPayload,
        drive: &DriveResult,
    ) -> Result<TaskResult, StepError> {
        let mut data = json!({
            "name": Self::task_name(payload),
            "notes": Self::task_notes(payload, drive),
            "projects": [self.project_gid],
        });
        if !self.custom_fields.is_empty() {
            data["custom_fields"] = json!(self.custom_fields);
        }

        let response = self
            .client
            .post(format!("{}/api/1.0/tasks", self.api_base))
            .bearer_auth(self.token.expose_secret())
            .json(&json!({ "data": data }))
            .send()
            .await?;

        let response = check_status("Asana", response).await?;
        let envelope: TaskEnvelope = response.json().await?;

        let task_url = envelope
            .data
            .permalink_url
            .ok_or(StepError::MalformedResponse {
                service: "Asana",
                field: "permalink_url",
            })?;

        debug!("Created Asana task {} in project {}", envelope.data.gid, self.project_gid);

        Ok(TaskResult {
            task_id: envelope.data.gid,
            task_url,
        })
    }
}
