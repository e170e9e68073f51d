//! Slack failure notifier.
//!
//! Implements [`NotifyFailure`]: posts a structured alert to an
//! incoming-webhook channel with the submission context and the
//! failing step name.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::config::SlackConfig;

use super::{check_status, FailureAlert, NotifyFailure, StepError};

pub struct SlackNotifier {
    client: Client,
    webhook_url: String,
}

impl SlackNotifier {
    pub fn new(config: SlackConfig) -> Self {
        Self {
            client: Client::new(),
            webhook_url: config.webhook_url,
        }
    }

    fn message(alert: &FailureAlert) -> serde_json::Value {
        let payload = &alert.payload;
        json!({
            "text": format!(
                "Art request pipeline failed at step '{}' for {} ({})",
                alert.step_label, payload.client_name, alert.submission_id
            ),
            "blocks": [
                {
                    "type": "section",
                    "text": {
                        "type": "mrkdwn",
                        "text": format!(
                            ":rotating_light: *Art request pipeline failure*\n\
                             *Step:* {}\n*Error:* {}",
                            alert.step_label, alert.error_message
                        ),
                    }
                },
                {
                    "type": "section",
                    "fields": [
                        {"type": "mrkdwn", "text": format!("*Client:*\n{}", payload.client_name)},
                        {"type": "mrkdwn", "text": format!("*Type:*\n{}", payload.request_type)},
                        {"type": "mrkdwn", "text": format!("*Requestor:*\n{}", payload.requestor_email)},
                        {"type": "mrkdwn", "text": format!("*Submission:*\n{}", alert.submission_id)},
                    ]
                }
            ]
        })
    }
}

#[async_trait]
impl NotifyFailure for SlackNotifier {
    async fn notify(&self, alert: &FailureAlert) -> Result<(), StepError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&Self::message(alert))
            .send()
            .await?;

        check_status("Slack", response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::RequestPayload;

    #[test]
    fn test_message_carries_step_error_and_submission_context() {
        let alert = FailureAlert {
            submission_id: "sub-1".to_string(),
            step_label: "drive".to_string(),
            error_message: "quota exceeded".to_string(),
            payload: RequestPayload {
                client_name: "Acme".to_string(),
                request_type: "Mockup".to_string(),
                requestor_email: "jess@example.com".to_string(),
                ..Default::default()
            },
        };

        let message = SlackNotifier::message(&alert);
        let text = message["text"].as_str().unwrap();
        assert!(text.contains("drive"));
        assert!(text.contains("Acme"));
        assert!(text.contains("sub-1"));

        let rendered = message.to_string();
        assert!(rendered.contains("quota exceeded"));
        assert!(rendered.contains("jess@example.com"));
    }
}
