//! Google Drive provisioning client.
//!
//! Implements [`ProvisionStorage`]: locate-or-create the request folder
//! under the configured parent, then upload every attachment into it.
//! The folder name is derived deterministically from the payload, so a
//! retried invocation finds the existing folder instead of creating a
//! duplicate.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::config::DriveConfig;
use crate::submission::{AttachmentMeta, DriveResult, RequestPayload, UploadedFile};

use super::{check_status, ProvisionStorage, StepError};

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const MULTIPART_BOUNDARY: &str = "artflow_upload_boundary";

#[derive(Debug, Deserialize)]
struct FileResource {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "webViewLink", default)]
    web_view_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileResource>,
}

pub struct DriveClient {
    client: Client,
    api_base: String,
    upload_base: String,
    parent_folder_id: String,
    token: SecretString,
}

impl DriveClient {
    pub fn new(config: DriveConfig) -> Self {
        Self {
            client: Client::new(),
            api_base: config.api_base,
            upload_base: config.upload_base,
            parent_folder_id: config.parent_folder_id,
            token: config.access_token,
        }
    }

    /// Deterministic folder name for a request: `"{client} - {title}"`,
    /// falling back to the request type when the title is empty.
    fn folder_name(payload: &RequestPayload) -> String {
        if payload.title.trim().is_empty() {
            format!("{} - {}", payload.client_name, payload.request_type)
        } else {
            format!("{} - {}", payload.client_name, payload.title)
        }
    }

    async fn find_folder(&self, name: &str) -> Result<Option<FileResource>, StepError> {
        // Drive query strings escape backslash and single quote.
        let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
        let query = format!(
            "name = '{}' and '{}' in parents and mimeType = '{}' and trashed = false",
            escaped, self.parent_folder_id, FOLDER_MIME_TYPE
        );

        let response = self
            .client
            .get(format!("{}/drive/v3/files", self.api_base))
            .bearer_auth(self.token.expose_secret())
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id,name,webViewLink)"),
                ("pageSize", "1"),
            ])
            .send()
            .await?;

        let response = check_status("Drive", response).await?;
        let list: FileList = response.json().await?;
        Ok(list.files.into_iter().next())
    }

    async fn create_folder(&self, name: &str) -> Result<FileResource, StepError> {
        let body = json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [self.parent_folder_id],
        });

        let response = self
            .client
            .post(format!("{}/drive/v3/files", self.api_base))
            .bearer_auth(self.token.expose_secret())
            .query(&[("fields", "id,name,webViewLink")])
            .json(&body)
            .send()
            .await?;

        let response = check_status("Drive", response).await?;
        Ok(response.json().await?)
    }

    async fn fetch_attachment(&self, attachment: &AttachmentMeta) -> Result<Vec<u8>, StepError> {
        let response = self
            .client
            .get(&attachment.download_url)
            .send()
            .await
            .map_err(|e| StepError::Attachment {
                name: attachment.name.clone(),
                reason: format!("fetch failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(StepError::Attachment {
                name: attachment.name.clone(),
                reason: format!("fetch returned {}", response.status().as_u16()),
            });
        }

        let bytes = response.bytes().await.map_err(|e| StepError::Attachment {
            name: attachment.name.clone(),
            reason: format!("fetch body failed: {}", e),
        })?;
        Ok(bytes.to_vec())
    }

    async fn upload_file(
        &self,
        folder_id: &str,
        attachment: &AttachmentMeta,
        bytes: Vec<u8>,
    ) -> Result<UploadedFile, StepError> {
        let mime = attachment
            .mime_type
            .clone()
            .or_else(|| {
                mime_guess::from_path(&attachment.name)
                    .first()
                    .map(|m| m.to_string())
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let metadata = json!({
            "name": attachment.name,
            "parents": [folder_id],
        });

        // Drive's multipart upload is multipart/related: a JSON metadata
        // part followed by the raw media part.
        let mut body: Vec<u8> = Vec::with_capacity(bytes.len() + 512);
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n\
                 --{b}\r\nContent-Type: {mime}\r\n\r\n",
                b = MULTIPART_BOUNDARY,
                meta = metadata,
                mime = mime,
            )
            .as_bytes(),
        );
        body.extend_from_slice(&bytes);
        body.extend_from_slice(format!("\r\n--{}--", MULTIPART_BOUNDARY).as_bytes());

        let response = self
            .client
            .post(format!("{}/drive/v3/files", self.upload_base))
            .bearer_auth(self.token.expose_secret())
            .query(&[
                ("uploadType", "multipart"),
                ("fields", "id,name,webViewLink"),
            ])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .body(body)
            .send()
            .await?;

        let response = check_status("Drive", response).await?;
        let resource: FileResource = response.json().await?;

        Ok(UploadedFile {
            url: resource.web_view_link.unwrap_or_default(),
            name: resource.name.unwrap_or_else(|| attachment.name.clone()),
            file_id: resource.id,
        })
    }
}

#[async_trait]
impl ProvisionStorage for DriveClient {
    async fn provision(&self, payload: &RequestPayload) -> Result<DriveResult, StepError> {
        let name = Self::folder_name(payload);

        let folder = match self.find_folder(&name).await? {
            Some(existing) => {
                debug!("Reusing Drive folder '{}' ({})", name, existing.id);
                existing
            }
            None => {
                debug!("Creating Drive folder '{}'", name);
                self.create_folder(&name).await?
            }
        };

        let folder_url = folder.web_view_link.ok_or(StepError::MalformedResponse {
            service: "Drive",
            field: "webViewLink",
        })?;

        // All-or-nothing: any attachment failure fails the whole step,
        // and the caller persists no partial result.
        let mut uploaded_files = Vec::with_capacity(payload.attachments.len());
        for attachment in &payload.attachments {
            let bytes = self.fetch_attachment(attachment).await?;
            let uploaded = self.upload_file(&folder.id, attachment, bytes).await?;
            uploaded_files.push(uploaded);
        }

        Ok(DriveResult {
            folder_id: folder.id,
            folder_url,
            uploaded_files,
        })
    }
}
