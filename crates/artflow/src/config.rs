//! Service configuration.
//!
//! Loaded from a JSON file; vendor tokens are wrapped in `SecretString`
//! so they never appear in `Debug` output or logs.

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

fn default_drive_api_base() -> String {
    "https://www.googleapis.com".to_string()
}

fn default_drive_upload_base() -> String {
    "https://www.googleapis.com/upload".to_string()
}

fn default_asana_api_base() -> String {
    "https://app.asana.com".to_string()
}

/// Google Drive section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveConfig {
    /// API base override, mainly for tests against a local server.
    #[serde(default = "default_drive_api_base")]
    pub api_base: String,
    #[serde(default = "default_drive_upload_base")]
    pub upload_base: String,
    /// Parent folder all request folders are created under.
    pub parent_folder_id: String,
    pub access_token: SecretString,
}

/// Asana section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsanaConfig {
    #[serde(default = "default_asana_api_base")]
    pub api_base: String,
    pub access_token: SecretString,
    /// Project the tracked task is filed under.
    pub project_gid: String,
    /// Optional custom field gid → enum/text value, passed through as-is.
    #[serde(default)]
    pub custom_fields: std::collections::HashMap<String, String>,
}

/// Slack section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackConfig {
    pub webhook_url: String,
}

/// Top-level service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// SQLite database path; defaults to `~/.artflow/data/artflow.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    pub drive: DriveConfig,
    pub asana: AsanaConfig,
    pub slack: SlackConfig,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.drive.parent_folder_id.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "drive.parentFolderId must not be empty".to_string(),
        });
    }

    if config.asana.project_gid.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "asana.projectGid must not be empty".to_string(),
        });
    }

    let webhook = &config.slack.webhook_url;
    if !webhook.starts_with("https://") {
        return Err(ConfigError::Validation {
            message: format!("slack.webhookUrl must be https, got '{}'", webhook),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config_json() -> String {
        r#"{
            "drive": {
                "parentFolderId": "root-folder",
                "accessToken": "drive-token"
            },
            "asana": {
                "accessToken": "asana-token",
                "projectGid": "1200000000000000",
                "customFields": {"1201": "art-request"}
            },
            "slack": {
                "webhookUrl": "https://hooks.slack.com/services/T0/B0/xyz"
            }
        }"#
        .to_string()
    }

    #[test]
    fn test_load_valid_config() {
        let config = load_config_from_str(&valid_config_json()).unwrap();
        assert_eq!(config.drive.parent_folder_id, "root-folder");
        assert_eq!(config.drive.api_base, "https://www.googleapis.com");
        assert_eq!(config.asana.api_base, "https://app.asana.com");
        assert_eq!(config.asana.custom_fields.get("1201").unwrap(), "art-request");
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_token_not_in_debug_output() {
        let config = load_config_from_str(&valid_config_json()).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("drive-token"));
        assert!(!debug.contains("asana-token"));
    }

    #[test]
    fn test_empty_parent_folder_rejected() {
        let json = valid_config_json().replace("root-folder", "  ");
        let err = load_config_from_str(&json).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_non_https_webhook_rejected() {
        let json = valid_config_json().replace("https://hooks", "http://hooks");
        let err = load_config_from_str(&json).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = load_config_from_str("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::ParseJson(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, valid_config_json()).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.asana.project_gid, "1200000000000000");
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = load_config("/nonexistent/artflow/config.json").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }
}
