//! Loading of `config.json`.

use crate::error::ReportError;
use eyre::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Contents of the run configuration file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// The channel whose uploads are reported on.
    pub channel_id: String,
    /// API key for `--auth api`.
    #[serde(default)]
    pub developer_key: Option<String>,
    /// OAuth client secret as downloaded from the Google Cloud console.
    #[serde(default = "default_client_secret_file")]
    pub client_secret_file: PathBuf,
    /// Where the OAuth token is cached between runs.
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
}

fn default_client_secret_file() -> PathBuf {
    PathBuf::from("client_secret.json")
}

fn default_token_file() -> PathBuf {
    PathBuf::from("token.json")
}

impl Config {
    pub async fn load(path: &Path) -> eyre::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read config file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parse config file {}", path.display()))
    }

    pub fn from_json(raw: &str) -> eyre::Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        if config.channel_id.trim().is_empty() {
            eyre::bail!("channelId must not be empty");
        }
        Ok(config)
    }

    /// The API key, or an error if the config does not carry one.
    pub fn developer_key(&self) -> eyre::Result<&str> {
        match self.developer_key.as_deref() {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(ReportError::MissingDeveloperKey.into()),
        }
    }
}
