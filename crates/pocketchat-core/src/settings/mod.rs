//! Client configuration, persisted as JSON under the platform config dir.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::chat::services::history_window::WindowConfig;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_SYSTEM_PREAMBLE: &str = "send messages in markdown format";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot determine config directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Everything the core needs from the host besides the conversation
/// itself. Credential capture is the first-run screen's job; the key
/// simply lands here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub api_key: Option<String>,
    /// Overrides the default completion endpoint when set.
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub window: WindowConfig,
    pub system_preamble: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            window: WindowConfig::default(),
            system_preamble: DEFAULT_SYSTEM_PREAMBLE.to_string(),
        }
    }
}

/// JSON-file settings storage.
pub struct JsonSettingsRepository {
    file_path: PathBuf,
}

impl JsonSettingsRepository {
    /// Repository at the platform config path.
    pub fn new() -> SettingsResult<Self> {
        let config_dir = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
        Ok(Self {
            file_path: config_dir.join("pocketchat").join("settings.json"),
        })
    }

    /// Repository at an explicit path.
    pub fn at(file_path: PathBuf) -> Self {
        Self { file_path }
    }

    /// Load settings; a missing file yields the defaults.
    pub async fn load(&self) -> SettingsResult<ClientSettings> {
        let contents = match tokio::fs::read_to_string(&self.file_path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ClientSettings::default());
            }
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_str(&contents)?)
    }

    pub async fn save(&self, settings: &ClientSettings) -> SettingsResult<()> {
        if let Some(parent) = self.file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(settings)?;
        tokio::fs::write(&self.file_path, contents).await?;

        info!(path = %self.file_path.display(), "Saved client settings");
        Ok(())
    }
}
