//! Application configuration file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use cloudlink_auth::{AuthConfig, AuthorizationScope};
use cloudlink_common::{Error, Result};
use cloudlink_storage::DriveEndpoints;

/// Display name of the folder uploads land in.
pub const DEFAULT_FOLDER_NAME: &str = "Backup Folder";
/// Seconds to wait for the user to finish the consent flow.
pub const DEFAULT_CONSENT_TIMEOUT_SECS: u64 = 300;

/// Settings for one CloudLink installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Identity provider settings.
    pub auth: AuthConfig,
    /// Storage API endpoints.
    pub storage: DriveEndpoints,
    /// Permission requested for the session.
    pub scope: AuthorizationScope,
    /// Folder created for each upload.
    pub folder_name: String,
    /// How long the consent flow may take.
    pub consent_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            auth: AuthConfig::default(),
            storage: DriveEndpoints::default(),
            scope: AuthorizationScope::default(),
            folder_name: DEFAULT_FOLDER_NAME.to_string(),
            consent_timeout_secs: DEFAULT_CONSENT_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    /// Default location: `<config dir>/cloudlink/config.json`.
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("cloudlink").join("config.json"))
            .ok_or_else(|| Error::InvalidInput("No configuration directory on this platform".to_string()))
    }

    /// Load configuration from `path`.
    ///
    /// # Errors
    /// - `Io` if the file cannot be read
    /// - `Serialization` if it is not valid configuration JSON
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        match tokio::fs::try_exists(path).await? {
            true => Self::load(path).await,
            false => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Write configuration to `path`, creating parent directories.
    pub async fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Check values that would otherwise fail mid-workflow.
    pub fn validate(&self) -> Result<()> {
        if self.folder_name.trim().is_empty() {
            return Err(Error::InvalidInput("folder_name cannot be empty".to_string()));
        }
        if self.consent_timeout_secs == 0 {
            return Err(Error::InvalidInput(
                "consent_timeout_secs must be positive".to_string(),
            ));
        }
        if self.auth.client_id.is_empty() {
            return Err(Error::InvalidInput("auth.client_id cannot be empty".to_string()));
        }
        Ok(())
    }
}
