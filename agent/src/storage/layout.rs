//! Storage layout configuration

use std::path::PathBuf;

use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Environment variable overriding the storage base directory
pub const HOME_ENV_VAR: &str = "PUSHDEPLOY_HOME";

/// Storage layout for the agent
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Get the data directory holding the file-backed stores
    pub fn data_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("data"))
    }

    /// Get the model store document
    pub fn models_file(&self) -> File {
        File::new(self.base_dir.join("data").join("models.json"))
    }

    /// Get the schedule store document
    pub fn schedules_file(&self) -> File {
        File::new(self.base_dir.join("data").join("schedules.json"))
    }

    /// Get the default root for application releases
    pub fn deploys_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("deploys"))
    }

    /// Get the logs directory
    pub fn logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("logs"))
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), crate::errors::AgentError> {
        self.data_dir().create().await?;
        self.deploys_dir().create().await?;
        self.logs_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        if let Some(home) = std::env::var_os(HOME_ENV_VAR) {
            return Self::new(PathBuf::from(home));
        }

        // Use /etc/pushdeploy on Linux, or user home directory on other platforms
        #[cfg(target_os = "linux")]
        let base_dir = PathBuf::from("/etc/pushdeploy");

        #[cfg(not(target_os = "linux"))]
        let base_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".pushdeploy");

        Self::new(base_dir)
    }
}

#[cfg(not(target_os = "linux"))]
mod dirs {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
    }
}
