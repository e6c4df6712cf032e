//! Settings file management

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;
use crate::storage::layout::StorageLayout;

/// Agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit stdout logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Also write rolling log files under the layout's logs directory
    #[serde(default)]
    pub log_to_file: bool,

    /// HTTP service configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Root of the per-application release trees. Defaults to the layout's
    /// `deploys` directory.
    #[serde(default)]
    pub deploys_root: Option<PathBuf>,

    /// Model store document. Defaults to the layout's `data/models.json`.
    #[serde(default)]
    pub models_file: Option<PathBuf>,

    /// Schedule store document. Defaults to the layout's `data/schedules.json`.
    #[serde(default)]
    pub schedules_file: Option<PathBuf>,

    /// Release pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Maximum number of deploys running at once
    #[serde(default = "default_max_concurrent_deploys")]
    pub max_concurrent_deploys: usize,

    /// Maximum seconds to wait for a graceful shutdown
    #[serde(default = "default_max_shutdown_delay")]
    pub max_shutdown_delay_secs: u64,
}

fn default_max_concurrent_deploys() -> usize {
    4
}

fn default_max_shutdown_delay() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_to_file: false,
            server: ServerSettings::default(),
            deploys_root: None,
            models_file: None,
            schedules_file: None,
            pipeline: PipelineSettings::default(),
            max_concurrent_deploys: default_max_concurrent_deploys(),
            max_shutdown_delay_secs: default_max_shutdown_delay(),
        }
    }
}

impl Settings {
    pub fn deploys_root(&self, layout: &StorageLayout) -> PathBuf {
        self.deploys_root
            .clone()
            .unwrap_or_else(|| layout.deploys_dir().path().to_path_buf())
    }

    pub fn models_file(&self, layout: &StorageLayout) -> PathBuf {
        self.models_file
            .clone()
            .unwrap_or_else(|| layout.models_file().path().to_path_buf())
    }

    pub fn schedules_file(&self, layout: &StorageLayout) -> PathBuf {
        self.schedules_file
            .clone()
            .unwrap_or_else(|| layout.schedules_file().path().to_path_buf())
    }
}

/// HTTP service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host to bind to
    #[serde(default = "default_server_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Base URL the hook uses to reach the service. Derived from host and
    /// port when absent.
    #[serde(default)]
    pub public_url: Option<String>,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    7010
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            public_url: None,
        }
    }
}

impl ServerSettings {
    pub fn base_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
    }
}

/// Release pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Number of releases kept after a successful promotion
    #[serde(default = "default_retention")]
    pub retention: usize,

    /// Manifest file name at the release root
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,

    /// Dependency manifest that triggers the install stage
    #[serde(default = "default_dependency_manifest")]
    pub dependency_manifest: String,

    /// Directory the installer populates inside a release
    #[serde(default = "default_dependency_dir")]
    pub dependency_dir: String,

    /// Cache directory name under the deploy root
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Installer executable
    #[serde(default = "default_installer_program")]
    pub installer_program: String,

    /// Installer arguments
    #[serde(default = "default_installer_args")]
    pub installer_args: Vec<String>,
}

fn default_retention() -> usize {
    3
}

fn default_manifest_file() -> String {
    "hoist.json".to_string()
}

fn default_dependency_manifest() -> String {
    "package.json".to_string()
}

fn default_dependency_dir() -> String {
    "node_modules".to_string()
}

fn default_cache_dir() -> String {
    ".npmcache".to_string()
}

fn default_installer_program() -> String {
    "npm".to_string()
}

fn default_installer_args() -> Vec<String> {
    ["install", "--production", "--loglevel", "info"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            retention: default_retention(),
            manifest_file: default_manifest_file(),
            dependency_manifest: default_dependency_manifest(),
            dependency_dir: default_dependency_dir(),
            cache_dir: default_cache_dir(),
            installer_program: default_installer_program(),
            installer_args: default_installer_args(),
        }
    }
}
