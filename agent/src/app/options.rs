//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use crate::deploy::DeployOptions;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::{PipelineSettings, Settings};
use crate::workers::deployer;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage configuration
    pub storage: StorageOptions,

    /// Server configuration
    pub server: ServerOptions,

    /// Deploy worker options
    pub deployer: deployer::Options,

    /// Release pipeline options
    pub pipeline: PipelineSettings,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            storage: StorageOptions::default(),
            server: ServerOptions::default(),
            deployer: deployer::Options::default(),
            pipeline: PipelineSettings::default(),
        }
    }
}

impl AppOptions {
    /// Options for a layout and its settings file
    pub fn from_settings(layout: StorageLayout, settings: &Settings) -> Self {
        Self {
            lifecycle: LifecycleOptions {
                max_shutdown_delay: Duration::from_secs(settings.max_shutdown_delay_secs),
            },
            storage: StorageOptions {
                models_file: settings.models_file(&layout),
                schedules_file: settings.schedules_file(&layout),
                deploys_root: settings.deploys_root(&layout),
                layout,
            },
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            deployer: deployer::Options {
                max_concurrent: settings.max_concurrent_deploys,
            },
            pipeline: settings.pipeline.clone(),
        }
    }

    /// Pipeline options for a deployer sharing the service's connection
    pub fn deploy_options(&self, release_connection: bool) -> DeployOptions {
        DeployOptions {
            deploys_root: self.storage.deploys_root.clone(),
            pipeline: self.pipeline.clone(),
            release_connection,
        }
    }
}

/// Lifecycle options for the agent
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Storage configuration options
#[derive(Debug, Clone)]
pub struct StorageOptions {
    /// Storage layout paths
    pub layout: StorageLayout,

    /// Model store document
    pub models_file: PathBuf,

    /// Schedule store document
    pub schedules_file: PathBuf,

    /// Root of the per-application release trees
    pub deploys_root: PathBuf,
}

impl Default for StorageOptions {
    fn default() -> Self {
        let layout = StorageLayout::default();
        Self {
            models_file: layout.models_file().path().to_path_buf(),
            schedules_file: layout.schedules_file().path().to_path_buf(),
            deploys_root: layout.deploys_dir().path().to_path_buf(),
            layout,
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7010,
        }
    }
}
