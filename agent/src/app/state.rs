//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::authn::gate::PushGate;
use crate::deploy::git::GitCli;
use crate::deploy::Deployer;
use crate::errors::AgentError;
use crate::events::TracingPublisher;
use crate::hooks::HookInstaller;
use crate::store::model::{FileModelStore, ModelStore};
use crate::store::scheduler::FileScheduleStore;
use crate::workers::deployer::DeployQueue;

/// Main application state
pub struct AppState {
    /// Model store shared by the gate and every deploy
    pub models: Arc<dyn ModelStore>,

    /// Deploy queue
    pub deploys: Arc<DeployQueue>,

    /// Push gate
    pub gate: Arc<PushGate>,
}

impl AppState {
    /// Initialize application state and open the shared connection
    pub async fn init(options: &AppOptions) -> Result<Self, AgentError> {
        info!("Initializing application state...");

        let models: Arc<dyn ModelStore> =
            Arc::new(FileModelStore::new(&options.storage.models_file));
        models.connect().await?;

        let deployer = Arc::new(Deployer::new(
            models.clone(),
            Arc::new(FileScheduleStore::new(&options.storage.schedules_file)),
            Arc::new(TracingPublisher),
            Arc::new(GitCli::new()),
            options.deploy_options(false),
        ));
        let deploys = Arc::new(DeployQueue::new(deployer, &options.deployer));

        let gate = Arc::new(PushGate::new(
            models.clone(),
            HookInstaller::for_current_exe()?,
        ));

        Ok(Self {
            models,
            deploys,
            gate,
        })
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), AgentError> {
        info!("Shutting down application state...");
        self.deploys.drain().await?;
        self.models.disconnect().await
    }
}
