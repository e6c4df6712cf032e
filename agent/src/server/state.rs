//! Server state

use std::sync::Arc;

use crate::authn::gate::PushGate;
use crate::workers::deployer::DeployQueue;

/// Server state shared across handlers
pub struct ServerState {
    pub deploys: Arc<DeployQueue>,
    pub gate: Arc<PushGate>,
}

impl ServerState {
    pub fn new(deploys: Arc<DeployQueue>, gate: Arc<PushGate>) -> Self {
        Self { deploys, gate }
    }
}
