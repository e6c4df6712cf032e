//! Accept/reject decision for inbound pushes

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::authn::push::{authenticate, AuthorizedPush, PushEvent};
use crate::errors::AuthError;
use crate::hooks::HookInstaller;
use crate::store::model::ModelStore;

/// Reason given when the hook cannot be installed
pub const PREPARE_FAILED: &str = "unable to prepare repository";

/// Authenticates pushes and prepares the repository before accepting
pub struct PushGate {
    store: Arc<dyn ModelStore>,
    hooks: HookInstaller,
}

impl PushGate {
    pub fn new(store: Arc<dyn ModelStore>, hooks: HookInstaller) -> Self {
        Self { store, hooks }
    }

    /// Authenticate, install the hook, then accept. Every failure ends in
    /// a rejection carrying a generic reason.
    pub async fn handle(&self, push: &mut dyn PushEvent) -> Option<AuthorizedPush> {
        info!("Received git push for {}", push.repository_path());

        if !self.store.is_connected() {
            if let Err(e) = self.store.connect().await {
                error!("Unable to connect model store: {}", e);
                let err = AuthError::Store(e.to_string());
                push.reject(err.status_code(), err.public_message());
                return None;
            }
        }

        let authorized = match authenticate(self.store.as_ref(), &*push).await {
            Ok(authorized) => authorized,
            Err(e) => {
                warn!("Push rejected: {}", e);
                push.reject(e.status_code(), e.public_message());
                return None;
            }
        };

        let working_directory = push.working_directory().to_path_buf();
        if let Err(e) = self.hooks.ensure_hook(&working_directory).await {
            error!("Unable to install hook in {:?}: {}", working_directory, e);
            push.reject(500, PREPARE_FAILED);
            return None;
        }

        push.accept();
        Some(authorized)
    }
}
