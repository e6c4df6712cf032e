//! Model store: organisations, applications and users

use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::AgentError;
use crate::filesys::file::File;
use crate::models::application::{Application, Organisation, User};

/// Lifecycle of a shared data-store connection
#[async_trait]
pub trait Connection: Send + Sync {
    /// Connect. A no-op when already connected.
    async fn connect(&self) -> Result<(), AgentError>;

    /// Disconnect. A no-op when not connected.
    async fn disconnect(&self) -> Result<(), AgentError>;

    fn is_connected(&self) -> bool;
}

/// Queries the pipeline and the push authenticator issue
#[async_trait]
pub trait ModelStore: Connection {
    async fn find_organisation_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Organisation>, AgentError>;

    /// Organisation by slug, restricted to the given organisation ids
    async fn find_organisation_for_member(
        &self,
        slug: &str,
        member_of: &[String],
    ) -> Result<Option<Organisation>, AgentError>;

    async fn find_application(
        &self,
        organisation_id: &str,
        slug: &str,
    ) -> Result<Option<Application>, AgentError>;

    /// User owning the address, matched case-insensitively
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AgentError>;

    async fn save_application(&self, application: &Application) -> Result<(), AgentError>;
}

/// Serialized form of the file-backed store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDocument {
    #[serde(default)]
    pub organisations: Vec<Organisation>,

    #[serde(default)]
    pub applications: Vec<Application>,

    #[serde(default)]
    pub users: Vec<User>,
}

/// Model store backed by a single JSON document, loaded on connect and
/// rewritten on every save
pub struct FileModelStore {
    file: File,
    document: RwLock<Option<ModelDocument>>,
    write_lock: Mutex<()>,
}

impl FileModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: File::new(path),
            document: RwLock::new(None),
            write_lock: Mutex::new(()),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&ModelDocument) -> T) -> Result<T, AgentError> {
        let document = self.document.read().unwrap_or_else(|e| e.into_inner());
        document
            .as_ref()
            .map(f)
            .ok_or_else(|| AgentError::Store("model store is not connected".to_string()))
    }
}

#[async_trait]
impl Connection for FileModelStore {
    async fn connect(&self) -> Result<(), AgentError> {
        if self.is_connected() {
            return Ok(());
        }

        let document = if self.file.exists().await {
            self.file.read_json::<ModelDocument>().await?
        } else {
            debug!("Model store {:?} does not exist yet, starting empty", self.file.path());
            ModelDocument::default()
        };

        info!(
            "Model store connected: {} organisations, {} applications, {} users",
            document.organisations.len(),
            document.applications.len(),
            document.users.len()
        );
        *self.document.write().unwrap_or_else(|e| e.into_inner()) = Some(document);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AgentError> {
        let _guard = self.write_lock.lock().await;
        let previous = self
            .document
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if previous.is_some() {
            info!("Model store disconnected");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.document
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

#[async_trait]
impl ModelStore for FileModelStore {
    async fn find_organisation_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Organisation>, AgentError> {
        self.read(|doc| doc.organisations.iter().find(|o| o.slug == slug).cloned())
    }

    async fn find_organisation_for_member(
        &self,
        slug: &str,
        member_of: &[String],
    ) -> Result<Option<Organisation>, AgentError> {
        self.read(|doc| {
            doc.organisations
                .iter()
                .find(|o| o.slug == slug && member_of.contains(&o.id))
                .cloned()
        })
    }

    async fn find_application(
        &self,
        organisation_id: &str,
        slug: &str,
    ) -> Result<Option<Application>, AgentError> {
        self.read(|doc| {
            doc.applications
                .iter()
                .find(|a| a.organisation == organisation_id && a.slug == slug)
                .cloned()
        })
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AgentError> {
        self.read(|doc| doc.users.iter().find(|u| u.has_email(email)).cloned())
    }

    async fn save_application(&self, application: &Application) -> Result<(), AgentError> {
        let _guard = self.write_lock.lock().await;

        let snapshot = {
            let mut document = self.document.write().unwrap_or_else(|e| e.into_inner());
            let document = document
                .as_mut()
                .ok_or_else(|| AgentError::Store("model store is not connected".to_string()))?;
            match document.applications.iter_mut().find(|a| a.id == application.id) {
                Some(existing) => *existing = application.clone(),
                None => document.applications.push(application.clone()),
            }
            document.clone()
        };

        self.file.write_json(&snapshot).await?;
        debug!("Saved application {}", application.id);
        Ok(())
    }
}
