//! Per-application cache of installed dependencies

use tokio::fs;
use tracing::debug;

use crate::errors::AgentError;
use crate::filesys::dir::Dir;
use crate::utils::generate_compact_uuid;

/// Dependency directory kept beside the releases so the next deploy can
/// start from the previous install
#[derive(Debug, Clone)]
pub struct DependencyCache {
    dir: Dir,
}

impl DependencyCache {
    pub fn new(dir: Dir) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Dir {
        &self.dir
    }

    pub async fn exists(&self) -> bool {
        self.dir.exists().await
    }

    /// Copy the cached dependencies into `target`. Returns false when
    /// there is nothing cached.
    pub async fn restore(&self, target: &Dir) -> Result<bool, AgentError> {
        if !self.exists().await {
            debug!("No dependency cache at {:?}", self.dir.path());
            return Ok(false);
        }

        target.create().await?;
        self.dir.copy_to(target).await?;
        debug!("Restored dependency cache into {:?}", target.path());
        Ok(true)
    }

    /// Replace the cache with the contents of `source`. Returns false when
    /// `source` does not exist.
    ///
    /// The copy is staged beside the cache and renamed into place, so a
    /// failed copy leaves the previous cache untouched.
    pub async fn save(&self, source: &Dir) -> Result<bool, AgentError> {
        if !source.exists().await {
            return Ok(false);
        }

        let parent = self
            .dir
            .path()
            .parent()
            .ok_or_else(|| AgentError::Internal("cache directory has no parent".to_string()))?;
        let name = self
            .dir
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let staging = Dir::new(parent.join(format!("{}.{}", name, generate_compact_uuid())));

        staging.create().await?;
        if let Err(e) = source.copy_to(&staging).await {
            let _ = staging.delete().await;
            return Err(e);
        }

        self.dir.delete().await?;
        fs::rename(staging.path(), self.dir.path()).await?;
        debug!("Saved dependency cache from {:?}", source.path());
        Ok(true)
    }
}
