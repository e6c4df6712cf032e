//! Release directories, the `current` link and retention

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::errors::AgentError;
use crate::filesys::dir::Dir;
use crate::utils::generate_compact_uuid;

/// Name of the link pointing at the live release
pub const CURRENT_LINK: &str = "current";

/// Releases of one application under `<deploys>/<organisation>/<application>`
#[derive(Debug, Clone)]
pub struct ReleaseStore {
    root: Dir,
    cache_dir_name: String,
}

impl ReleaseStore {
    /// Store for an application under the deploys base directory
    pub fn new(
        deploys_base: &Path,
        organisation_slug: &str,
        application_slug: &str,
        cache_dir_name: &str,
    ) -> Self {
        Self::at(
            deploys_base.join(organisation_slug).join(application_slug),
            cache_dir_name,
        )
    }

    /// Store rooted at an explicit deploy root
    pub fn at(root: impl Into<PathBuf>, cache_dir_name: &str) -> Self {
        Self {
            root: Dir::new(root),
            cache_dir_name: cache_dir_name.to_string(),
        }
    }

    pub fn deploy_root(&self) -> &Dir {
        &self.root
    }

    pub fn release_dir(&self, release_id: u64) -> Dir {
        self.root.subdir(&release_id.to_string())
    }

    pub fn cache_dir(&self) -> Dir {
        self.root.subdir(&self.cache_dir_name)
    }

    pub fn current_link(&self) -> PathBuf {
        self.root.path().join(CURRENT_LINK)
    }

    /// Release ids present on disk, oldest first. Only real directories
    /// named by an id count; the cache, `current` and anything else are
    /// ignored.
    pub async fn list_releases(&self) -> Result<Vec<u64>, AgentError> {
        if !self.root.exists().await {
            return Ok(Vec::new());
        }

        let mut ids: Vec<u64> = self
            .root
            .entries()
            .await?
            .into_iter()
            .filter(|e| e.is_dir && !e.is_symlink && e.name != self.cache_dir_name)
            .filter_map(|e| e.name.parse::<u64>().ok())
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Create the directory for a new release and return its id.
    ///
    /// The id is the requested timestamp unless an equal or newer release
    /// already exists, in which case the next free id above the newest is
    /// used, keeping ids strictly increasing per application.
    pub async fn create_release(&self, requested_id: u64) -> Result<u64, AgentError> {
        self.root.create().await?;

        let newest = self.list_releases().await?.last().copied();
        let mut id = match newest {
            Some(newest) if newest >= requested_id => newest + 1,
            _ => requested_id,
        };

        loop {
            match fs::create_dir(self.release_dir(id).path()).await {
                Ok(()) => {
                    debug!("Created release directory {:?}", self.release_dir(id).path());
                    return Ok(id);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => id += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Delete a release directory. Missing directories are not an error.
    pub async fn discard(&self, release_id: u64) -> Result<(), AgentError> {
        self.release_dir(release_id).delete().await
    }

    /// Release `current` points at, if any
    pub async fn current_release(&self) -> Result<Option<u64>, AgentError> {
        match fs::read_link(self.current_link()).await {
            Ok(target) => Ok(target
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse::<u64>().ok())),
            Err(e)
                if e.kind() == std::io::ErrorKind::NotFound
                    || e.kind() == std::io::ErrorKind::InvalidInput =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Point `current` at a release.
    ///
    /// A plain directory occupying `current` is removed first. Otherwise the
    /// new link is created beside the old one and renamed over it, so
    /// readers see either the previous or the new release.
    pub async fn promote(&self, release_id: u64) -> Result<(), AgentError> {
        let target = self.release_dir(release_id);
        if !target.exists().await {
            return Err(AgentError::ReleaseError(format!(
                "release {} does not exist",
                release_id
            )));
        }

        let link = self.current_link();
        if let Ok(meta) = fs::symlink_metadata(&link).await {
            if meta.is_dir() {
                warn!("{:?} is a directory, replacing it with a link", link);
                fs::remove_dir_all(&link).await?;
            }
        }

        let staging = self
            .root
            .path()
            .join(format!(".{}-{}", CURRENT_LINK, generate_compact_uuid()));
        // Relative to the deploy root, so the link survives a relative root
        create_symlink(Path::new(&release_id.to_string()), &staging).await?;

        if let Err(e) = fs::rename(&staging, &link).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }

        info!("Release {} is now current", release_id);
        Ok(())
    }

    /// Delete all but the newest `keep` releases, oldest first. Returns the
    /// ids that were removed. Individual removal failures are logged and
    /// skipped.
    pub async fn retention_sweep(&self, keep: usize) -> Result<Vec<u64>, AgentError> {
        let releases = self.list_releases().await?;
        let excess = releases.len().saturating_sub(keep.max(1));
        let current = self.current_release().await.unwrap_or(None);

        let mut deleted = Vec::new();
        for id in releases.into_iter().take(excess) {
            if Some(id) == current {
                continue;
            }
            match self.discard(id).await {
                Ok(()) => deleted.push(id),
                Err(e) => warn!("Unable to remove old release {}: {}", id, e),
            }
        }

        if !deleted.is_empty() {
            info!("Removed old releases: {:?}", deleted);
        }
        Ok(deleted)
    }
}

#[cfg(unix)]
async fn create_symlink(target: &Path, link: &Path) -> Result<(), AgentError> {
    fs::symlink(target, link).await?;
    Ok(())
}

#[cfg(windows)]
async fn create_symlink(target: &Path, link: &Path) -> Result<(), AgentError> {
    fs::symlink_dir(target, link).await?;
    Ok(())
}
