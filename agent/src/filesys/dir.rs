//! Directory operations

use std::path::{Path, PathBuf};

use tokio::fs;
use walkdir::WalkDir;

use crate::errors::AgentError;

/// A directory wrapper with path
#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
}

/// A single directory entry, described without following symlinks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub is_dir: bool,
    pub is_symlink: bool,
}

impl Dir {
    /// Create a new directory reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the directory exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Create the directory (and parents)
    pub async fn create(&self) -> Result<(), AgentError> {
        fs::create_dir_all(&self.path).await?;
        Ok(())
    }

    /// Delete the directory and all contents
    pub async fn delete(&self) -> Result<(), AgentError> {
        if self.exists().await {
            fs::remove_dir_all(&self.path).await?;
        }
        Ok(())
    }

    /// List the entries of the directory
    pub async fn entries(&self) -> Result<Vec<Entry>, AgentError> {
        let mut result = Vec::new();
        let mut entries = fs::read_dir(&self.path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            result.push(Entry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: file_type.is_dir(),
                is_symlink: file_type.is_symlink(),
            });
        }

        Ok(result)
    }

    /// Recursively copy this directory into `target`, merging with whatever
    /// is already there. Symlinks are recreated, not followed.
    pub async fn copy_to(&self, target: &Dir) -> Result<(), AgentError> {
        let src = self.path.clone();
        let dst = target.path.clone();
        tokio::task::spawn_blocking(move || copy_tree(&src, &dst))
            .await
            .map_err(|e| AgentError::Internal(format!("copy task failed: {}", e)))?
    }

    /// Get a file within this directory
    pub fn file(&self, name: &str) -> crate::filesys::file::File {
        crate::filesys::file::File::new(self.path.join(name))
    }

    /// Get a subdirectory
    pub fn subdir(&self, name: &str) -> Dir {
        Dir::new(self.path.join(name))
    }
}

fn copy_tree(src: &Path, dst: &Path) -> Result<(), AgentError> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| AgentError::IoError(e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| AgentError::Internal(e.to_string()))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            let link_target = std::fs::read_link(entry.path())?;
            if std::fs::symlink_metadata(&target).is_ok() {
                std::fs::remove_file(&target)?;
            }
            #[cfg(unix)]
            std::os::unix::fs::symlink(link_target, &target)?;
            #[cfg(not(unix))]
            std::fs::copy(entry.path().join(link_target), &target).map(|_| ())?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
