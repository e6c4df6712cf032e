//! Reading commits out of the pushed repository

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error};

use crate::errors::AgentError;
use crate::filesys::dir::Dir;
use crate::models::application::CommitInfo;

/// Read access to a repository on disk
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// Write a tar archive of the tree at `commit` to `dest`
    async fn archive(&self, repository: &Path, commit: &str, dest: &Path)
        -> Result<(), AgentError>;

    /// Message and author of `commit`
    async fn commit_info(&self, repository: &Path, commit: &str)
        -> Result<CommitInfo, AgentError>;
}

/// Repository access through the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl GitCli {
    pub fn new() -> Self {
        Self::with_program("git")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, repository: &Path, args: &[&str]) -> Result<Vec<u8>, AgentError> {
        debug!("git --git-dir={:?} {}", repository, args.join(" "));

        let output = Command::new(&self.program)
            .arg(format!("--git-dir={}", repository.display()))
            .args(args)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AgentError::GitCommand(format!("{} executable not found", self.program))
                } else {
                    AgentError::GitCommand(format!("Failed to run git: {}", e))
                }
            })?;

        if output.status.success() {
            return Ok(output.stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        error!("git {} failed: {}", args.first().unwrap_or(&""), stderr);
        if stderr.to_lowercase().contains("not a git repository") {
            Err(AgentError::GitNotFound(repository.display().to_string()))
        } else {
            Err(AgentError::GitCommand(stderr))
        }
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceRepository for GitCli {
    async fn archive(
        &self,
        repository: &Path,
        commit: &str,
        dest: &Path,
    ) -> Result<(), AgentError> {
        let output = format!("--output={}", dest.display());
        self.run(repository, &["archive", "--format=tar", &output, commit])
            .await?;
        Ok(())
    }

    async fn commit_info(
        &self,
        repository: &Path,
        commit: &str,
    ) -> Result<CommitInfo, AgentError> {
        let raw = self
            .run(repository, &["log", "-1", "--format=%B%x00%an%x00%ae", commit])
            .await?;
        parse_commit_info(commit, &String::from_utf8_lossy(&raw))
    }
}

fn parse_commit_info(commit: &str, raw: &str) -> Result<CommitInfo, AgentError> {
    let mut parts = raw.split('\0');
    let (Some(message), Some(name), Some(email)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(AgentError::GitCommand(format!(
            "unexpected log output for {}",
            commit
        )));
    };

    Ok(CommitInfo {
        message: message.trim_end().to_string(),
        sha1: commit.to_string(),
        user: format!("{} {}", name.trim(), email.trim()),
    })
}

/// Unpack a tar archive into `target`
pub async fn extract_archive(archive: &Path, target: &Dir) -> Result<(), AgentError> {
    let archive: PathBuf = archive.to_path_buf();
    let target: PathBuf = target.path().to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<(), AgentError> {
        std::fs::create_dir_all(&target)?;
        let file = std::fs::File::open(&archive)?;
        tar::Archive::new(file).unpack(&target)?;
        Ok(())
    })
    .await
    .map_err(|e| AgentError::Internal(format!("extract task failed: {}", e)))?
}

/// Extract the tree at `commit` into `target` through a temporary archive
pub async fn materialize(
    source: &dyn SourceRepository,
    repository: &Path,
    commit: &str,
    target: &Dir,
) -> Result<(), AgentError> {
    let archive = tempfile::Builder::new()
        .prefix("pushdeploy-")
        .suffix(".tar")
        .tempfile()?;

    source.archive(repository, commit, archive.path()).await?;
    extract_archive(archive.path(), target).await
}
