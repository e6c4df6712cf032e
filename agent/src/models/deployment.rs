//! Deployment job models

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AgentError;

/// Commit id git reports for the "new" side of a deleted ref
pub const NULL_COMMIT: &str = "0000000000000000000000000000000000000000";

/// One push-triggered invocation of the release pipeline
#[derive(Debug, Clone)]
pub struct DeploymentJob {
    /// Commit the ref pointed at before the push
    pub original_commit: String,

    /// Commit the ref points at after the push
    pub new_commit: String,

    /// Pushed ref name
    pub branch_ref: String,

    /// Repository directory on disk (the hook's `GIT_DIR`)
    pub repository_path: PathBuf,

    pub organisation_slug: String,
    pub application_slug: String,

    /// Creation instant; its Unix-epoch seconds name the release
    pub timestamp: DateTime<Utc>,
}

impl DeploymentJob {
    /// Create a job stamped with the current time
    pub fn new(
        repository_path: impl Into<PathBuf>,
        original_commit: &str,
        new_commit: &str,
        branch_ref: &str,
    ) -> Result<Self, AgentError> {
        let repository_path = repository_path.into();
        validate_commit(original_commit)?;
        validate_commit(new_commit)?;
        let (organisation_slug, application_slug) = slugs_from_path(&repository_path)?;

        Ok(Self {
            original_commit: original_commit.to_lowercase(),
            new_commit: new_commit.to_lowercase(),
            branch_ref: branch_ref.to_string(),
            repository_path,
            organisation_slug,
            application_slug,
            timestamp: Utc::now(),
        })
    }

    /// Parse a post-receive stdin line: `<old> <new> <ref>`
    pub fn from_hook_line(
        repository_path: impl Into<PathBuf>,
        line: &str,
    ) -> Result<Self, AgentError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [old, new, reference] => Self::new(repository_path, old, new, reference),
            _ => Err(AgentError::ValidationError(format!(
                "Expected '<old> <new> <ref>', got: {}",
                line.trim()
            ))),
        }
    }

    /// Replace the creation instant
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// The push deleted the ref
    pub fn is_branch_deletion(&self) -> bool {
        self.new_commit == NULL_COMMIT
    }

    /// Timestamp-derived release identifier
    pub fn release_id(&self) -> u64 {
        self.timestamp.timestamp().max(0) as u64
    }
}

fn validate_commit(commit: &str) -> Result<(), AgentError> {
    if commit.len() == 40 && commit.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(AgentError::ValidationError(format!(
            "Invalid commit id: {}",
            commit
        )))
    }
}

/// Derive `(organisation, application)` slugs from the two trailing path
/// segments of a repository directory. A trailing `.git` suffix is stripped
/// from the application segment, and a trailing `.git` directory (non-bare
/// layout) is skipped.
pub fn slugs_from_path(path: &Path) -> Result<(String, String), AgentError> {
    let mut segments: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if segments.last().map(|s| s == ".git").unwrap_or(false) {
        segments.pop();
    }

    if segments.len() < 2 {
        return Err(AgentError::InvalidRepositoryPath(
            path.display().to_string(),
        ));
    }

    let app = segments.pop().unwrap_or_default();
    let org = segments.pop().unwrap_or_default();
    let app = app.strip_suffix(".git").unwrap_or(&app).to_string();

    if org.is_empty() || app.is_empty() {
        return Err(AgentError::InvalidRepositoryPath(
            path.display().to_string(),
        ));
    }

    Ok((org, app))
}

/// Deploy request the hook sends to the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployRequest {
    pub repository_path: String,
    pub original_commit: String,
    pub new_commit: String,
    pub branch_ref: String,
}

impl DeployRequest {
    pub fn into_job(self) -> Result<DeploymentJob, AgentError> {
        DeploymentJob::new(
            self.repository_path,
            &self.original_commit,
            &self.new_commit,
            &self.branch_ref,
        )
    }
}

/// One newline-delimited JSON frame of a streamed deploy response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeployFrame {
    /// A job log line
    Log { line: String },

    /// Final frame; exactly one per response
    Done {
        success: bool,
        #[serde(default)]
        error: Option<String>,
    },
}

impl DeployFrame {
    /// Serialize as a single NDJSON line
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"done","success":false,"error":"unserializable frame"}"#.to_string()
        });
        line.push('\n');
        line
    }
}
