//! Post-receive hook installation

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::AgentError;
use crate::filesys::file::File;

/// Token replaced with the agent executable path
pub const ENTRYPOINT_TOKEN: &str = "#{entrypoint}";

/// Mode the hook is written with
pub const HOOK_MODE: u32 = 0o755;

const HOOK_TEMPLATE: &str = r##"#!/bin/sh
# Installed by pushdeploy. Forwards every updated ref to the deploy service.
repository="$(cd "${GIT_DIR:-.}" && pwd)"
status=0
while read -r oldrev newrev refname; do
  echo "$oldrev $newrev $refname" | '#{entrypoint}' --hook --repository="$repository" || status=1
done
exit $status
"##;

/// Result of [`HookInstaller::ensure_hook`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    Installed,
    AlreadyPresent,
}

/// Installs the post-receive hook into pushed repositories
#[derive(Debug, Clone)]
pub struct HookInstaller {
    entrypoint: PathBuf,
}

impl HookInstaller {
    pub fn new(entrypoint: impl Into<PathBuf>) -> Self {
        Self {
            entrypoint: entrypoint.into(),
        }
    }

    /// Installer pointing hooks at the running executable
    pub fn for_current_exe() -> Result<Self, AgentError> {
        Ok(Self::new(std::env::current_exe()?))
    }

    pub fn entrypoint(&self) -> &Path {
        &self.entrypoint
    }

    /// Hook script with the entrypoint filled in. The path sits in single
    /// quotes, so only `'` needs escaping.
    pub fn render(&self) -> String {
        let quoted = self.entrypoint.display().to_string().replace('\'', r"'\''");
        HOOK_TEMPLATE.replace(ENTRYPOINT_TOKEN, &quoted)
    }

    pub fn hook_path(repository: &Path) -> PathBuf {
        repository.join("hooks").join("post-receive")
    }

    /// Write the hook unless something already occupies its path. An
    /// existing hook, even a dangling symlink, is left untouched.
    pub async fn ensure_hook(&self, repository: &Path) -> Result<HookOutcome, AgentError> {
        let hook = File::new(Self::hook_path(repository));

        if hook.is_occupied().await? {
            debug!("Hook already present at {:?}", hook.path());
            return Ok(HookOutcome::AlreadyPresent);
        }

        hook.write_executable(&self.render(), HOOK_MODE).await?;
        info!("Installed post-receive hook at {:?}", hook.path());
        Ok(HookOutcome::Installed)
    }
}
