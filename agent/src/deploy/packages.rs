//! Third-party package installation

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::deploy::sink::LogSink;
use crate::errors::AgentError;

/// Runs the configured installer inside a release directory
#[derive(Debug, Clone)]
pub struct PackageInstaller {
    program: String,
    args: Vec<String>,
}

impl PackageInstaller {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the installer in `dir`, forwarding stdout and stderr to the
    /// sink line by line as they arrive
    pub async fn install(&self, dir: &Path, sink: &dyn LogSink) -> Result<(), AgentError> {
        info!("Running {} in {:?}", self.command_line(), dir);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                AgentError::InstallFailed(format!("unable to start {}: {}", self.program, e))
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (out, err, status) = tokio::join!(
            forward_lines(stdout, sink),
            forward_lines(stderr, sink),
            child.wait()
        );
        out?;
        err?;
        let status = status?;

        if status.success() {
            debug!("{} finished", self.program);
            Ok(())
        } else {
            Err(AgentError::InstallFailed(match status.code() {
                Some(code) => format!("{} exited with status {}", self.program, code),
                None => format!("{} was terminated by a signal", self.program),
            }))
        }
    }
}

async fn forward_lines<R>(stream: Option<R>, sink: &dyn LogSink) -> Result<(), AgentError>
where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return Ok(());
    };

    let mut lines = BufReader::new(stream).lines();
    while let Some(line) = lines.next_line().await? {
        sink.write(&line);
    }
    Ok(())
}
