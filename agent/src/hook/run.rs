//! Post-receive hook client
//!
//! Invoked by the installed hook with the ref updates on stdin. Each update
//! is sent to the deploy service and its streamed log is echoed back to the
//! pusher.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error};

use crate::errors::AgentError;
use crate::http::client::HookClient;
use crate::models::deployment::{DeployRequest, DeploymentJob};

/// Moves the cursor to column one so git's `remote: ` prefix does not
/// indent streamed lines
pub const LINE_PREFIX: &str = "\x1b[1G";

/// Run every ref update through the service. Returns true only when all
/// of them deployed.
pub async fn run_hook(
    cli_args: &HashMap<String, String>,
    base_url: &str,
) -> Result<bool, AgentError> {
    let repository = repository_dir(cli_args)?;

    let requests = match (cli_args.get("old"), cli_args.get("new"), cli_args.get("ref")) {
        (Some(old), Some(new), Some(reference)) => {
            vec![to_request(DeploymentJob::new(&repository, old, new, reference)?)]
        }
        _ => read_requests(&repository).await?,
    };

    if requests.is_empty() {
        debug!("No ref updates received");
        return Ok(true);
    }

    let client = HookClient::new(base_url)?;
    let mut all_ok = true;
    let stdout = std::io::stdout();

    for request in requests {
        let result = client
            .deploy(&request, |line| {
                let mut out = stdout.lock();
                let _ = writeln!(out, "{}", prefix_line(line));
                let _ = out.flush();
            })
            .await;

        match result {
            Ok(result) if result.success => {
                println!("{}", prefix_line(&"Deploy complete".green().to_string()));
            }
            Ok(result) => {
                all_ok = false;
                let reason = result.error.unwrap_or_else(|| "unknown error".to_string());
                println!(
                    "{}",
                    prefix_line(&format!("Deploy failed: {}", reason).red().to_string())
                );
            }
            Err(e) => {
                all_ok = false;
                error!("Unable to reach deploy service: {}", e);
                println!(
                    "{}",
                    prefix_line(&format!("Deploy failed: {}", e).red().to_string())
                );
            }
        }
    }

    Ok(all_ok)
}

/// Prefix a streamed line for the pusher's terminal
pub fn prefix_line(line: &str) -> String {
    format!("{}{}", LINE_PREFIX, line)
}

/// Repository directory from `--repository`, `GIT_DIR` or the working
/// directory, made absolute
fn repository_dir(cli_args: &HashMap<String, String>) -> Result<PathBuf, AgentError> {
    let raw = cli_args
        .get("repository")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("GIT_DIR").map(PathBuf::from))
        .map(Ok)
        .unwrap_or_else(std::env::current_dir)?;

    absolute(&raw)
}

fn absolute(path: &Path) -> Result<PathBuf, AgentError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

async fn read_requests(repository: &Path) -> Result<Vec<DeployRequest>, AgentError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input = Vec::new();
    while let Some(line) = lines.next_line().await? {
        input.push(line);
    }
    parse_requests(repository, &input)
}

/// Build requests from post-receive stdin lines, skipping blank ones
pub fn parse_requests(
    repository: &Path,
    lines: &[String],
) -> Result<Vec<DeployRequest>, AgentError> {
    lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| DeploymentJob::from_hook_line(repository, line).map(to_request))
        .collect()
}

fn to_request(job: DeploymentJob) -> DeployRequest {
    DeployRequest {
        repository_path: job.repository_path.display().to_string(),
        original_commit: job.original_commit,
        new_commit: job.new_commit,
        branch_ref: job.branch_ref,
    }
}
