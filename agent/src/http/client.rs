//! HTTP client the hook uses to reach the deploy service

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};

use crate::errors::AgentError;
use crate::models::deployment::{DeployFrame, DeployRequest};

/// Result of a streamed deploy as seen by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployResult {
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Client for the local deploy service
pub struct HookClient {
    client: Client,
    base_url: String,
}

impl HookClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str) -> Result<Self, AgentError> {
        url::Url::parse(base_url)
            .map_err(|e| AgentError::ConfigError(format!("invalid service url {}: {}", base_url, e)))?;

        // No overall timeout: installs can run for minutes
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request a deploy, handing each streamed log line to `on_line` as it
    /// arrives
    pub async fn deploy(
        &self,
        request: &DeployRequest,
        mut on_line: impl FnMut(&str),
    ) -> Result<DeployResult, AgentError> {
        let url = format!("{}/deploy", self.base_url);
        debug!("POST {}", url);

        let mut response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP POST failed: {} - {}", status, body);
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            return Err(AgentError::DeployError(format!("{}: {}", status, message)));
        }

        let mut decoder = FrameDecoder::default();
        let mut result = None;
        while let Some(chunk) = response.chunk().await? {
            for frame in decoder.push(&chunk)? {
                handle_frame(frame, &mut on_line, &mut result);
            }
        }
        if let Some(frame) = decoder.finish()? {
            handle_frame(frame, &mut on_line, &mut result);
        }

        result.ok_or_else(|| {
            AgentError::DeployError("deploy stream ended without a result".to_string())
        })
    }
}

fn handle_frame(
    frame: DeployFrame,
    on_line: &mut impl FnMut(&str),
    result: &mut Option<DeployResult>,
) {
    match frame {
        DeployFrame::Log { line } => on_line(&line),
        DeployFrame::Done { success, error } => *result = Some(DeployResult { success, error }),
    }
}

/// Splits a byte stream into NDJSON frames
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Feed bytes and return every complete frame
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<DeployFrame>, AgentError> {
        self.buffer.extend_from_slice(bytes);
        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(frame) = parse_frame(&line[..line.len() - 1])? {
                frames.push(frame);
            }
        }
        Ok(frames)
    }

    /// Parse whatever is left after the stream closed
    pub fn finish(&mut self) -> Result<Option<DeployFrame>, AgentError> {
        let rest = std::mem::take(&mut self.buffer);
        parse_frame(&rest)
    }
}

fn parse_frame(line: &[u8]) -> Result<Option<DeployFrame>, AgentError> {
    if line.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(line)?))
}
