//! Bounded pool running deployment jobs

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info};

use crate::deploy::sink::ChannelSink;
use crate::deploy::{DeployOutcome, Deployer};
use crate::errors::AgentError;
use crate::models::deployment::{DeployFrame, DeploymentJob};

/// Deployer worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Deploys allowed to run at once
    pub max_concurrent: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self { max_concurrent: 4 }
    }
}

/// Runs submitted jobs on background tasks, at most `max_concurrent` at a
/// time. Jobs for the same application are not serialized.
pub struct DeployQueue {
    deployer: Arc<Deployer>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl DeployQueue {
    pub fn new(deployer: Arc<Deployer>, options: &Options) -> Self {
        let max_concurrent = options.max_concurrent.max(1);
        Self {
            deployer,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Number of deploys currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.permits.available_permits()
    }

    /// Start a job. The returned channel yields its log lines followed by
    /// exactly one `Done` frame. The job runs to completion even if the
    /// receiver is dropped.
    pub fn submit(&self, job: DeploymentJob) -> mpsc::UnboundedReceiver<DeployFrame> {
        let (tx, rx) = mpsc::unbounded_channel();
        let deployer = self.deployer.clone();
        let permits = self.permits.clone();

        tokio::spawn(async move {
            let permit = match permits.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    let _ = tx.send(DeployFrame::Log {
                        line: "waiting for a free deploy slot".to_string(),
                    });
                    match permits.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            let _ = tx.send(DeployFrame::Done {
                                success: false,
                                error: Some("deploy queue is shut down".to_string()),
                            });
                            return;
                        }
                    }
                }
            };

            let result = run_job(&deployer, &job, &tx).await;
            drop(permit);

            let done = match result {
                Ok(outcome) => {
                    info!("Deploy of {} finished: {:?}", job.new_commit, outcome);
                    DeployFrame::Done {
                        success: true,
                        error: None,
                    }
                }
                Err(e) => {
                    error!("Deploy of {} failed: {}", job.new_commit, e);
                    DeployFrame::Done {
                        success: false,
                        error: Some(e.to_string()),
                    }
                }
            };
            let _ = tx.send(done);
        });

        rx
    }

    /// Stop handing out slots and wait for running deploys to finish
    pub async fn drain(&self) -> Result<(), AgentError> {
        let permits = u32::try_from(self.max_concurrent)
            .map_err(|e| AgentError::Internal(e.to_string()))?;
        let _all = self
            .permits
            .acquire_many(permits)
            .await
            .map_err(|e| AgentError::ShutdownError(e.to_string()))?;
        self.permits.close();
        info!("Deploy queue drained");
        Ok(())
    }
}

/// Run one job, forwarding sink lines as log frames before returning
async fn run_job(
    deployer: &Deployer,
    job: &DeploymentJob,
    frames: &mpsc::UnboundedSender<DeployFrame>,
) -> Result<DeployOutcome, AgentError> {
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    let frames_out = frames.clone();
    let forward = tokio::spawn(async move {
        while let Some(line) = line_rx.recv().await {
            let _ = frames_out.send(DeployFrame::Log { line });
        }
    });

    let sink = ChannelSink::new(line_tx);
    let result = deployer.deploy(job, &sink).await;
    drop(sink);
    let _ = forward.await;
    result
}
