//! Finite State Machine for the release pipeline stages

use serde::{Deserialize, Serialize};

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentState {
    /// Job accepted, nothing has run
    Pending,

    /// Looking up the organisation and application
    Resolving,

    /// Extracting the commit into a fresh release directory
    Materializing,

    /// Installing third-party packages
    Installing,

    /// Writing the manifest to the application record
    Configuring,

    /// Re-registering scheduled events
    Scheduling,

    /// `current` points at the new release
    Promoted,

    /// Removing old releases
    Sweeping,

    /// Finished successfully
    Completed,

    /// Branch deletion, nothing to deploy
    Skipped,

    /// Aborted
    Failed,
}

impl DeploymentState {
    /// No further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeploymentState::Completed | DeploymentState::Skipped | DeploymentState::Failed
        )
    }
}

/// Pipeline event
#[derive(Debug, Clone)]
pub enum DeploymentEvent {
    /// New commit is the null commit
    Skip,

    /// Start resolving the application
    Resolve,

    /// Application resolved, start extracting
    Materialize,

    /// Release extracted, start installing packages
    Install,

    /// Packages installed, start applying configuration
    Configure,

    /// Configuration saved, start reconciling schedules
    Schedule,

    /// `current` repointed
    Promote,

    /// Start the retention sweep
    Sweep,

    /// Pipeline finished
    Complete,

    /// A stage failed
    Fail(String),
}

/// Deployment FSM
#[derive(Debug, Clone)]
pub struct DeploymentFsm {
    state: DeploymentState,
    error: Option<String>,
    promoted: bool,
}

impl DeploymentFsm {
    /// Create a new FSM in pending state
    pub fn new() -> Self {
        Self {
            state: DeploymentState::Pending,
            error: None,
            promoted: false,
        }
    }

    /// Get current state
    pub fn state(&self) -> &DeploymentState {
        &self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether `current` was repointed at this job's release. Stays true
    /// after a later failure.
    pub fn is_promoted(&self) -> bool {
        self.promoted
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: DeploymentEvent) -> Result<(), String> {
        use DeploymentEvent as E;
        use DeploymentState as S;

        let new_state = match (&self.state, &event) {
            (S::Pending, E::Skip) => S::Skipped,
            (S::Pending, E::Resolve) => S::Resolving,
            (S::Resolving, E::Materialize) => S::Materializing,
            (S::Materializing, E::Install) => S::Installing,
            (S::Installing, E::Configure) => S::Configuring,
            (S::Configuring, E::Schedule) => S::Scheduling,
            (S::Scheduling, E::Promote) => {
                self.promoted = true;
                S::Promoted
            }
            (S::Promoted, E::Sweep) => S::Sweeping,
            (S::Promoted | S::Sweeping, E::Complete) => S::Completed,

            (state, E::Fail(err)) if !state.is_terminal() => {
                self.error = Some(err.clone());
                S::Failed
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for DeploymentFsm {
    fn default() -> Self {
        Self::new()
    }
}
