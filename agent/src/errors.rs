//! Error types for the deploy agent

use thiserror::Error;

/// Main error type for the deploy agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Authorization error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Manifest error: {0}")]
    ManifestError(#[from] ManifestError),

    #[error("Git repository not found: {0}")]
    GitNotFound(String),

    #[error("Git command failed: {0}")]
    GitCommand(String),

    #[error("Package install failed: {0}")]
    InstallFailed(String),

    #[error("Invalid repository path: {0}")]
    InvalidRepositoryPath(String),

    #[error("Organisation not found: {0}")]
    OrganisationNotFound(String),

    #[error("Application not found: {0}")]
    ApplicationNotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Release error: {0}")]
    ReleaseError(String),

    #[error("Deployment error: {0}")]
    DeployError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Internal(err.to_string())
    }
}

/// Reasons a push is refused before it reaches the pipeline
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("missing auth header")]
    MissingAuthHeader,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user has no password set")]
    NoPasswordSet,

    #[error("organisation not found")]
    OrganisationNotFound,

    #[error("application not found")]
    ApplicationNotFound,

    #[error("store error: {0}")]
    Store(String),
}

impl AuthError {
    /// Status code the push is rejected with
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::Store(_) => 500,
            _ => 401,
        }
    }

    /// Message shown to the pusher. Never carries record identifiers.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing auth header",
            AuthError::InvalidCredentials | AuthError::NoPasswordSet => {
                "incorrect username or password provided"
            }
            AuthError::OrganisationNotFound | AuthError::ApplicationNotFound => {
                "repository not found"
            }
            AuthError::Store(_) => "internal error",
        }
    }
}

/// Errors reading the application manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("manifest file not found: {0}")]
    NotFound(String),

    #[error("manifest is not valid: {0}")]
    Invalid(String),

    #[error("unable to read manifest: {0}")]
    Io(#[from] std::io::Error),
}
