//! Organisation, application and user records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::authn::password;

/// Environment name used by push deploys
pub const ENV_LIVE: &str = "live";

/// Per-environment values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Environments<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live: Option<T>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev: Option<T>,
}

impl<T> Default for Environments<T> {
    fn default() -> Self {
        Self {
            live: None,
            dev: None,
        }
    }
}

/// An organisation owning applications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organisation {
    pub id: String,
    pub slug: String,
    #[serde(default)]
    pub name: String,
}

/// Commit metadata recorded for the last deploy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub message: String,
    pub sha1: String,
    /// Author as `"<name> <email>"`
    pub user: String,
}

/// A deployable application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,

    /// Owning organisation id
    pub organisation: String,

    pub slug: String,

    #[serde(default)]
    pub name: String,

    /// Parsed manifests per environment
    #[serde(default)]
    pub settings: Environments<Value>,

    #[serde(default)]
    pub last_deploy: Environments<DateTime<Utc>>,

    #[serde(default)]
    pub last_commit: Environments<CommitInfo>,
}

/// A registered email address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub address: String,
}

/// A user allowed to push
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,

    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,

    /// Ids of organisations the user belongs to
    #[serde(default)]
    pub organisations: Vec<String>,

    #[serde(default)]
    pub password_hash: Option<String>,
}

impl User {
    /// Whether one of the user's addresses matches, ignoring case
    pub fn has_email(&self, email: &str) -> bool {
        self.email_addresses
            .iter()
            .any(|e| e.address.eq_ignore_ascii_case(email))
    }

    /// Whether a usable credential hash is stored
    pub fn has_password(&self) -> bool {
        self.password_hash
            .as_deref()
            .map(|h| !h.is_empty())
            .unwrap_or(false)
    }

    pub fn verify_password(&self, candidate: &str) -> bool {
        match self.password_hash.as_deref() {
            Some(hash) if !hash.is_empty() => password::verify_password(hash, candidate),
            _ => false,
        }
    }
}
