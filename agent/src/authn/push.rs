//! Push authentication

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::{AgentError, AuthError};
use crate::store::model::ModelStore;

/// An inbound push waiting for a decision
pub trait PushEvent: Send + Sync {
    /// Repository as addressed by the client, `<org>/<app>[.git]`
    fn repository_path(&self) -> &str;

    /// Request header, looked up case-insensitively
    fn header(&self, name: &str) -> Option<&str>;

    /// Repository directory on disk
    fn working_directory(&self) -> &Path;

    fn accept(&mut self);

    fn reject(&mut self, status: u16, message: &str);
}

/// Credentials from a Basic `Authorization` header
#[derive(Debug)]
pub struct PushCredential {
    pub username: String,
    pub password: SecretString,
}

impl PushCredential {
    /// Decode `Basic base64(username:password)`. The password is
    /// everything after the first `:`.
    pub fn from_header(value: &str) -> Result<Self, AuthError> {
        let mut parts = value.trim().splitn(2, ' ');
        let scheme = parts.next().unwrap_or_default();
        let encoded = parts.next().unwrap_or_default().trim();
        if !scheme.eq_ignore_ascii_case("basic") || encoded.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let decoded = BASE64
            .decode(encoded)
            .map_err(|_| AuthError::InvalidCredentials)?;
        let plain = String::from_utf8(decoded).map_err(|_| AuthError::InvalidCredentials)?;
        let (username, password) = plain
            .split_once(':')
            .ok_or(AuthError::InvalidCredentials)?;

        Ok(Self {
            username: username.to_string(),
            password: SecretString::from(password.to_string()),
        })
    }
}

/// A push that passed authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedPush {
    pub user_id: String,
    pub organisation_id: String,
    pub application_id: String,
    pub organisation_slug: String,
    pub application_slug: String,
}

/// Split `<org>/<app>[.git]` into slugs. A leading `/` is ignored and
/// `.git` is stripped only when present.
pub fn split_repository_path(path: &str) -> Option<(String, String)> {
    let (org, app) = path.trim_start_matches('/').split_once('/')?;
    let app = app.strip_suffix(".git").unwrap_or(app);
    if org.is_empty() || app.is_empty() || app.contains('/') {
        return None;
    }
    Some((org.to_string(), app.to_string()))
}

fn store_error(e: AgentError) -> AuthError {
    AuthError::Store(e.to_string())
}

/// Decide whether the pusher may push to the addressed repository
pub async fn authenticate(
    store: &dyn ModelStore,
    push: &dyn PushEvent,
) -> Result<AuthorizedPush, AuthError> {
    let header = push.header("authorization").ok_or_else(|| {
        warn!("No auth header present");
        AuthError::MissingAuthHeader
    })?;
    let credential = PushCredential::from_header(header)?;

    let (organisation_slug, application_slug) =
        split_repository_path(push.repository_path()).ok_or(AuthError::ApplicationNotFound)?;
    debug!(
        organisation = %organisation_slug,
        application = %application_slug,
        "Authorizing push"
    );

    let user = store
        .find_user_by_email(&credential.username.to_lowercase())
        .await
        .map_err(store_error)?
        .ok_or_else(|| {
            warn!("No user found for push");
            AuthError::InvalidCredentials
        })?;

    if !user.has_password() {
        warn!(user = %user.id, "User has no password");
        return Err(AuthError::NoPasswordSet);
    }
    if !user.verify_password(credential.password.expose_secret()) {
        warn!(user = %user.id, "Wrong password");
        return Err(AuthError::InvalidCredentials);
    }

    let organisation = store
        .find_organisation_for_member(&organisation_slug, &user.organisations)
        .await
        .map_err(store_error)?
        .ok_or_else(|| {
            warn!(user = %user.id, "Unable to load organisation");
            AuthError::OrganisationNotFound
        })?;

    let application = store
        .find_application(&organisation.id, &application_slug)
        .await
        .map_err(store_error)?
        .ok_or_else(|| {
            warn!(organisation = %organisation.id, "Unable to load application");
            AuthError::ApplicationNotFound
        })?;

    info!(user = %user.id, application = %application.id, "Push authorized");
    Ok(AuthorizedPush {
        user_id: user.id,
        organisation_id: organisation.id,
        application_id: application.id,
        organisation_slug,
        application_slug,
    })
}

/// Body of `POST /push/authorize`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushAuthorizeRequest {
    pub repository_path: String,
    pub working_directory: PathBuf,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Outcome of a push decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushDecision {
    pub accepted: bool,

    #[serde(skip)]
    pub status: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Push event built from an authorize request, recording the decision
#[derive(Debug)]
pub struct RequestPush {
    request: PushAuthorizeRequest,
    decision: Option<PushDecision>,
}

impl RequestPush {
    pub fn new(request: PushAuthorizeRequest) -> Self {
        Self {
            request,
            decision: None,
        }
    }

    pub fn decision(&self) -> Option<&PushDecision> {
        self.decision.as_ref()
    }

    pub fn into_decision(self) -> Option<PushDecision> {
        self.decision
    }
}

impl PushEvent for RequestPush {
    fn repository_path(&self) -> &str {
        &self.request.repository_path
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.request
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn working_directory(&self) -> &Path {
        &self.request.working_directory
    }

    fn accept(&mut self) {
        self.decision = Some(PushDecision {
            accepted: true,
            status: 200,
            message: None,
        });
    }

    fn reject(&mut self, status: u16, message: &str) {
        self.decision = Some(PushDecision {
            accepted: false,
            status,
            message: Some(message.to_string()),
        });
    }
}
