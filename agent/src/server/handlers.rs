//! HTTP request handlers

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use http::{header, StatusCode};
use serde::Serialize;
use tracing::{info, warn};

use crate::authn::push::{PushAuthorizeRequest, PushDecision, RequestPush};
use crate::models::deployment::DeployRequest;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Content type of streamed deploy responses
pub const NDJSON: &str = "application/x-ndjson";

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub deploys_in_flight: usize,
}

/// Health check handler
pub async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "pushdeploy".to_string(),
        version: version.version,
        deploys_in_flight: state.deploys.in_flight(),
    })
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Error body for requests rejected before any work starts
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Start a deploy and stream its log as newline-delimited JSON frames
pub async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<DeployRequest>,
) -> Response {
    let job = match request.into_job() {
        Ok(job) => job,
        Err(e) => {
            warn!("Rejected deploy request: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response();
        }
    };

    info!(
        "Deploy requested for {}/{} at {}",
        job.organisation_slug, job.application_slug, job.new_commit
    );
    let frames = state.deploys.submit(job);

    let stream = futures::stream::unfold(frames, |mut frames| async move {
        frames
            .recv()
            .await
            .map(|frame| (Ok::<_, Infallible>(frame.to_line()), frames))
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, NDJSON)
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Decide an inbound push for an external git front
pub async fn authorize_push_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<PushAuthorizeRequest>,
) -> Response {
    let mut push = RequestPush::new(request);
    state.gate.handle(&mut push).await;

    let decision = push.into_decision().unwrap_or(PushDecision {
        accepted: false,
        status: 500,
        message: Some("internal error".to_string()),
    });
    let status = StatusCode::from_u16(decision.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(decision)).into_response()
}
