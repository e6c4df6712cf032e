//! HTTP route tests

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use pushdeploy::authn::gate::PushGate;
use pushdeploy::hooks::HookInstaller;
use pushdeploy::http::client::FrameDecoder;
use pushdeploy::models::deployment::DeployFrame;
use pushdeploy::server::serve::router;
use pushdeploy::server::state::ServerState;
use pushdeploy::storage::settings::PipelineSettings;
use pushdeploy::store::model::FileModelStore;
use pushdeploy::workers::deployer::{DeployQueue, Options};

use crate::common::{RecordingPublisher, TreeSource, Workspace, NEW, OLD};

fn app(ws: &Workspace) -> axum::Router {
    let (deployer, _, _) = ws.deployer(
        TreeSource::with_manifest(r#"{"name":"web"}"#),
        Arc::new(RecordingPublisher::default()),
        PipelineSettings::default(),
    );
    let deploys = Arc::new(DeployQueue::new(Arc::new(deployer), &Options::default()));
    let gate = Arc::new(PushGate::new(
        Arc::new(FileModelStore::new(ws.models_file())),
        HookInstaller::new("/usr/local/bin/pushdeploy"),
    ));
    router(Arc::new(ServerState::new(deploys, gate)))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let ws = Workspace::new().await;
    let response = app(&ws)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value =
        serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["deploys_in_flight"], 0);
}

#[tokio::test]
async fn test_deploy_streams_ndjson() {
    let ws = Workspace::new().await;
    let request = post_json(
        "/deploy",
        json!({
            "repository_path": ws.repository(),
            "original_commit": OLD,
            "new_commit": NEW,
            "branch_ref": "refs/heads/master",
        }),
    );

    let response = app(&ws).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/x-ndjson"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let mut decoder = FrameDecoder::default();
    let frames = decoder.push(&bytes).unwrap();
    assert!(decoder.finish().unwrap().is_none());

    assert!(frames.len() > 1);
    assert_eq!(
        frames.last(),
        Some(&DeployFrame::Done {
            success: true,
            error: None
        })
    );
    assert_eq!(
        frames
            .iter()
            .filter(|f| matches!(f, DeployFrame::Done { .. }))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_deploy_rejects_bad_commit() {
    let ws = Workspace::new().await;
    let request = post_json(
        "/deploy",
        json!({
            "repository_path": ws.repository(),
            "original_commit": OLD,
            "new_commit": "not-a-commit",
            "branch_ref": "refs/heads/master",
        }),
    );

    let response = app(&ws).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value =
        serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert!(body["error"].as_str().unwrap().contains("not-a-commit"));
}

#[tokio::test]
async fn test_authorize_push_without_credentials() {
    let ws = Workspace::new().await;
    let request = post_json(
        "/push/authorize",
        json!({
            "repository_path": "acme/web.git",
            "working_directory": ws.repository(),
        }),
    );

    let response = app(&ws).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value =
        serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body, json!({"accepted": false, "message": "missing auth header"}));
}
