//! Push gate tests

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use pushdeploy::authn::gate::PushGate;
use pushdeploy::authn::push::{PushAuthorizeRequest, PushDecision, RequestPush};
use pushdeploy::hooks::HookInstaller;
use pushdeploy::store::model::FileModelStore;

use crate::common::{Workspace, PASSWORD};

fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{}:{}", user, pass)))
}

fn gate(ws: &Workspace) -> PushGate {
    PushGate::new(
        Arc::new(FileModelStore::new(ws.models_file())),
        HookInstaller::new("/usr/local/bin/pushdeploy"),
    )
}

fn request(ws: &Workspace, path: &str, auth: Option<String>) -> RequestPush {
    let mut headers = HashMap::new();
    if let Some(auth) = auth {
        headers.insert("Authorization".to_string(), auth);
    }
    RequestPush::new(PushAuthorizeRequest {
        repository_path: path.to_string(),
        working_directory: ws.repository(),
        headers,
    })
}

async fn decide(ws: &Workspace, path: &str, auth: Option<String>) -> PushDecision {
    let mut push = request(ws, path, auth);
    gate(ws).handle(&mut push).await;
    push.into_decision().unwrap()
}

fn hook_file(ws: &Workspace) -> PathBuf {
    HookInstaller::hook_path(&ws.repository())
}

#[tokio::test]
async fn test_accepts_member_and_installs_hook() {
    let ws = Workspace::new().await;
    let mut push = request(&ws, "acme/web.git", Some(basic("DEV@acme.io", PASSWORD)));

    let authorized = gate(&ws).handle(&mut push).await.unwrap();

    assert_eq!(authorized.user_id, "u1");
    assert_eq!(authorized.application_id, "a1");
    let decision = push.into_decision().unwrap();
    assert!(decision.accepted);
    assert_eq!(decision.status, 200);

    let script = std::fs::read_to_string(hook_file(&ws)).unwrap();
    assert!(script.contains("/usr/local/bin/pushdeploy"));
}

#[tokio::test]
async fn test_gate_future_can_cross_threads() {
    fn assert_send<T: Send>(_: &T) {}

    let ws = Workspace::new().await;
    let gate = gate(&ws);
    let mut push = request(&ws, "acme/web.git", Some(basic("dev@acme.io", PASSWORD)));

    let handling = gate.handle(&mut push);
    assert_send(&handling);
    assert!(handling.await.is_some());
}

#[tokio::test]
async fn test_existing_hook_is_kept() {
    let ws = Workspace::new().await;
    std::fs::create_dir_all(hook_file(&ws).parent().unwrap()).unwrap();
    std::fs::write(hook_file(&ws), "#!/bin/sh\necho custom\n").unwrap();

    let decision = decide(&ws, "acme/web", Some(basic("dev@acme.io", PASSWORD))).await;

    assert!(decision.accepted);
    assert_eq!(
        std::fs::read_to_string(hook_file(&ws)).unwrap(),
        "#!/bin/sh\necho custom\n"
    );
}

#[tokio::test]
async fn test_rejection_matrix() {
    let ws = Workspace::new().await;
    let cases = [
        ("acme/web.git", None, "missing auth header"),
        (
            "acme/web.git",
            Some("Bearer abc".to_string()),
            "incorrect username or password provided",
        ),
        (
            "acme/web.git",
            Some(basic("nobody@acme.io", PASSWORD)),
            "incorrect username or password provided",
        ),
        (
            "acme/web.git",
            Some(basic("dev@acme.io", "wrong")),
            "incorrect username or password provided",
        ),
        (
            "acme/web.git",
            Some(basic("new@acme.io", "")),
            "incorrect username or password provided",
        ),
        (
            "rival/web.git",
            Some(basic("dev@acme.io", PASSWORD)),
            "repository not found",
        ),
        (
            "acme/api.git",
            Some(basic("dev@acme.io", PASSWORD)),
            "repository not found",
        ),
    ];

    for (path, auth, message) in cases {
        let decision = decide(&ws, path, auth.clone()).await;
        assert!(!decision.accepted, "{} {:?} was accepted", path, auth);
        assert_eq!(decision.status, 401);
        assert_eq!(decision.message.as_deref(), Some(message));
    }

    assert!(!hook_file(&ws).exists());
}

#[tokio::test]
async fn test_unreadable_store_is_an_internal_error() {
    let ws = Workspace::new().await;
    std::fs::write(ws.models_file(), "not json").unwrap();

    let decision = decide(&ws, "acme/web.git", Some(basic("dev@acme.io", PASSWORD))).await;

    assert!(!decision.accepted);
    assert_eq!(decision.status, 500);
    assert_eq!(decision.message.as_deref(), Some("internal error"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_hook_failure_rejects_push() {
    let ws = Workspace::new().await;
    // A file where the hooks directory should be
    std::fs::write(ws.repository().join("hooks"), "").unwrap();

    let decision = decide(&ws, "acme/web.git", Some(basic("dev@acme.io", PASSWORD))).await;

    assert!(!decision.accepted);
    assert_eq!(decision.status, 500);
    assert_eq!(decision.message.as_deref(), Some("unable to prepare repository"));
}
