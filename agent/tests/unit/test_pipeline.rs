//! Release pipeline tests

use std::sync::Arc;

use serde_json::json;

use pushdeploy::deploy::sink::CollectingSink;
use pushdeploy::deploy::DeployOutcome;
use pushdeploy::errors::AgentError;
use pushdeploy::models::deployment::NULL_COMMIT;
use pushdeploy::release::store::ReleaseStore;
use pushdeploy::storage::settings::PipelineSettings;
use pushdeploy::store::model::{Connection, FileModelStore, ModelStore};
use pushdeploy::store::scheduler::ScheduleStore;

use crate::common::{at, pipeline_with_installer, RecordingPublisher, TreeSource, Workspace, NEW};

const MANIFEST: &str = r#"{
    "name": "web",
    "schedules": {
        "*/5 * * * *": { "events": ["tick"] },
        "0 0 * * *": { "events": ["nightly", "report"] }
    }
}"#;

fn releases(ws: &Workspace) -> ReleaseStore {
    ReleaseStore::new(&ws.deploys_root(), "acme", "web", ".npmcache")
}

async fn reload_app(ws: &Workspace) -> pushdeploy::models::application::Application {
    let store = FileModelStore::new(ws.models_file());
    store.connect().await.unwrap();
    store.find_application("o1", "web").await.unwrap().unwrap()
}

#[tokio::test]
async fn test_branch_deletion_is_a_no_op() {
    let ws = Workspace::new().await;
    let events = Arc::new(RecordingPublisher::default());
    let (deployer, models, _) =
        ws.deployer(TreeSource::with_manifest(MANIFEST), events.clone(), PipelineSettings::default());
    let sink = CollectingSink::new();

    let outcome = deployer.deploy(&ws.job(NULL_COMMIT, at(1_700_000_000)), &sink).await;

    assert_eq!(outcome.unwrap(), DeployOutcome::Skipped);
    assert!(!releases(&ws).deploy_root().exists().await);
    assert!(!models.is_connected());
    assert!(events.messages().is_empty());
}

#[tokio::test]
async fn test_deploy_records_manifest_and_promotes() {
    let ws = Workspace::new().await;
    let events = Arc::new(RecordingPublisher::default());
    let (deployer, _, schedules) =
        ws.deployer(TreeSource::with_manifest(MANIFEST), events.clone(), PipelineSettings::default());
    let sink = CollectingSink::new();
    let job = ws.job(NEW, at(1_700_000_000));

    let outcome = deployer.deploy(&job, &sink).await.unwrap();

    assert_eq!(outcome, DeployOutcome::Deployed { release_id: 1_700_000_000 });
    let store = releases(&ws);
    assert_eq!(store.current_release().await.unwrap(), Some(1_700_000_000));
    assert!(store.release_dir(1_700_000_000).file("index.js").exists().await);

    let app = reload_app(&ws).await;
    let expected: serde_json::Value = serde_json::from_str(MANIFEST).unwrap();
    assert_eq!(app.settings.live, Some(expected));
    assert_eq!(app.last_deploy.live, Some(job.timestamp));
    let commit = app.last_commit.live.unwrap();
    assert_eq!(commit.sha1, NEW);
    assert_eq!(commit.user, "Jane Doe jane@acme.io");

    let registered = schedules.list_by_application("a1").await.unwrap();
    assert_eq!(registered.len(), 2);
    assert!(registered.iter().all(|e| e.spec.data.environment == "live"));

    assert!(events.has(&format!("Deploy starting. Hash: {}", NEW)));
    assert!(events.has(&format!("Deploy complete. Hash: {}", NEW)));
    assert!(events.has("notify:Update"));
    assert!(sink.contains("ref: refs/heads/master"));
    assert!(sink.contains("Deploy Completed Successfully"));
}

#[tokio::test]
async fn test_redeploy_replaces_schedules() {
    let ws = Workspace::new().await;
    let events = Arc::new(RecordingPublisher::default());
    let (first, _, schedules) =
        ws.deployer(TreeSource::with_manifest(MANIFEST), events.clone(), PipelineSettings::default());
    first
        .deploy(&ws.job(NEW, at(1_700_000_000)), &CollectingSink::new())
        .await
        .unwrap();

    let (second, _, _) = ws.deployer(
        TreeSource::with_manifest(r#"{"name":"web"}"#),
        events,
        PipelineSettings::default(),
    );
    second
        .deploy(&ws.job(NEW, at(1_700_000_100)), &CollectingSink::new())
        .await
        .unwrap();

    assert!(schedules.list_by_application("a1").await.unwrap().is_empty());
    assert_eq!(
        reload_app(&ws).await.settings.live,
        Some(json!({"name": "web"}))
    );
}

#[tokio::test]
async fn test_invalid_manifest_discards_release() {
    let ws = Workspace::new().await;
    let events = Arc::new(RecordingPublisher::default());
    let (deployer, _, _) = ws.deployer(
        TreeSource::with_manifest("{ not json"),
        events.clone(),
        PipelineSettings::default(),
    );
    let sink = CollectingSink::new();

    let err = deployer
        .deploy(&ws.job(NEW, at(1_700_000_000)), &sink)
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::ManifestError(_)));
    let store = releases(&ws);
    assert!(store.list_releases().await.unwrap().is_empty());
    assert_eq!(store.current_release().await.unwrap(), None);
    assert!(events.has(&format!("Deploy failed. Hash: {}", NEW)));
    assert!(!events.has("Deploy complete"));
    assert!(reload_app(&ws).await.settings.live.is_none());
}

#[tokio::test]
async fn test_failed_redeploy_keeps_previous_release() {
    let ws = Workspace::new().await;
    let events = Arc::new(RecordingPublisher::default());
    let (first, _, schedules) =
        ws.deployer(TreeSource::with_manifest(MANIFEST), events.clone(), PipelineSettings::default());
    first
        .deploy(&ws.job(NEW, at(1_700_000_000)), &CollectingSink::new())
        .await
        .unwrap();

    let (second, _, _) = ws.deployer(
        TreeSource::with_manifest("{ not json"),
        events,
        PipelineSettings::default(),
    );
    let err = second
        .deploy(&ws.job(NEW, at(1_700_000_050)), &CollectingSink::new())
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::ManifestError(_)));
    let store = releases(&ws);
    assert_eq!(store.list_releases().await.unwrap(), vec![1_700_000_000]);
    assert_eq!(store.current_release().await.unwrap(), Some(1_700_000_000));
    assert!(store.current_link().join("index.js").exists());
    assert!(!store.release_dir(1_700_000_050).exists().await);

    let expected: serde_json::Value = serde_json::from_str(MANIFEST).unwrap();
    assert_eq!(reload_app(&ws).await.settings.live, Some(expected));
    assert_eq!(schedules.list_by_application("a1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_missing_manifest_fails() {
    let ws = Workspace::new().await;
    let events = Arc::new(RecordingPublisher::default());
    let (deployer, _, _) = ws.deployer(
        TreeSource::new(&[("index.js", "")]),
        events,
        PipelineSettings::default(),
    );

    let err = deployer
        .deploy(&ws.job(NEW, at(1_700_000_000)), &CollectingSink::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::ManifestError(_)));
}

#[tokio::test]
async fn test_unknown_application_creates_nothing() {
    let ws = Workspace::new().await;
    let events = Arc::new(RecordingPublisher::default());
    let (deployer, _, _) =
        ws.deployer(TreeSource::with_manifest(MANIFEST), events.clone(), PipelineSettings::default());
    let job = pushdeploy::models::deployment::DeploymentJob::new(
        ws.tmp.path().join("repos").join("acme").join("api.git"),
        crate::common::OLD,
        NEW,
        "refs/heads/master",
    )
    .unwrap();

    let err = deployer.deploy(&job, &CollectingSink::new()).await.unwrap_err();

    assert!(matches!(err, AgentError::ApplicationNotFound(_)));
    assert!(events.messages().is_empty());
    assert!(!ws.deploys_root().join("acme").join("api").exists());
}

#[tokio::test]
async fn test_retention_keeps_newest_releases() {
    let ws = Workspace::new().await;
    let events = Arc::new(RecordingPublisher::default());
    let (deployer, _, _) =
        ws.deployer(TreeSource::with_manifest(MANIFEST), events, PipelineSettings::default());

    for offset in 0..5 {
        deployer
            .deploy(&ws.job(NEW, at(1_700_000_000 + offset)), &CollectingSink::new())
            .await
            .unwrap();
    }

    let store = releases(&ws);
    assert_eq!(
        store.list_releases().await.unwrap(),
        vec![1_700_000_002, 1_700_000_003, 1_700_000_004]
    );
    assert_eq!(store.current_release().await.unwrap(), Some(1_700_000_004));
}

#[tokio::test]
async fn test_same_second_deploys_get_distinct_releases() {
    let ws = Workspace::new().await;
    let events = Arc::new(RecordingPublisher::default());
    let (deployer, _, _) =
        ws.deployer(TreeSource::with_manifest(MANIFEST), events, PipelineSettings::default());

    let first = deployer
        .deploy(&ws.job(NEW, at(1_700_000_000)), &CollectingSink::new())
        .await
        .unwrap();
    let second = deployer
        .deploy(&ws.job(NEW, at(1_700_000_000)), &CollectingSink::new())
        .await
        .unwrap();

    assert_eq!(first, DeployOutcome::Deployed { release_id: 1_700_000_000 });
    assert_eq!(second, DeployOutcome::Deployed { release_id: 1_700_000_001 });
}

#[tokio::test]
async fn test_release_connection_disconnects() {
    let ws = Workspace::new().await;
    let events = Arc::new(RecordingPublisher::default());
    let models = Arc::new(FileModelStore::new(ws.models_file()));
    let mut options = ws.options(PipelineSettings::default());
    options.release_connection = true;
    let deployer = pushdeploy::deploy::Deployer::new(
        models.clone(),
        Arc::new(pushdeploy::store::scheduler::FileScheduleStore::new(ws.schedules_file())),
        events,
        Arc::new(TreeSource::with_manifest(MANIFEST)),
        options,
    );

    deployer
        .deploy(&ws.job(NEW, at(1_700_000_000)), &CollectingSink::new())
        .await
        .unwrap();
    assert!(!models.is_connected());
}

#[cfg(unix)]
#[tokio::test]
async fn test_install_populates_and_saves_cache() {
    let ws = Workspace::new().await;
    let events = Arc::new(RecordingPublisher::default());
    let source = TreeSource::new(&[
        ("hoist.json", r#"{"name":"web"}"#),
        ("package.json", "{}"),
    ]);
    let pipeline = pipeline_with_installer(
        "sh",
        &["-c", "mkdir -p node_modules && echo ok > node_modules/marker && echo installed"],
    );
    let (deployer, _, _) = ws.deployer(source, events, pipeline);
    let sink = CollectingSink::new();

    deployer
        .deploy(&ws.job(NEW, at(1_700_000_000)), &sink)
        .await
        .unwrap();

    let store = releases(&ws);
    assert!(store.cache_dir().file("marker").exists().await);
    assert!(store
        .release_dir(1_700_000_000)
        .subdir("node_modules")
        .file("marker")
        .exists()
        .await);
    assert!(sink.contains("installed"));
    assert!(!store.list_releases().await.unwrap().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_install_failure_leaves_cache_untouched() {
    let ws = Workspace::new().await;
    let events = Arc::new(RecordingPublisher::default());
    let source = TreeSource::new(&[
        ("hoist.json", r#"{"name":"web"}"#),
        ("package.json", "{}"),
    ]);
    let pipeline = pipeline_with_installer("sh", &["-c", "echo broken >&2; exit 3"]);
    let (deployer, _, _) = ws.deployer(source, events.clone(), pipeline);
    let sink = CollectingSink::new();

    let err = deployer
        .deploy(&ws.job(NEW, at(1_700_000_000)), &sink)
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::InstallFailed(_)));
    let store = releases(&ws);
    assert!(!store.cache_dir().exists().await);
    assert!(store.list_releases().await.unwrap().is_empty());
    assert!(sink.contains("broken"));
    assert!(events.has("Deploy failed"));
}
