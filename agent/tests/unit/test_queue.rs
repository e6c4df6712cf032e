//! Deploy queue tests

use std::sync::Arc;

use pushdeploy::models::deployment::{DeployFrame, NULL_COMMIT};
use pushdeploy::storage::settings::PipelineSettings;
use pushdeploy::workers::deployer::{DeployQueue, Options};

use crate::common::{at, RecordingPublisher, TreeSource, Workspace, NEW};

async fn collect(mut frames: tokio::sync::mpsc::UnboundedReceiver<DeployFrame>) -> Vec<DeployFrame> {
    let mut out = Vec::new();
    while let Some(frame) = frames.recv().await {
        out.push(frame);
    }
    out
}

fn done_frames(frames: &[DeployFrame]) -> Vec<&DeployFrame> {
    frames
        .iter()
        .filter(|f| matches!(f, DeployFrame::Done { .. }))
        .collect()
}

fn queue(ws: &Workspace, manifest: &str, max_concurrent: usize) -> DeployQueue {
    let (deployer, _, _) = ws.deployer(
        TreeSource::with_manifest(manifest),
        Arc::new(RecordingPublisher::default()),
        PipelineSettings::default(),
    );
    DeployQueue::new(Arc::new(deployer), &Options { max_concurrent })
}

#[tokio::test]
async fn test_successful_job_ends_with_one_done_frame() {
    let ws = Workspace::new().await;
    let queue = queue(&ws, r#"{"name":"web"}"#, 2);

    let frames = collect(queue.submit(ws.job(NEW, at(1_700_000_000)))).await;

    assert_eq!(done_frames(&frames).len(), 1);
    assert_eq!(
        frames.last(),
        Some(&DeployFrame::Done {
            success: true,
            error: None
        })
    );
    assert!(frames
        .iter()
        .any(|f| matches!(f, DeployFrame::Log { line } if line.starts_with("commit: "))));
}

#[tokio::test]
async fn test_failed_job_reports_error() {
    let ws = Workspace::new().await;
    let queue = queue(&ws, "[]", 2);

    let frames = collect(queue.submit(ws.job(NEW, at(1_700_000_000)))).await;

    assert_eq!(done_frames(&frames).len(), 1);
    match frames.last() {
        Some(DeployFrame::Done { success, error }) => {
            assert!(!success);
            assert!(error.as_deref().unwrap_or_default().contains("manifest"));
        }
        other => panic!("unexpected last frame: {:?}", other),
    }
}

#[tokio::test]
async fn test_skipped_job_succeeds() {
    let ws = Workspace::new().await;
    let queue = queue(&ws, r#"{"name":"web"}"#, 1);

    let frames = collect(queue.submit(ws.job(NULL_COMMIT, at(1_700_000_000)))).await;

    assert_eq!(
        frames.last(),
        Some(&DeployFrame::Done {
            success: true,
            error: None
        })
    );
}

#[tokio::test]
async fn test_drain_waits_for_running_jobs() {
    let ws = Workspace::new().await;
    let queue = queue(&ws, r#"{"name":"web"}"#, 1);

    let first = queue.submit(ws.job(NEW, at(1_700_000_000)));
    let second = queue.submit(ws.job(NEW, at(1_700_000_010)));
    let (first, second) = tokio::join!(collect(first), collect(second));
    queue.drain().await.unwrap();

    assert_eq!(queue.in_flight(), 0);
    for frames in [first, second] {
        assert_eq!(
            frames.last(),
            Some(&DeployFrame::Done {
                success: true,
                error: None
            })
        );
    }
}
