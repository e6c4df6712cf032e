//! Shared fixtures for the integration tests

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use pushdeploy::authn::password::hash_password;
use pushdeploy::deploy::git::SourceRepository;
use pushdeploy::deploy::{DeployOptions, Deployer};
use pushdeploy::errors::AgentError;
use pushdeploy::events::EventPublisher;
use pushdeploy::filesys::file::File;
use pushdeploy::models::application::{Application, CommitInfo, EmailAddress, Organisation, User};
use pushdeploy::models::deployment::DeploymentJob;
use pushdeploy::models::event::{Event, ExecutionLogEvent, Notification};
use pushdeploy::storage::settings::PipelineSettings;
use pushdeploy::store::model::{FileModelStore, ModelDocument};
use pushdeploy::store::scheduler::FileScheduleStore;

pub const OLD: &str = "1111111111111111111111111111111111111111";
pub const NEW: &str = "abcdefabcdefabcdefabcdefabcdefabcdefabcd";
pub const PASSWORD: &str = "hunter2";

/// Serves a fixed tree for every commit
pub struct TreeSource {
    files: Vec<(String, String)>,
}

impl TreeSource {
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(name, body)| (name.to_string(), body.to_string()))
                .collect(),
        }
    }

    pub fn with_manifest(manifest: &str) -> Self {
        Self::new(&[("hoist.json", manifest), ("index.js", "console.log('hi')\n")])
    }
}

#[async_trait]
impl SourceRepository for TreeSource {
    async fn archive(
        &self,
        _repository: &Path,
        _commit: &str,
        dest: &Path,
    ) -> Result<(), AgentError> {
        let file = std::fs::File::create(dest)?;
        let mut builder = tar::Builder::new(file);
        for (name, body) in &self.files {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, body.as_bytes())?;
        }
        builder.finish()?;
        Ok(())
    }

    async fn commit_info(
        &self,
        _repository: &Path,
        commit: &str,
    ) -> Result<CommitInfo, AgentError> {
        Ok(CommitInfo {
            message: "Ship it".to_string(),
            sha1: commit.to_string(),
            user: "Jane Doe jane@acme.io".to_string(),
        })
    }
}

/// Records every event it receives
#[derive(Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<String>>,
}

impl RecordingPublisher {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn has(&self, prefix: &str) -> bool {
        self.messages().iter().any(|m| m.starts_with(prefix))
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn log_execution(&self, event: ExecutionLogEvent) -> Result<(), AgentError> {
        self.messages.lock().unwrap().push(event.message);
        Ok(())
    }

    async fn notify(&self, notification: Notification) -> Result<(), AgentError> {
        self.messages
            .lock()
            .unwrap()
            .push(format!("notify:{}", notification.notification_type));
        Ok(())
    }

    async fn publish(&self, event: Event) -> Result<(), AgentError> {
        self.messages
            .lock()
            .unwrap()
            .push(format!("event:{}", event.event_name));
        Ok(())
    }
}

/// A scratch workspace holding the stores, repository and deploy root
pub struct Workspace {
    pub tmp: TempDir,
}

impl Workspace {
    pub async fn new() -> Self {
        let ws = Self {
            tmp: tempfile::tempdir().unwrap(),
        };
        File::new(ws.models_file())
            .write_json(&document())
            .await
            .unwrap();
        std::fs::create_dir_all(ws.repository()).unwrap();
        ws
    }

    pub fn models_file(&self) -> PathBuf {
        self.tmp.path().join("data").join("models.json")
    }

    pub fn schedules_file(&self) -> PathBuf {
        self.tmp.path().join("data").join("schedules.json")
    }

    pub fn deploys_root(&self) -> PathBuf {
        self.tmp.path().join("deploys")
    }

    pub fn repository(&self) -> PathBuf {
        self.tmp.path().join("repos").join("acme").join("web.git")
    }

    pub fn job(&self, new_commit: &str, at: DateTime<Utc>) -> DeploymentJob {
        DeploymentJob::new(self.repository(), OLD, new_commit, "refs/heads/master")
            .unwrap()
            .with_timestamp(at)
    }

    pub fn options(&self, pipeline: PipelineSettings) -> DeployOptions {
        DeployOptions {
            deploys_root: self.deploys_root(),
            pipeline,
            release_connection: false,
        }
    }

    pub fn deployer(
        &self,
        source: TreeSource,
        events: Arc<RecordingPublisher>,
        pipeline: PipelineSettings,
    ) -> (Deployer, Arc<FileModelStore>, Arc<FileScheduleStore>) {
        let models = Arc::new(FileModelStore::new(self.models_file()));
        let schedules = Arc::new(FileScheduleStore::new(self.schedules_file()));
        let deployer = Deployer::new(
            models.clone(),
            schedules.clone(),
            events,
            Arc::new(source),
            self.options(pipeline),
        );
        (deployer, models, schedules)
    }
}

pub fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).unwrap()
}

/// Pipeline settings that never reach for npm
pub fn pipeline_with_installer(program: &str, args: &[&str]) -> PipelineSettings {
    PipelineSettings {
        installer_program: program.to_string(),
        installer_args: args.iter().map(|a| a.to_string()).collect(),
        ..PipelineSettings::default()
    }
}

pub fn document() -> ModelDocument {
    ModelDocument {
        organisations: vec![
            Organisation {
                id: "o1".into(),
                slug: "acme".into(),
                name: "Acme".into(),
            },
            Organisation {
                id: "o2".into(),
                slug: "rival".into(),
                name: "Rival".into(),
            },
        ],
        applications: vec![Application {
            id: "a1".into(),
            organisation: "o1".into(),
            slug: "web".into(),
            name: "Web".into(),
            settings: Default::default(),
            last_deploy: Default::default(),
            last_commit: Default::default(),
        }],
        users: vec![
            User {
                id: "u1".into(),
                email_addresses: vec![EmailAddress {
                    address: "dev@acme.io".into(),
                }],
                organisations: vec!["o1".into()],
                password_hash: Some(hash_password(PASSWORD).unwrap()),
            },
            User {
                id: "u2".into(),
                email_addresses: vec![EmailAddress {
                    address: "new@acme.io".into(),
                }],
                organisations: vec!["o1".into()],
                password_hash: None,
            },
        ],
    }
}
