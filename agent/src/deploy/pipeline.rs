//! The release pipeline run for every pushed ref

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::deploy::fsm::{DeploymentEvent, DeploymentFsm};
use crate::deploy::git::{materialize, SourceRepository};
use crate::deploy::manifest::extract_manifest;
use crate::deploy::packages::PackageInstaller;
use crate::deploy::schedules::reconcile_schedules;
use crate::deploy::sink::LogSink;
use crate::deploy::timings::StageTimer;
use crate::errors::AgentError;
use crate::events::EventPublisher;
use crate::models::application::Application;
use crate::models::deployment::DeploymentJob;
use crate::models::event::{Event, ExecutionLogEvent, Notification};
use crate::release::cache::DependencyCache;
use crate::release::store::ReleaseStore;
use crate::storage::settings::PipelineSettings;
use crate::store::model::ModelStore;
use crate::store::scheduler::ScheduleStore;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[37m";

/// Deployer options
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Base directory holding `<organisation>/<application>` release trees
    pub deploys_root: PathBuf,

    pub pipeline: PipelineSettings,

    /// Disconnect the model store when a job finishes. Set when the
    /// deployer owns the connection for a single job.
    pub release_connection: bool,
}

/// What a job ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// Branch deletion, nothing ran
    Skipped,

    /// A new release is current
    Deployed { release_id: u64 },
}

/// State carried through one job
struct JobRun {
    fsm: DeploymentFsm,
    timer: StageTimer,
    releases: ReleaseStore,
    application: Option<Application>,
    release_id: Option<u64>,
}

impl JobRun {
    fn new(releases: ReleaseStore) -> Self {
        Self {
            fsm: DeploymentFsm::new(),
            timer: StageTimer::start(),
            releases,
            application: None,
            release_id: None,
        }
    }

    fn advance(&mut self, event: DeploymentEvent) -> Result<(), AgentError> {
        self.fsm.process(event).map_err(AgentError::DeployError)
    }
}

/// Runs deployment jobs against the shared collaborators
pub struct Deployer {
    models: Arc<dyn ModelStore>,
    schedules: Arc<dyn ScheduleStore>,
    events: Arc<dyn EventPublisher>,
    source: Arc<dyn SourceRepository>,
    options: DeployOptions,
}

impl Deployer {
    pub fn new(
        models: Arc<dyn ModelStore>,
        schedules: Arc<dyn ScheduleStore>,
        events: Arc<dyn EventPublisher>,
        source: Arc<dyn SourceRepository>,
        options: DeployOptions,
    ) -> Self {
        Self {
            models,
            schedules,
            events,
            source,
            options,
        }
    }

    pub fn options(&self) -> &DeployOptions {
        &self.options
    }

    /// Release store for the job's application
    pub fn release_store(&self, job: &DeploymentJob) -> ReleaseStore {
        ReleaseStore::new(
            &self.options.deploys_root,
            &job.organisation_slug,
            &job.application_slug,
            &self.options.pipeline.cache_dir,
        )
    }

    /// Run the pipeline for one job, streaming progress to `sink`
    pub async fn deploy(
        &self,
        job: &DeploymentJob,
        sink: &dyn LogSink,
    ) -> Result<DeployOutcome, AgentError> {
        let mut run = JobRun::new(self.release_store(job));

        if job.is_branch_deletion() {
            run.advance(DeploymentEvent::Skip)?;
            info!("{} deleted, nothing to deploy", job.branch_ref);
            sink.write(&format!("{} deleted, nothing to deploy", job.branch_ref));
            return Ok(DeployOutcome::Skipped);
        }

        let result = self.execute(job, sink, &mut run).await;

        run.timer.flush(&format!(
            "{}/{}@{}",
            job.organisation_slug, job.application_slug, job.new_commit
        ));
        if self.options.release_connection {
            if let Err(e) = self.models.disconnect().await {
                warn!("Unable to disconnect model store: {}", e);
            }
        }

        result
    }

    /// Banner, stages, then completion or compensation
    async fn execute(
        &self,
        job: &DeploymentJob,
        sink: &dyn LogSink,
        run: &mut JobRun,
    ) -> Result<DeployOutcome, AgentError> {
        self.print_banner(job, sink);
        run.timer.record("banner");

        match self.run_stages(job, sink, run).await {
            Ok(release_id) => {
                self.complete(job, sink, run).await;
                Ok(DeployOutcome::Deployed { release_id })
            }
            Err(e) => {
                self.compensate(job, sink, run, &e).await;
                Err(e)
            }
        }
    }

    fn print_banner(&self, job: &DeploymentJob, sink: &dyn LogSink) {
        sink.write(&format!("{}starting deployment{}", GREEN, RESET));
        sink.write(&format!("ref: {}", job.branch_ref));
        sink.write(&format!("commit: {}", job.new_commit));
        sink.write(&format!("original: {}", job.original_commit));
    }

    async fn run_stages(
        &self,
        job: &DeploymentJob,
        sink: &dyn LogSink,
        run: &mut JobRun,
    ) -> Result<u64, AgentError> {
        run.advance(DeploymentEvent::Resolve)?;
        if !self.models.is_connected() {
            self.models.connect().await?;
        }
        run.timer.record("connect");

        let application = self.resolve_application(job).await?;
        run.application = Some(application.clone());
        run.timer.record("resolve");

        self.events
            .log_execution(ExecutionLogEvent::deploy(
                &application.id,
                format!("Deploy starting. Hash: {}", job.new_commit),
            ))
            .await?;
        run.timer.record("announce");

        run.advance(DeploymentEvent::Materialize)?;
        let release_id = run.releases.create_release(job.release_id()).await?;
        run.release_id = Some(release_id);
        let release = run.releases.release_dir(release_id);
        sink.write(&format!("extracting {} into release {}", job.new_commit, release_id));
        materialize(
            self.source.as_ref(),
            &job.repository_path,
            &job.new_commit,
            &release,
        )
        .await?;
        run.timer.record("materialize");

        run.advance(DeploymentEvent::Install)?;
        self.install_packages(run, release_id, sink).await?;
        run.timer.record("install");

        run.advance(DeploymentEvent::Configure)?;
        sink.write("updating config");
        let manifest = extract_manifest(release.path(), &self.options.pipeline.manifest_file)
            .await
            .map_err(|e| {
                sink.write(&format!("{}{}{}", RED, e, RESET));
                AgentError::from(e)
            })?;
        let schedules = manifest.schedules()?;
        let commit = self
            .source
            .commit_info(&job.repository_path, &job.new_commit)
            .await?;

        let mut application = application;
        application.settings.live = Some(manifest.into_value());
        application.last_deploy.live = Some(job.timestamp);
        application.last_commit.live = Some(commit);
        self.models.save_application(&application).await?;
        run.application = Some(application.clone());
        run.timer.record("configure");

        run.advance(DeploymentEvent::Schedule)?;
        sink.write("updating schedules");
        reconcile_schedules(self.schedules.as_ref(), &application.id, &schedules).await?;
        run.timer.record("schedules");

        run.releases.promote(release_id).await?;
        run.advance(DeploymentEvent::Promote)?;
        sink.write(&format!("{}Deploy Completed Successfully{}", GREEN, RESET));
        run.timer.record("promote");

        Ok(release_id)
    }

    async fn resolve_application(&self, job: &DeploymentJob) -> Result<Application, AgentError> {
        let organisation = self
            .models
            .find_organisation_by_slug(&job.organisation_slug)
            .await?
            .ok_or_else(|| AgentError::OrganisationNotFound(job.organisation_slug.clone()))?;

        self.models
            .find_application(&organisation.id, &job.application_slug)
            .await?
            .ok_or_else(|| AgentError::ApplicationNotFound(job.application_slug.clone()))
    }

    async fn install_packages(
        &self,
        run: &JobRun,
        release_id: u64,
        sink: &dyn LogSink,
    ) -> Result<(), AgentError> {
        let settings = &self.options.pipeline;
        let release = run.releases.release_dir(release_id);
        if !release.file(&settings.dependency_manifest).exists().await {
            return Ok(());
        }

        let cache = DependencyCache::new(run.releases.cache_dir());
        let dependencies = release.subdir(&settings.dependency_dir);

        match cache.restore(&dependencies).await {
            Ok(true) => sink.write("restored dependency cache"),
            Ok(false) => {}
            Err(e) => warn!("Unable to restore dependency cache: {}", e),
        }

        let installer =
            PackageInstaller::new(&settings.installer_program, settings.installer_args.clone());
        sink.write(&format!("{}--------> starting {}{}", GREEN, installer.command_line(), RESET));
        installer.install(release.path(), sink).await?;
        sink.write(&format!("{}<-------- {} done{}", GREEN, settings.installer_program, RESET));

        if let Err(e) = cache.save(&dependencies).await {
            warn!("Unable to save dependency cache: {}", e);
        }
        Ok(())
    }

    /// Stages after promotion. Nothing here can fail the job.
    async fn complete(&self, job: &DeploymentJob, sink: &dyn LogSink, run: &mut JobRun) {
        let keep = self.options.pipeline.retention;
        if run.advance(DeploymentEvent::Sweep).is_ok() {
            sink.write("cleaning up");
            if let Err(e) = run.releases.retention_sweep(keep).await {
                warn!("Retention sweep failed: {}", e);
            }
            run.timer.record("sweep");
        }

        if let Some(application) = &run.application {
            if let Err(e) = self.events.notify(Notification::update(&application.id)).await {
                warn!("Unable to send update notification: {}", e);
            }
            if let Err(e) = self.events.publish(Event::post_deploy(&application.id)).await {
                warn!("Unable to publish deploy event: {}", e);
            }
            if let Err(e) = self
                .events
                .log_execution(ExecutionLogEvent::deploy(
                    &application.id,
                    format!("Deploy complete. Hash: {}", job.new_commit),
                ))
                .await
            {
                warn!("Unable to log deploy completion: {}", e);
            }
        }
        run.timer.record("events");

        if let Err(e) = run.advance(DeploymentEvent::Complete) {
            warn!("{}", e);
        }
    }

    async fn compensate(
        &self,
        job: &DeploymentJob,
        sink: &dyn LogSink,
        run: &mut JobRun,
        err: &AgentError,
    ) {
        error!(
            "Deploy of {}/{} at {} failed: {}",
            job.organisation_slug, job.application_slug, job.new_commit, err
        );
        // The stage that failed never reached its own record
        run.timer.record("failed");
        sink.write(&format!("{}Deploy failed: {}{}", RED, err, RESET));
        if let Err(e) = run.advance(DeploymentEvent::Fail(err.to_string())) {
            warn!("{}", e);
        }

        if let Some(application) = &run.application {
            if let Err(e) = self
                .events
                .log_execution(ExecutionLogEvent::deploy(
                    &application.id,
                    format!("Deploy failed. Hash: {}", job.new_commit),
                ))
                .await
            {
                warn!("Unable to log deploy failure: {}", e);
            }
        }

        if !run.fsm.is_promoted() {
            if let Some(release_id) = run.release_id {
                if let Err(e) = run.releases.discard(release_id).await {
                    warn!("Unable to remove partial release {}: {}", release_id, e);
                }
            }
        }
    }
}
