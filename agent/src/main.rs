//! pushdeploy - Entry Point
//!
//! Self-hosted git push-to-deploy agent. Runs as a local service that
//! authorizes pushes and deploys pushed commits, or as the post-receive
//! hook client that forwards ref updates to it.

use std::collections::HashMap;
use std::env;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use pushdeploy::app::options::AppOptions;
use pushdeploy::app::run::{deploy_once, run};
use pushdeploy::authn::password::hash_password;
use pushdeploy::deploy::DeployOutcome;
use pushdeploy::hook::run::{parse_requests, run_hook};
use pushdeploy::installer::install::install;
use pushdeploy::logs::{init_logging, LogLevel, LogOptions};
use pushdeploy::models::deployment::DeploymentJob;
use pushdeploy::storage::layout::StorageLayout;
use pushdeploy::storage::settings::Settings;
use pushdeploy::utils::version_info;

use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    match run_cli(&cli_args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("[ERROR] {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_cli(cli_args: &HashMap<String, String>) -> anyhow::Result<bool> {
    // Print version and exit
    if cli_args.contains_key("version") {
        println!("{}", serde_json::to_string_pretty(&version_info())?);
        return Ok(true);
    }

    // Print a credential hash for the model store
    if let Some(password) = cli_args.get("hash-password") {
        println!("{}", hash_password(password)?);
        return Ok(true);
    }

    // Run the installer
    if cli_args.contains_key("install") {
        install(cli_args).await?;
        return Ok(true);
    }

    let layout = cli_args
        .get("home")
        .map(|home| StorageLayout::new(PathBuf::from(home)))
        .unwrap_or_default();
    let settings = load_settings(&layout).await?;

    // Hook client: keep stdout for the pusher
    if cli_args.contains_key("hook") {
        let _guard = init_logging(LogOptions {
            log_level: LogLevel::Error,
            ..Default::default()
        });
        return Ok(run_hook(cli_args, &settings.server.base_url()).await?);
    }

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        stdout: true,
        log_dir: settings
            .log_to_file
            .then(|| layout.logs_dir().path().to_path_buf()),
        json_format: settings.log_json,
    };
    let _guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    let options = AppOptions::from_settings(layout, &settings);

    // One-shot deploy in this process
    if cli_args.contains_key("deploy") {
        return deploy_from_cli(cli_args, &options).await;
    }

    // Run the service
    info!("Running pushdeploy with options: {:?}", options);
    run(options, await_shutdown_signal())
        .await
        .context("service stopped with an error")?;
    Ok(true)
}

async fn load_settings(layout: &StorageLayout) -> anyhow::Result<Settings> {
    let settings_file = layout.settings_file();
    if !settings_file.exists().await {
        warn!("No settings at {:?}, using defaults", settings_file.path());
        return Ok(Settings::default());
    }
    settings_file
        .read_json::<Settings>()
        .await
        .with_context(|| format!("unable to read settings file {:?}", settings_file.path()))
}

async fn deploy_from_cli(
    cli_args: &HashMap<String, String>,
    options: &AppOptions,
) -> anyhow::Result<bool> {
    let repository = cli_args
        .get("repository")
        .map(PathBuf::from)
        .context("--deploy needs --repository=<path>")?;

    let jobs = match (cli_args.get("old"), cli_args.get("new"), cli_args.get("ref")) {
        (Some(old), Some(new), Some(reference)) => {
            vec![DeploymentJob::new(&repository, old, new, reference)?]
        }
        _ => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            let lines: Vec<String> = input.lines().map(str::to_string).collect();
            parse_requests(&repository, &lines)?
                .into_iter()
                .map(|r| r.into_job())
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    let mut all_ok = true;
    for job in jobs {
        match deploy_once(options, &job).await {
            Ok(DeployOutcome::Deployed { release_id }) => {
                info!("Release {} deployed", release_id);
            }
            Ok(DeployOutcome::Skipped) => {}
            Err(e) => {
                error!("Deploy failed: {}", e);
                all_ok = false;
            }
        }
    }
    Ok(all_ok)
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                _ => {
                    error!("Unable to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
