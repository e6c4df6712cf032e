//! Storage setup and default settings

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{error, info};

use crate::errors::AgentError;
use crate::logs::{init_logging, LogOptions};
use crate::store::model::ModelDocument;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::utils::version_info;

/// Run the installation process
pub async fn install(cli_args: &HashMap<String, String>) -> Result<(), AgentError> {
    match install_impl(cli_args).await {
        Ok(layout) => {
            info!("Installation successful");
            println!("\n[SUCCESS] pushdeploy installed at {:?}", layout.base_dir);
            println!("Start the service with: systemctl start pushdeploy");
            Ok(())
        }
        Err(e) => {
            error!("Installation failed: {:?}", e);
            eprintln!("\n[ERROR] Installation failed: {}", e);
            Err(e)
        }
    }
}

async fn install_impl(cli_args: &HashMap<String, String>) -> Result<StorageLayout, AgentError> {
    // Initialize temporary logging
    let log_options = LogOptions {
        stdout: true,
        ..Default::default()
    };
    let _guard = init_logging(log_options);

    println!("pushdeploy installer");
    println!("====================");
    println!();

    let layout = cli_args
        .get("home")
        .map(|home| StorageLayout::new(PathBuf::from(home)))
        .unwrap_or_default();
    println!("Setting up storage at: {:?}", layout.base_dir);
    layout.setup().await?;

    let settings_file = layout.settings_file();
    let force = cli_args.contains_key("force");
    if settings_file.exists().await && !force {
        println!("Keeping existing settings: {:?}", settings_file.path());
    } else {
        let settings = settings_from_args(cli_args)?;
        settings_file.write_json(&settings).await?;
        println!("Settings saved to: {:?}", settings_file.path());
    }

    let models_file = layout.models_file();
    if !models_file.exists().await {
        models_file.write_json(&ModelDocument::default()).await?;
        println!("Created empty model store: {:?}", models_file.path());
    }

    // Print version info
    let version = version_info();
    println!();
    println!("Agent version: {}", version.version);
    println!("Git hash: {}", version.git_hash);
    println!("Build time: {}", version.build_time);

    Ok(layout)
}

/// Default settings with `--host`, `--port` and `--deploys` applied
pub fn settings_from_args(cli_args: &HashMap<String, String>) -> Result<Settings, AgentError> {
    let mut settings = Settings::default();

    if let Some(host) = cli_args.get("host") {
        settings.server.host = host.clone();
    }
    if let Some(port) = cli_args.get("port") {
        settings.server.port = port
            .parse()
            .map_err(|_| AgentError::ConfigError(format!("invalid port: {}", port)))?;
    }
    if let Some(deploys) = cli_args.get("deploys") {
        settings.deploys_root = Some(PathBuf::from(deploys));
    }

    Ok(settings)
}
