use anyhow::{Context, Result};
use log::{error, info};
use rvision::camera::capture_device::OpenCvOpener;
use rvision::cli;
use rvision::common::logging_setup;
use rvision::config_loader;
use rvision::nt::NetworkTableInstance;
use rvision::operations;
use std::sync::Arc;
use std::time::Instant;

#[tokio::main]
async fn main() -> Result<()> {
    let main_start_time = Instant::now();
    let matches = cli::build_cli().get_matches();

    let settings_path = matches.get_one::<String>("settings").map(|s| s.as_str());
    let settings = match config_loader::load_app_settings(settings_path) {
        Ok(settings) => {
            logging_setup::initialize_logging(Some(&settings), &matches);
            settings
        }
        Err(e) => {
            logging_setup::initialize_logging(None, &matches);
            error!("❌ Failed to load application settings: {}. Exiting.", e);
            return Err(e).context("Failed to load application settings");
        }
    };

    let config_path = matches
        .get_one::<String>("config")
        .map(|s| s.as_str())
        .unwrap_or(config_loader::DEFAULT_CONFIG_PATH);

    let nt = NetworkTableInstance::new();
    let program = operations::start_program(config_path, &settings, &nt, Arc::new(OpenCvOpener))
        .await
        .with_context(|| format!("Failed to start from '{}'", config_path))?;
    info!("✅ Startup complete in {:?}.", main_start_time.elapsed());

    let result = operations::run_object_detection(&program.camera_server, &nt, &program.config, &settings).await;
    if let Err(e) = &result {
        error!("❌ Object detection stopped after {:?}: {}", main_start_time.elapsed(), e);
    }
    result.context("Object detection failed")
}
