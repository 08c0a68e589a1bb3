use crate::app_config::ApplicationConfig;
use crate::camera::capture_device::DeviceOpener;
use crate::camera::switched_camera::SwitchedCamera;
use crate::camera::usb_camera::UsbCamera;
use crate::config_loader::{self, FrcConfig};
use crate::core::camera_server::CameraServer;
use crate::errors::AppError;
use crate::nt::NetworkTableInstance;
use crate::operations::camera_startup_op::{start_cameras, start_switched_camera};
use log::{debug, info};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Everything started before the processing loop takes over.
pub struct VisionProgram {
    pub config: FrcConfig,
    pub camera_server: CameraServer,
    pub cameras: Arc<Vec<Arc<UsbCamera>>>,
    pub switched_cameras: Vec<Arc<SwitchedCamera>>,
    /// Bound address when running as the network table server.
    pub nt_server_addr: Option<SocketAddr>,
}

/// Reads the camera file, then brings up network tables, cameras and
/// switched cameras in that order. A bad config file stops before any
/// device is opened.
pub async fn start_program(
    config_path: &str,
    settings: &ApplicationConfig,
    nt: &NetworkTableInstance,
    opener: Arc<dyn DeviceOpener>,
) -> Result<VisionProgram, AppError> {
    let start_time = Instant::now();
    let config = config_loader::load_config(config_path)?;
    info!(
        "🚀 rvision starting with {} camera(s) and {} switched camera(s).",
        config.cameras.len(),
        config.switched_cameras.len()
    );

    let nt_server_addr = if config.server {
        info!("Setting up NetworkTables server");
        let addr = nt.start_server(&settings.nt_server_bind, settings.nt_port).await?;
        Some(addr)
    } else {
        info!("Setting up NetworkTables client for team {}", config.team);
        let servers = nt.start_client_team(config.team, settings);
        nt.start_ds_client(servers, config.team, settings);
        None
    };

    let camera_server = CameraServer::new(settings, nt.clone(), opener);
    let cameras = Arc::new(start_cameras(&camera_server, &config.cameras).await?);
    let mut switched_cameras = Vec::with_capacity(config.switched_cameras.len());
    for switched in &config.switched_cameras {
        switched_cameras.push(start_switched_camera(&camera_server, nt, switched, cameras.clone()).await?);
    }
    debug!("✅ Startup finished in {:?}.", start_time.elapsed());

    Ok(VisionProgram {
        config,
        camera_server,
        cameras,
        switched_cameras,
        nt_server_addr,
    })
}
