use crate::camera::switched_camera::SwitchedCamera;
use crate::camera::usb_camera::{ConnectionStrategy, UsbCamera};
use crate::camera_config::{CameraConfig, SwitchedCameraConfig};
use crate::core::camera_server::CameraServer;
use crate::core::video_source::VideoSource;
use crate::errors::AppError;
use crate::nt::{NetworkTableInstance, NotifyFlags, Value};
use log::{debug, info};
use std::sync::Arc;
use std::time::Instant;

pub async fn start_camera(server: &CameraServer, config: &CameraConfig) -> Result<Arc<UsbCamera>, AppError> {
    info!("Starting camera '{}' on {}", config.name, config.path);
    let start_time = Instant::now();

    let camera = server.open_usb_camera(&config.name, &config.path);
    let stream = server.start_automatic_capture(camera.clone()).await?;

    camera.set_config_json(&config.config);
    camera.set_connection_strategy(ConnectionStrategy::KeepOpen);

    if let Some(stream_config) = &config.stream_config {
        stream.set_config_json(stream_config);
    }
    debug!("Camera '{}' started in {:?}", config.name, start_time.elapsed());
    Ok(camera)
}

pub async fn start_cameras(server: &CameraServer, configs: &[CameraConfig]) -> Result<Vec<Arc<UsbCamera>>, AppError> {
    let mut cameras = Vec::with_capacity(configs.len());
    for config in configs {
        cameras.push(start_camera(server, config).await?);
    }
    Ok(cameras)
}

/// Index of the camera a selector value picks.
///
/// Numbers are truncated toward zero and must be in range; strings must
/// equal a camera name. Anything else selects nothing.
pub fn select_camera(value: &Value, cameras: &[Arc<UsbCamera>]) -> Option<usize> {
    match value {
        Value::Double(v) => {
            if v.is_nan() {
                return None;
            }
            let index = v.trunc();
            if index >= 0.0 && index < cameras.len() as f64 {
                Some(index as usize)
            } else {
                None
            }
        }
        Value::String(name) => cameras.iter().position(|c| c.name() == name),
        _ => None,
    }
}

pub async fn start_switched_camera(
    server: &CameraServer,
    nt: &NetworkTableInstance,
    config: &SwitchedCameraConfig,
    cameras: Arc<Vec<Arc<UsbCamera>>>,
) -> Result<Arc<SwitchedCamera>, AppError> {
    info!("Starting switched camera '{}' on {}", config.name, config.key);
    let (switched, _stream) = server.add_switched_camera(&config.name).await?;

    let target = switched.clone();
    nt.get_entry(&config.key).add_listener(
        move |notification| match select_camera(&notification.value, &cameras) {
            Some(index) => target.set_source(cameras[index].clone()),
            None => debug!(
                "Switched camera '{}': no camera for {:?}",
                target.name(),
                notification.value
            ),
        },
        NotifyFlags::IMMEDIATE | NotifyFlags::NEW | NotifyFlags::UPDATE,
    );
    Ok(switched)
}
