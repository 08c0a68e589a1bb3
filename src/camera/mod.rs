pub mod camera_settings;
pub mod capture_device;
pub mod cv_sink;
pub mod cv_source;
pub mod frame;
pub mod mjpeg_server;
pub mod switched_camera;
pub mod usb_camera;

pub use crate::camera_config::{CameraConfig, SwitchedCameraConfig};
