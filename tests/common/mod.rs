#![allow(dead_code)]

use opencv::core::{Mat, Rect, Scalar, CV_8UC3};
use opencv::imgproc;
use rvision::app_config::ApplicationConfig;
use rvision::camera::capture_device::{CaptureDevice, DeviceOpener};
use rvision::errors::AppError;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const FRAME_WIDTH: i32 = 160;
pub const FRAME_HEIGHT: i32 = 120;

/// A 160x120 black frame with an orange block covering the sample pixel.
pub fn orange_scene() -> Mat {
    let mut frame =
        Mat::new_rows_cols_with_default(FRAME_HEIGHT, FRAME_WIDTH, CV_8UC3, Scalar::all(0.0)).unwrap();
    imgproc::rectangle(
        &mut frame,
        Rect::new(60, 40, 40, 30),
        Scalar::new(0.0, 128.0, 255.0, 0.0),
        -1,
        imgproc::LINE_8,
        0,
    )
    .unwrap();
    frame
}

/// Settings with OS-assigned stream ports so tests can run side by side.
pub fn test_settings() -> ApplicationConfig {
    ApplicationConfig {
        stream_base_port: 0,
        ..ApplicationConfig::default()
    }
}

#[derive(Default, Clone)]
pub struct FakeOpener {
    pub opened: Arc<Mutex<Vec<String>>>,
    pub properties: Arc<Mutex<Vec<(String, i32, f64)>>>,
    pub unplugged: Vec<String>,
}

impl FakeOpener {
    pub fn with_unplugged(paths: &[&str]) -> Self {
        FakeOpener {
            unplugged: paths.iter().map(|p| p.to_string()).collect(),
            ..FakeOpener::default()
        }
    }

    pub fn opened_paths(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl DeviceOpener for FakeOpener {
    fn open(&self, path: &str) -> Result<Box<dyn CaptureDevice>, AppError> {
        self.opened.lock().unwrap().push(path.to_string());
        if self.unplugged.iter().any(|p| p == path) {
            return Err(AppError::Camera(format!("no such device {}", path)));
        }
        Ok(Box::new(FakeDevice {
            path: path.to_string(),
            properties: self.properties.clone(),
        }))
    }
}

struct FakeDevice {
    path: String,
    properties: Arc<Mutex<Vec<(String, i32, f64)>>>,
}

impl CaptureDevice for FakeDevice {
    fn set_property(&mut self, property: i32, value: f64) -> Result<bool, AppError> {
        self.properties.lock().unwrap().push((self.path.clone(), property, value));
        Ok(true)
    }

    fn read(&mut self, frame: &mut Mat) -> Result<bool, AppError> {
        thread::sleep(Duration::from_millis(5));
        *frame = orange_scene();
        Ok(true)
    }
}
