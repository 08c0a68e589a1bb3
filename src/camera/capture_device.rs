use crate::errors::AppError;
use log::{debug, info};
use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio;

/// A physical frame producer, driven from its camera's capture thread.
pub trait CaptureDevice: Send {
    fn set_property(&mut self, property: i32, value: f64) -> Result<bool, AppError>;
    fn read(&mut self, frame: &mut Mat) -> Result<bool, AppError>;
}

/// Creates capture devices for device paths such as `/dev/video0`.
pub trait DeviceOpener: Send + Sync {
    fn open(&self, path: &str) -> Result<Box<dyn CaptureDevice>, AppError>;
}

pub struct OpenCvDevice {
    capture: videoio::VideoCapture,
}

impl CaptureDevice for OpenCvDevice {
    fn set_property(&mut self, property: i32, value: f64) -> Result<bool, AppError> {
        Ok(self.capture.set(property, value)?)
    }

    fn read(&mut self, frame: &mut Mat) -> Result<bool, AppError> {
        Ok(self.capture.read(frame)?)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OpenCvOpener;

impl DeviceOpener for OpenCvOpener {
    fn open(&self, path: &str) -> Result<Box<dyn CaptureDevice>, AppError> {
        debug!("Creating VideoCapture for {}", path);
        let capture = videoio::VideoCapture::from_file(path, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(AppError::Camera(format!("could not open capture device {}", path)));
        }
        info!("👍 Capture device {} opened", path);
        Ok(Box::new(OpenCvDevice { capture }))
    }
}
