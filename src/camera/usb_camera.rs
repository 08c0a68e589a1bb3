use crate::camera::camera_settings::CameraSettings;
use crate::camera::capture_device::{CaptureDevice, DeviceOpener};
use crate::camera::frame::FrameSlot;
use crate::common::timestamp_utils;
use crate::core::video_source::VideoSource;
use log::{debug, error, info, warn};
use opencv::core::Mat;
use opencv::prelude::*;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const IDLE_POLL: Duration = Duration::from_millis(50);
const READ_RETRY: Duration = Duration::from_millis(10);

/// When the capture thread actually pulls frames from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionStrategy {
    /// Only while something is watching.
    AutoManage = 0,
    KeepOpen = 1,
}

impl ConnectionStrategy {
    fn from_u8(v: u8) -> ConnectionStrategy {
        match v {
            1 => ConnectionStrategy::KeepOpen,
            _ => ConnectionStrategy::AutoManage,
        }
    }
}

type SharedDevice = Arc<Mutex<Box<dyn CaptureDevice>>>;

pub struct UsbCamera {
    name: String,
    path: String,
    slot: FrameSlot,
    device: Option<SharedDevice>,
    strategy: Arc<AtomicU8>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl UsbCamera {
    /// Opens the device at `path` and starts its capture thread.
    ///
    /// An unopenable device still yields a camera; it never produces frames
    /// and its sinks report the open error.
    pub fn open(name: &str, path: &str, opener: &dyn DeviceOpener) -> UsbCamera {
        let slot = FrameSlot::new();
        let strategy = Arc::new(AtomicU8::new(ConnectionStrategy::AutoManage as u8));
        let running = Arc::new(AtomicBool::new(true));

        let device = match opener.open(path) {
            Ok(device) => Some(Arc::new(Mutex::new(device))),
            Err(e) => {
                error!("❌ Camera '{}': could not open {}: {}", name, path, e);
                slot.set_error(&format!("could not open {}: {}", path, e));
                None
            }
        };

        let worker = device.as_ref().and_then(|device| {
            let ctx = CaptureLoop {
                name: name.to_string(),
                device: device.clone(),
                slot: slot.clone(),
                strategy: strategy.clone(),
                running: running.clone(),
            };
            match thread::Builder::new()
                .name(format!("capture-{}", name))
                .spawn(move || ctx.run())
            {
                Ok(handle) => Some(handle),
                Err(e) => {
                    error!("❌ Camera '{}': could not spawn capture thread: {}", name, e);
                    None
                }
            }
        });

        UsbCamera {
            name: name.to_string(),
            path: path.to_string(),
            slot,
            device,
            strategy,
            running,
            worker: Mutex::new(worker),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.device.is_some()
    }

    pub fn set_connection_strategy(&self, strategy: ConnectionStrategy) {
        debug!("Camera '{}': connection strategy {:?}", self.name, strategy);
        self.strategy.store(strategy as u8, Ordering::Relaxed);
    }

    pub fn connection_strategy(&self) -> ConnectionStrategy {
        ConnectionStrategy::from_u8(self.strategy.load(Ordering::Relaxed))
    }

    /// Applies a camera JSON entry (video mode, exposure, properties).
    pub fn set_config_json(&self, config: &Value) -> CameraSettings {
        let settings = CameraSettings::from_json(&self.name, config);
        match &self.device {
            Some(device) => {
                let mut device = device.lock().unwrap_or_else(|p| p.into_inner());
                settings.apply(&self.name, &mut **device);
                info!("⚙️ Camera '{}' configured: {:?}", self.name, settings);
            }
            None => warn!("Camera '{}' has no open device; settings not applied", self.name),
        }
        settings
    }
}

impl VideoSource for UsbCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!("usb:{}", self.path)
    }

    fn frames(&self) -> Option<FrameSlot> {
        Some(self.slot.clone())
    }
}

impl Drop for UsbCamera {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        let worker = self.worker.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(handle) = worker {
            if handle.join().is_err() {
                error!("Capture thread for '{}' panicked", self.name);
            }
        }
    }
}

struct CaptureLoop {
    name: String,
    device: SharedDevice,
    slot: FrameSlot,
    strategy: Arc<AtomicU8>,
    running: Arc<AtomicBool>,
}

impl CaptureLoop {
    fn active(&self) -> bool {
        match ConnectionStrategy::from_u8(self.strategy.load(Ordering::Relaxed)) {
            ConnectionStrategy::KeepOpen => true,
            ConnectionStrategy::AutoManage => self.slot.consumer_count() > 0,
        }
    }

    fn run(self) {
        debug!("Capture thread for '{}' started", self.name);
        let mut frame = Mat::default();
        let mut last_error: Option<String> = None;

        while self.running.load(Ordering::Relaxed) {
            if !self.active() {
                thread::sleep(IDLE_POLL);
                continue;
            }

            let result = {
                let mut device = self.device.lock().unwrap_or_else(|p| p.into_inner());
                device.read(&mut frame)
            };
            let failure = match result {
                Ok(true) if !frame.empty() => {
                    let time = timestamp_utils::frame_time_micros();
                    self.slot.publish(std::mem::take(&mut frame), time);
                    last_error = None;
                    continue;
                }
                Ok(_) => "device returned no frame".to_string(),
                Err(e) => e.to_string(),
            };
            if last_error.as_deref() != Some(failure.as_str()) {
                warn!("⚠️ Camera '{}': {}", self.name, failure);
            }
            self.slot.set_error(&failure);
            last_error = Some(failure);
            thread::sleep(READ_RETRY);
        }
        debug!("Capture thread for '{}' stopped", self.name);
    }
}
