use crate::camera::frame::FrameSlot;
use crate::common::timestamp_utils;
use crate::core::video_source::VideoSource;
use log::{debug, warn};
use opencv::core::Mat;
use opencv::prelude::*;
use std::sync::Mutex;

/// A source fed by user code, e.g. the processed output of the vision loop.
pub struct CvSource {
    name: String,
    width: i32,
    height: i32,
    slot: FrameSlot,
    last_error: Mutex<Option<String>>,
}

impl CvSource {
    pub fn new(name: &str, width: i32, height: i32) -> Self {
        CvSource {
            name: name.to_string(),
            width,
            height,
            slot: FrameSlot::new(),
            last_error: Mutex::new(None),
        }
    }

    pub fn put_frame(&self, image: Mat) {
        if image.cols() != self.width || image.rows() != self.height {
            debug!(
                "Source '{}' got a {}x{} frame for a {}x{} stream",
                self.name,
                image.cols(),
                image.rows(),
                self.width,
                self.height
            );
        }
        self.slot.publish(image, timestamp_utils::frame_time_micros());
        *self.last_error.lock().unwrap_or_else(|p| p.into_inner()) = None;
    }

    /// Reports a frame failure to the stream's viewers.
    /// Repeats of the same message are not logged again.
    pub fn notify_error(&self, message: &str) {
        let mut last = self.last_error.lock().unwrap_or_else(|p| p.into_inner());
        if last.as_deref() != Some(message) {
            warn!("⚠️ Stream '{}': {}", self.name, message);
            *last = Some(message.to_string());
        }
        self.slot.set_error(message);
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl VideoSource for CvSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        "cv:".to_string()
    }

    fn frames(&self) -> Option<FrameSlot> {
        Some(self.slot.clone())
    }
}
