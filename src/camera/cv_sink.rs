use crate::camera::frame::{ConsumerGuard, FrameSlot};
use crate::core::video_source::VideoSource;
use crate::errors::AppError;
use opencv::core::Mat;
use std::sync::Arc;
use std::time::Duration;

pub const TIMEOUT_ERROR: &str = "timed out getting frame";

/// Pulls frames from a source for processing in user code.
pub struct CvSink {
    source: Arc<dyn VideoSource>,
    timeout: Duration,
    last_sequence: u64,
    error: String,
    watching: Option<(FrameSlot, ConsumerGuard)>,
}

impl CvSink {
    pub fn new(source: Arc<dyn VideoSource>, timeout: Duration) -> Self {
        CvSink {
            source,
            timeout,
            last_sequence: 0,
            error: String::new(),
            watching: None,
        }
    }

    /// Waits for the next frame and stores it in `image`.
    /// Returns the frame time, or 0 on failure (see [`CvSink::get_error`]).
    pub fn grab_frame(&mut self, image: &mut Mat) -> Result<u64, AppError> {
        let Some(slot) = self.source.frames() else {
            self.error = format!("source '{}' has no frames", self.source.name());
            return Ok(0);
        };
        self.watch(&slot);

        match slot.wait_newer(self.last_sequence, self.timeout)? {
            Some(frame) => {
                self.last_sequence = frame.sequence;
                *image = frame.image;
                self.error.clear();
                Ok(frame.time)
            }
            None => {
                self.error = slot.last_error().unwrap_or_else(|| TIMEOUT_ERROR.to_string());
                Ok(0)
            }
        }
    }

    // Re-targets the consumer registration when a switched source changes slot.
    fn watch(&mut self, slot: &FrameSlot) {
        let same = matches!(&self.watching, Some((watched, _)) if watched.same_slot(slot));
        if !same {
            self.last_sequence = 0;
            self.watching = Some((slot.clone(), slot.acquire()));
        }
    }

    pub fn get_error(&self) -> &str {
        &self.error
    }
}
