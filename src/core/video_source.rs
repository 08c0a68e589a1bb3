use crate::camera::frame::FrameSlot;

/// Anything a stream server or sink can pull frames from.
pub trait VideoSource: Send + Sync {
    fn name(&self) -> &str;

    /// Published as the camera's `source` entry, e.g. `usb:/dev/video0`.
    fn description(&self) -> String;

    /// The slot currently feeding this source, if any.
    fn frames(&self) -> Option<FrameSlot>;
}
