use crate::camera::frame::FrameSlot;
use crate::core::video_source::VideoSource;
use log::info;
use std::sync::{Arc, RwLock};

/// A virtual feed that forwards whichever source is currently selected.
pub struct SwitchedCamera {
    name: String,
    selected: RwLock<Option<Arc<dyn VideoSource>>>,
}

impl SwitchedCamera {
    pub fn new(name: &str) -> Self {
        SwitchedCamera {
            name: name.to_string(),
            selected: RwLock::new(None),
        }
    }

    pub fn set_source(&self, source: Arc<dyn VideoSource>) {
        info!("🔀 Switched camera '{}' now showing '{}'", self.name, source.name());
        *self.selected.write().unwrap_or_else(|p| p.into_inner()) = Some(source);
    }

    pub fn source_name(&self) -> Option<String> {
        self.selected
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .map(|s| s.name().to_string())
    }
}

impl VideoSource for SwitchedCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        "switched:".to_string()
    }

    fn frames(&self) -> Option<FrameSlot> {
        self.selected
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .and_then(|s| s.frames())
    }
}
