use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct CameraConfig {
    pub name: String,
    pub path: String, // e.g., /dev/video0
    pub config: Value, // the whole camera entry, fed to the camera settings
    pub stream_config: Option<Value>,
}

impl CameraConfig {
    /// Integer field of the raw camera entry, e.g. `width`.
    pub fn video_mode_field(&self, field: &str) -> Option<i64> {
        self.config.get(field).and_then(Value::as_i64)
    }
}

/// A virtual camera whose source is picked through a network table key.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchedCameraConfig {
    pub name: String,
    pub key: String,
}
