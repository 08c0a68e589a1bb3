use crate::app_config::ApplicationConfig;
use crate::camera_config::{CameraConfig, SwitchedCameraConfig};
use crate::errors::AppError;
use log::{debug, error, info};
use serde_json::{Map, Value};
use std::fs;
use std::time::Instant;

/// Default location of the camera definition file written by the Pi image web UI.
pub const DEFAULT_CONFIG_PATH: &str = "/boot/frc.json";

#[derive(Debug, Clone, PartialEq)]
pub struct FrcConfig {
    pub team: u32,
    pub server: bool,
    pub cameras: Vec<CameraConfig>,
    pub switched_cameras: Vec<SwitchedCameraConfig>,
}

fn parse_error(path: &str, msg: &str) -> AppError {
    let full = format!("config error in '{}': {}", path, msg);
    error!("{}", full);
    AppError::Config(full)
}

pub fn load_config(path: &str) -> Result<FrcConfig, AppError> {
    debug!("📄 Attempting to load camera config from: {}", path);
    let start_time = Instant::now();

    let config_str = fs::read_to_string(path).map_err(|e| {
        let msg = format!("could not open '{}': {}", path, e);
        error!("{}", msg);
        AppError::Config(msg)
    })?;

    let json: Value = serde_json::from_str(&config_str)
        .map_err(|e| parse_error(path, &format!("invalid JSON: {}", e)))?;
    let config = read_config(path, &json)?;

    info!(
        "✅ Loaded {} camera(s) and {} switched camera(s) from '{}' in {:?}",
        config.cameras.len(),
        config.switched_cameras.len(),
        path,
        start_time.elapsed()
    );
    Ok(config)
}

/// Extracts the configuration from an already-parsed document.
/// `path` is only used for diagnostics.
pub fn read_config(path: &str, json: &Value) -> Result<FrcConfig, AppError> {
    let obj = json
        .as_object()
        .ok_or_else(|| parse_error(path, "must be JSON object"))?;

    let team = obj
        .get("team")
        .and_then(Value::as_u64)
        .and_then(|t| u32::try_from(t).ok())
        .ok_or_else(|| parse_error(path, "could not read team number"))?;

    let mut server = false;
    if let Some(mode) = obj.get("ntmode") {
        match mode.as_str().map(str::to_lowercase).as_deref() {
            Some("client") => server = false,
            Some("server") => server = true,
            _ => {
                // Reported, but the client default stands.
                let shown = mode.as_str().map(str::to_string).unwrap_or_else(|| mode.to_string());
                parse_error(path, &format!("could not understand ntmode value '{}'", shown));
            }
        }
    }

    let camera_entries = obj
        .get("cameras")
        .and_then(Value::as_array)
        .ok_or_else(|| parse_error(path, "could not read cameras"))?;
    let mut cameras = Vec::with_capacity(camera_entries.len());
    for entry in camera_entries {
        cameras.push(read_camera_config(path, entry)?);
    }

    let mut switched_cameras = Vec::new();
    if let Some(switched) = obj.get("switched cameras") {
        let entries = switched
            .as_array()
            .ok_or_else(|| parse_error(path, "could not read switched cameras"))?;
        for entry in entries {
            switched_cameras.push(read_switched_camera_config(path, entry)?);
        }
    }

    Ok(FrcConfig {
        team,
        server,
        cameras,
        switched_cameras,
    })
}

fn string_field(entry: Option<&Map<String, Value>>, field: &str) -> Option<String> {
    entry
        .and_then(|o| o.get(field))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn read_camera_config(path: &str, entry: &Value) -> Result<CameraConfig, AppError> {
    let obj = entry.as_object();
    let name = string_field(obj, "name").ok_or_else(|| parse_error(path, "could not read camera name"))?;
    let cam_path = string_field(obj, "path")
        .ok_or_else(|| parse_error(path, &format!("camera '{}': could not read path", name)))?;
    debug!("  Read camera '{}' at {}", name, cam_path);

    Ok(CameraConfig {
        name,
        path: cam_path,
        stream_config: obj.and_then(|o| o.get("stream")).cloned(),
        config: entry.clone(),
    })
}

fn read_switched_camera_config(path: &str, entry: &Value) -> Result<SwitchedCameraConfig, AppError> {
    let obj = entry.as_object();
    let name =
        string_field(obj, "name").ok_or_else(|| parse_error(path, "could not read switched camera name"))?;
    let key = string_field(obj, "key")
        .ok_or_else(|| parse_error(path, &format!("switched camera '{}': could not read key", name)))?;
    debug!("  Read switched camera '{}' keyed on '{}'", name, key);
    Ok(SwitchedCameraConfig { name, key })
}

/// Loads the optional YAML application settings, or defaults when no path is given.
pub fn load_app_settings(path: Option<&str>) -> Result<ApplicationConfig, AppError> {
    let Some(path) = path else {
        return Ok(ApplicationConfig::default());
    };
    let settings_str = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("could not open settings '{}': {}", path, e)))?;
    serde_yaml::from_str(&settings_str)
        .map_err(|e| AppError::Config(format!("could not parse settings '{}': {}", path, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn read(json: Value) -> Result<FrcConfig, AppError> {
        read_config("test.json", &json)
    }

    fn err_text(json: Value) -> String {
        read(json).unwrap_err().to_string()
    }

    #[test]
    fn reads_full_config() {
        let cfg = read(json!({
            "team": 4904,
            "ntmode": "Server",
            "cameras": [
                {"name": "front", "path": "/dev/video0", "width": 160, "height": 120,
                 "stream": {"properties": [{"name": "compression", "value": 50}]}},
                {"name": "rear", "path": "/dev/video1"}
            ],
            "switched cameras": [{"name": "driver", "key": "/selector"}]
        }))
        .unwrap();

        assert_eq!(cfg.team, 4904);
        assert!(cfg.server);
        assert_eq!(cfg.cameras.len(), 2);
        assert_eq!(cfg.cameras[0].path, "/dev/video0");
        assert_eq!(cfg.cameras[0].video_mode_field("width"), Some(160));
        assert!(cfg.cameras[0].stream_config.is_some());
        assert!(cfg.cameras[1].stream_config.is_none());
        assert_eq!(cfg.switched_cameras[0].key, "/selector");
    }

    #[test]
    fn ntmode_defaults_to_client_and_bad_value_is_not_fatal() {
        let cfg = read(json!({"team": 1, "cameras": []})).unwrap();
        assert!(!cfg.server);
        let cfg = read(json!({"team": 1, "ntmode": "bogus", "cameras": []})).unwrap();
        assert!(!cfg.server);
    }

    #[test]
    fn top_level_must_be_object() {
        assert!(err_text(json!([1, 2])).contains("must be JSON object"));
    }

    #[test]
    fn missing_team_is_an_error() {
        let msg = err_text(json!({"cameras": []}));
        assert_eq!(msg, "config error in 'test.json': could not read team number");
    }

    #[test]
    fn missing_cameras_is_an_error() {
        assert!(err_text(json!({"team": 1})).contains("could not read cameras"));
    }

    #[test]
    fn camera_without_name_or_path() {
        assert!(err_text(json!({"team": 1, "cameras": [{"path": "/dev/video0"}]}))
            .contains("could not read camera name"));
        assert!(err_text(json!({"team": 1, "cameras": [{"name": "front"}]}))
            .contains("camera 'front': could not read path"));
    }

    #[test]
    fn switched_camera_without_name_or_key() {
        assert!(err_text(json!({"team": 1, "cameras": [], "switched cameras": [{"key": "k"}]}))
            .contains("could not read switched camera name"));
        assert!(err_text(json!({"team": 1, "cameras": [], "switched cameras": [{"name": "sw"}]}))
            .contains("switched camera 'sw': could not read key"));
    }
}
