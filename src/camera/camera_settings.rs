//! Camera video mode and control settings, read from a camera's JSON entry.
//!
//! Recognised fields:
//! `pixel format`, `width`, `height`, `fps`, `brightness`, `white balance`,
//! `exposure` and a `properties` list of `{name, value}` pairs. Anything
//! malformed is logged and skipped; the camera still starts.

use crate::camera::capture_device::CaptureDevice;
use log::{debug, warn};
use opencv::videoio;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Mjpeg,
    Yuyv,
    Rgb565,
    Bgr,
    Gray,
    Y16,
    Uyvy,
}

impl PixelFormat {
    pub fn parse(s: &str) -> Option<PixelFormat> {
        match s.to_lowercase().as_str() {
            "mjpeg" | "mjpg" => Some(PixelFormat::Mjpeg),
            "yuyv" => Some(PixelFormat::Yuyv),
            "rgb565" => Some(PixelFormat::Rgb565),
            "bgr" => Some(PixelFormat::Bgr),
            "gray" | "grey" => Some(PixelFormat::Gray),
            "y16" => Some(PixelFormat::Y16),
            "uyvy" => Some(PixelFormat::Uyvy),
            _ => None,
        }
    }

    pub fn fourcc(self) -> i32 {
        let code: &[u8; 4] = match self {
            PixelFormat::Mjpeg => b"MJPG",
            PixelFormat::Yuyv => b"YUYV",
            PixelFormat::Rgb565 => b"RGBP",
            PixelFormat::Bgr => b"BGR3",
            PixelFormat::Gray => b"GREY",
            PixelFormat::Y16 => b"Y16 ",
            PixelFormat::Uyvy => b"UYVY",
        };
        i32::from_le_bytes(*code)
    }
}

/// `"auto"`, `"hold"` or a manual value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AutoSetting {
    Auto,
    Hold,
    Manual(f64),
}

impl AutoSetting {
    fn parse(value: &Value) -> Option<AutoSetting> {
        match value {
            Value::String(s) => match s.to_lowercase().as_str() {
                "auto" => Some(AutoSetting::Auto),
                "hold" => Some(AutoSetting::Hold),
                other => other.parse::<f64>().ok().map(AutoSetting::Manual),
            },
            Value::Number(n) => n.as_f64().map(AutoSetting::Manual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CameraSettings {
    pub pixel_format: Option<PixelFormat>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
    pub brightness: Option<u32>,
    pub white_balance: Option<AutoSetting>,
    pub exposure: Option<AutoSetting>,
    pub properties: Vec<(String, f64)>,
}

// V4L2 exposure modes as exposed through CAP_PROP_AUTO_EXPOSURE.
const V4L2_EXPOSURE_MANUAL: f64 = 1.0;
const V4L2_EXPOSURE_APERTURE_PRIORITY: f64 = 3.0;

fn property_id(name: &str) -> Option<i32> {
    let id = match name {
        "brightness" => videoio::CAP_PROP_BRIGHTNESS,
        "contrast" => videoio::CAP_PROP_CONTRAST,
        "saturation" => videoio::CAP_PROP_SATURATION,
        "hue" => videoio::CAP_PROP_HUE,
        "gain" => videoio::CAP_PROP_GAIN,
        "sharpness" => videoio::CAP_PROP_SHARPNESS,
        "gamma" => videoio::CAP_PROP_GAMMA,
        "white_balance_temperature_auto" => videoio::CAP_PROP_AUTO_WB,
        "white_balance_temperature" => videoio::CAP_PROP_WB_TEMPERATURE,
        "exposure_auto" => videoio::CAP_PROP_AUTO_EXPOSURE,
        "exposure_absolute" => videoio::CAP_PROP_EXPOSURE,
        "focus_auto" => videoio::CAP_PROP_AUTOFOCUS,
        "focus_absolute" => videoio::CAP_PROP_FOCUS,
        "zoom_absolute" => videoio::CAP_PROP_ZOOM,
        "pan_absolute" => videoio::CAP_PROP_PAN,
        "tilt_absolute" => videoio::CAP_PROP_TILT,
        "backlight_compensation" => videoio::CAP_PROP_BACKLIGHT,
        _ => return None,
    };
    Some(id)
}

fn unsigned_field(camera: &str, entry: &Value, field: &str) -> Option<u32> {
    let raw = entry.get(field)?;
    match raw.as_u64().and_then(|v| u32::try_from(v).ok()) {
        Some(v) => Some(v),
        None => {
            warn!("camera '{}': ignoring {} value {}", camera, field, raw);
            None
        }
    }
}

impl CameraSettings {
    pub fn from_json(camera: &str, entry: &Value) -> CameraSettings {
        let mut settings = CameraSettings::default();

        if let Some(raw) = entry.get("pixel format") {
            settings.pixel_format = raw.as_str().and_then(PixelFormat::parse);
            if settings.pixel_format.is_none() {
                warn!("camera '{}': unknown pixel format {}", camera, raw);
            }
        }
        settings.width = unsigned_field(camera, entry, "width");
        settings.height = unsigned_field(camera, entry, "height");
        settings.fps = unsigned_field(camera, entry, "fps");
        settings.brightness = unsigned_field(camera, entry, "brightness").filter(|b| {
            let ok = *b <= 100;
            if !ok {
                warn!("camera '{}': brightness {} is not a percentage", camera, b);
            }
            ok
        });

        for (field, slot) in [
            ("white balance", &mut settings.white_balance),
            ("exposure", &mut settings.exposure),
        ] {
            if let Some(raw) = entry.get(field) {
                *slot = AutoSetting::parse(raw);
                if slot.is_none() {
                    warn!("camera '{}': could not understand {} value {}", camera, field, raw);
                }
            }
        }

        if let Some(props) = entry.get("properties").and_then(Value::as_array) {
            for prop in props {
                let name = prop.get("name").and_then(Value::as_str);
                let value = prop.get("value").and_then(|v| match v {
                    Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                    other => other.as_f64(),
                });
                match (name, value) {
                    (Some(name), Some(value)) => settings.properties.push((name.to_string(), value)),
                    _ => warn!("camera '{}': ignoring property {}", camera, prop),
                }
            }
        }
        settings
    }

    /// OpenCV capture properties in the order they should be applied.
    /// Video mode first, since drivers may reset controls on a mode change.
    pub fn to_capture_properties(&self, camera: &str) -> Vec<(i32, f64)> {
        let mut out = Vec::new();
        if let Some(format) = self.pixel_format {
            out.push((videoio::CAP_PROP_FOURCC, format.fourcc() as f64));
        }
        if let Some(w) = self.width {
            out.push((videoio::CAP_PROP_FRAME_WIDTH, w as f64));
        }
        if let Some(h) = self.height {
            out.push((videoio::CAP_PROP_FRAME_HEIGHT, h as f64));
        }
        if let Some(fps) = self.fps {
            out.push((videoio::CAP_PROP_FPS, fps as f64));
        }
        if let Some(b) = self.brightness {
            out.push((videoio::CAP_PROP_BRIGHTNESS, b as f64));
        }
        match self.white_balance {
            Some(AutoSetting::Auto) => out.push((videoio::CAP_PROP_AUTO_WB, 1.0)),
            Some(AutoSetting::Hold) => out.push((videoio::CAP_PROP_AUTO_WB, 0.0)),
            Some(AutoSetting::Manual(v)) => {
                out.push((videoio::CAP_PROP_AUTO_WB, 0.0));
                out.push((videoio::CAP_PROP_WB_TEMPERATURE, v));
            }
            None => {}
        }
        match self.exposure {
            Some(AutoSetting::Auto) => out.push((videoio::CAP_PROP_AUTO_EXPOSURE, V4L2_EXPOSURE_APERTURE_PRIORITY)),
            Some(AutoSetting::Hold) => out.push((videoio::CAP_PROP_AUTO_EXPOSURE, V4L2_EXPOSURE_MANUAL)),
            Some(AutoSetting::Manual(v)) => {
                out.push((videoio::CAP_PROP_AUTO_EXPOSURE, V4L2_EXPOSURE_MANUAL));
                out.push((videoio::CAP_PROP_EXPOSURE, v));
            }
            None => {}
        }
        for (name, value) in &self.properties {
            match property_id(name) {
                Some(id) => out.push((id, *value)),
                None => warn!("camera '{}': unknown property '{}'", camera, name),
            }
        }
        out
    }

    pub fn apply(&self, camera: &str, device: &mut dyn CaptureDevice) {
        for (property, value) in self.to_capture_properties(camera) {
            match device.set_property(property, value) {
                Ok(true) => debug!("camera '{}': property {} = {}", camera, property, value),
                Ok(false) => warn!("camera '{}': device rejected property {} = {}", camera, property, value),
                Err(e) => warn!("camera '{}': setting property {} failed: {}", camera, property, e),
            }
        }
    }
}
