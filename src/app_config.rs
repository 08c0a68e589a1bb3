use serde::Deserialize;

/// Process-wide settings that are not part of the camera JSON file.
///
/// Loaded from an optional YAML file; every field falls back to the value
/// in [`ApplicationConfig::default`].
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApplicationConfig {
    pub log_level: Option<String>, // CLI --debug takes precedence
    pub stream_base_port: u16, // 0 = let the OS pick a port for every stream server
    pub stream_host: String,
    pub default_stream_compression: i32, // JPEG quality (0-100)
    pub frame_timeout_ms: u64,
    pub output_stream_name: String,
    pub vision_table: String,
    pub nt_port: u16,
    pub nt_server_bind: String,
    pub ds_port: u16,
    pub nt_reconnect_interval_ms: u64,
    pub pipeline: PipelineSettings,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        ApplicationConfig {
            log_level: Some("info".to_string()),
            stream_base_port: 1181,
            stream_host: "localhost".to_string(),
            default_stream_compression: 80,
            frame_timeout_ms: 225,
            output_stream_name: "Processed".to_string(),
            vision_table: "Vision".to_string(),
            nt_port: 1735,
            nt_server_bind: "0.0.0.0".to_string(),
            ds_port: 1742,
            nt_reconnect_interval_ms: 1000,
            pipeline: PipelineSettings::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    pub hsv_lower: [f64; 3],
    pub hsv_upper: [f64; 3],
    pub kernel_size: i32,
    pub erode_iterations: i32,
    pub contour_color_bgr: [f64; 3],
    pub contour_thickness: i32,
    pub sample_row: i32,
    pub sample_col: i32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            hsv_lower: [0.0, 96.0, 112.0],
            hsv_upper: [35.0, 255.0, 255.0],
            kernel_size: 3,
            erode_iterations: 1,
            contour_color_bgr: [0.0, 255.0, 0.0],
            contour_thickness: 2,
            sample_row: 60,
            sample_col: 80,
        }
    }
}
