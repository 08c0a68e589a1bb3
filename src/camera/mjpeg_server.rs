//! MJPEG-over-HTTP stream server, one per published source.
//!
//! Serves `/`, `/stream.mjpg` and `/?action=stream` as a multipart stream and
//! `/?action=snapshot` as a single JPEG. `resolution=WxH`, `fps=N` and
//! `compression=N` query parameters override the server settings per request.

use crate::camera::frame::{ConsumerGuard, FrameSlot};
use crate::core::video_source::VideoSource;
use crate::errors::AppError;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::stream;
use log::{debug, error, info, warn};
use opencv::core::{Mat, Size, Vector};
use opencv::prelude::*;
use opencv::{imgcodecs, imgproc};
use serde::Deserialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

const BOUNDARY: &str = "boundarydonotcross";
const SOURCE_POLL: Duration = Duration::from_millis(10);
const SNAPSHOT_WAIT: Duration = Duration::from_secs(1);
const MIN_FPS: f64 = 0.1;
const MAX_FPS: f64 = 240.0;

/// Finite positive rates are clamped to `MIN_FPS..=MAX_FPS`; anything else means "unlimited".
fn sanitize_fps(fps: f64) -> Option<f64> {
    if fps.is_finite() && fps > 0.0 {
        Some(fps.clamp(MIN_FPS, MAX_FPS))
    } else {
        None
    }
}

/// Query string accepted by both stream routes.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct StreamQuery {
    pub action: Option<String>,
    pub resolution: Option<String>,
    pub fps: Option<f64>,
    pub compression: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub fps: Option<f64>,
    pub compression: Option<i32>,
    pub default_compression: i32,
}

impl StreamSettings {
    pub fn new(default_compression: i32) -> Self {
        StreamSettings {
            width: None,
            height: None,
            fps: None,
            compression: None,
            default_compression,
        }
    }

    /// Reads the `properties` list of a camera's `stream` JSON object.
    pub fn apply_config_json(&mut self, stream_name: &str, config: &Value) {
        let Some(props) = config.get("properties").and_then(Value::as_array) else {
            warn!("Stream '{}': stream config has no properties list", stream_name);
            return;
        };
        for prop in props {
            let name = prop.get("name").and_then(Value::as_str).unwrap_or_default();
            let Some(value) = prop.get("value").and_then(Value::as_f64) else {
                warn!("Stream '{}': ignoring property {}", stream_name, prop);
                continue;
            };
            match name {
                "width" => self.width = Some(value as i32),
                "height" => self.height = Some(value as i32),
                "fps" => self.fps = sanitize_fps(value),
                "compression" => self.compression = Some(value as i32),
                "default_compression" => self.default_compression = value as i32,
                other => warn!("Stream '{}': unknown property '{}'", stream_name, other),
            }
        }
    }

    pub fn with_query(&self, query: &StreamQuery) -> StreamSettings {
        let mut s = self.clone();
        if let Some((w, h)) = query.resolution.as_deref().and_then(|r| r.split_once('x')) {
            if let (Ok(w), Ok(h)) = (w.parse::<i32>(), h.parse::<i32>()) {
                s.width = Some(w);
                s.height = Some(h);
            }
        }
        if let Some(fps) = query.fps {
            s.fps = sanitize_fps(fps);
        }
        if let Some(c) = query.compression {
            s.compression = Some(c);
        }
        s
    }

    /// JPEG quality in 0..=100.
    pub fn quality(&self) -> i32 {
        self.compression.unwrap_or(self.default_compression).clamp(0, 100)
    }

    fn frame_interval(&self) -> Duration {
        self.fps
            .and_then(sanitize_fps)
            .and_then(|fps| Duration::try_from_secs_f64(1.0 / fps).ok())
            .filter(|d| !d.is_zero())
            .unwrap_or(SOURCE_POLL)
    }
}

pub fn encode_jpeg(image: &Mat, settings: &StreamSettings) -> Result<Vec<u8>, AppError> {
    let mut params = Vector::<i32>::new();
    params.push(imgcodecs::IMWRITE_JPEG_QUALITY);
    params.push(settings.quality());

    let mut buf = Vector::<u8>::new();
    let encoded = match (settings.width, settings.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 && (w != image.cols() || h != image.rows()) => {
            let mut resized = Mat::default();
            imgproc::resize(image, &mut resized, Size::new(w, h), 0.0, 0.0, imgproc::INTER_LINEAR)?;
            imgcodecs::imencode(".jpg", &resized, &mut buf, &params)?
        }
        _ => imgcodecs::imencode(".jpg", image, &mut buf, &params)?,
    };
    if !encoded {
        return Err(AppError::Stream("JPEG encoding failed".to_string()));
    }
    Ok(buf.to_vec())
}

struct Shared {
    name: String,
    source: Arc<dyn VideoSource>,
    settings: RwLock<StreamSettings>,
}

impl Shared {
    fn settings(&self) -> StreamSettings {
        self.settings.read().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

pub struct MjpegServer {
    shared: Arc<Shared>,
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl MjpegServer {
    /// Binds `0.0.0.0:port` (0 for any free port) and starts serving `source`.
    pub async fn start(
        name: &str,
        source: Arc<dyn VideoSource>,
        port: u16,
        default_compression: i32,
    ) -> Result<MjpegServer, AppError> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|e| AppError::Stream(format!("'{}' could not listen on port {}: {}", name, port, e)))?;
        let local_addr = listener.local_addr()?;
        let shared = Arc::new(Shared {
            name: name.to_string(),
            source,
            settings: RwLock::new(StreamSettings::new(default_compression)),
        });

        let app = Router::new()
            .route("/", get(root_handler))
            .route("/stream.mjpg", get(stream_handler))
            .with_state(shared.clone());

        let server_name = name.to_string();
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Stream '{}' server error: {}", server_name, e);
            }
        });

        info!("📺 Serving '{}' on port {}", name, local_addr.port());
        Ok(MjpegServer {
            shared,
            local_addr,
            task,
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn set_config_json(&self, config: &Value) {
        let mut settings = self.shared.settings.write().unwrap_or_else(|p| p.into_inner());
        settings.apply_config_json(&self.shared.name, config);
        info!("⚙️ Stream '{}' configured: {:?}", self.shared.name, *settings);
    }

    pub fn settings(&self) -> StreamSettings {
        self.shared.settings()
    }
}

impl Drop for MjpegServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn root_handler(State(shared): State<Arc<Shared>>, Query(query): Query<StreamQuery>) -> Response {
    let settings = shared.settings().with_query(&query);
    match query.action.as_deref() {
        None | Some("stream") => mjpeg_response(shared, settings),
        Some("snapshot") => snapshot_response(&shared, &settings).await,
        Some(other) => {
            debug!("Stream '{}': unknown action '{}'", shared.name, other);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

async fn stream_handler(State(shared): State<Arc<Shared>>, Query(query): Query<StreamQuery>) -> Response {
    let settings = shared.settings().with_query(&query);
    mjpeg_response(shared, settings)
}

/// Encodes the slot's latest frame off the async workers.
async fn encode_latest(slot: FrameSlot, settings: StreamSettings) -> Result<Option<(Vec<u8>, u64)>, AppError> {
    tokio::task::spawn_blocking(move || -> Result<Option<(Vec<u8>, u64)>, AppError> {
        match slot.latest()? {
            Some(frame) => Ok(Some((encode_jpeg(&frame.image, &settings)?, frame.sequence))),
            None => Ok(None),
        }
    })
    .await
    .map_err(|e| AppError::Stream(format!("encoder task failed: {}", e)))?
}

/// Per-client state of a multipart stream.
struct StreamState {
    shared: Arc<Shared>,
    settings: StreamSettings,
    interval: Interval,
    watching: Option<(FrameSlot, ConsumerGuard)>,
    last_sequence: u64,
}

impl StreamState {
    /// Waits for the next frame newer than the last one sent and frames it as a part.
    async fn next_part(&mut self) -> Result<Vec<u8>, AppError> {
        loop {
            self.interval.tick().await;
            let Some(slot) = self.shared.source.frames() else {
                continue;
            };
            if !matches!(&self.watching, Some((watched, _)) if watched.same_slot(&slot)) {
                self.watching = Some((slot.clone(), slot.acquire()));
                self.last_sequence = 0;
            }
            if slot.sequence() == self.last_sequence {
                continue;
            }
            let Some((jpeg, sequence)) = encode_latest(slot, self.settings.clone()).await? else {
                continue;
            };
            self.last_sequence = sequence;

            let mut part = format!(
                "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
                BOUNDARY,
                jpeg.len()
            )
            .into_bytes();
            part.extend_from_slice(&jpeg);
            part.extend_from_slice(b"\r\n");
            return Ok(part);
        }
    }
}

fn mjpeg_response(shared: Arc<Shared>, settings: StreamSettings) -> Response {
    let mut interval = tokio::time::interval(settings.frame_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let state = StreamState {
        shared,
        settings,
        interval,
        watching: None,
        last_sequence: 0,
    };

    let parts = stream::unfold(state, |mut state| async move {
        match state.next_part().await {
            Ok(part) => Some((Ok::<Vec<u8>, AppError>(part), state)),
            Err(e) => {
                debug!("Stream '{}': ending client stream: {}", state.shared.name, e);
                None
            }
        }
    });

    let content_type = format!("multipart/x-mixed-replace;boundary={}", BOUNDARY);
    (
        [
            (header::CONTENT_TYPE, content_type.as_str()),
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
            (header::PRAGMA, "no-cache"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        Body::from_stream(parts),
    )
        .into_response()
}

async fn snapshot_response(shared: &Shared, settings: &StreamSettings) -> Response {
    let deadline = tokio::time::Instant::now() + SNAPSHOT_WAIT;
    loop {
        if let Some(slot) = shared.source.frames() {
            match encode_latest(slot, settings.clone()).await {
                Ok(Some((jpeg, _))) => {
                    return (
                        [(header::CONTENT_TYPE, "image/jpeg"), (header::CACHE_CONTROL, "no-cache")],
                        jpeg,
                    )
                        .into_response();
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Stream '{}': snapshot failed: {}", shared.name, e);
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
        tokio::time::sleep(SOURCE_POLL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Uri;
    use opencv::core::{Scalar, CV_8UC3};
    use serde_json::json;

    fn query(uri: &str) -> StreamQuery {
        let uri: Uri = uri.parse().unwrap();
        Query::<StreamQuery>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn query_struct_reads_all_parameters() {
        let q = query("http://localhost:1181/?action=snapshot&resolution=320x240&fps=15&compression=40");
        assert_eq!(q.action.as_deref(), Some("snapshot"));
        assert_eq!(q.resolution.as_deref(), Some("320x240"));
        assert_eq!(q.fps, Some(15.0));
        assert_eq!(q.compression, Some(40));

        let empty = query("http://localhost:1181/stream.mjpg");
        assert!(empty.action.is_none() && empty.fps.is_none());
    }

    #[test]
    fn config_and_query_layering() {
        let mut s = StreamSettings::new(80);
        s.apply_config_json(
            "serve_front",
            &json!({"properties": [{"name": "compression", "value": 30}, {"name": "fps", "value": 15}]}),
        );
        assert_eq!(s.quality(), 30);
        assert_eq!(s.fps, Some(15.0));

        let q = s.with_query(&query("/?resolution=320x240&compression=150&fps=0"));
        assert_eq!((q.width, q.height), (Some(320), Some(240)));
        assert_eq!(q.quality(), 100);
        assert_eq!(q.fps, None);
    }

    #[test]
    fn extreme_fps_never_breaks_the_interval() {
        let base = StreamSettings::new(80);

        let infinite = base.with_query(&query("/?fps=inf"));
        assert_eq!(infinite.fps, None);
        assert_eq!(infinite.frame_interval(), SOURCE_POLL);

        let tiny = base.with_query(&query("/?fps=1e-300"));
        assert_eq!(tiny.fps, Some(MIN_FPS));
        assert_eq!(tiny.frame_interval(), Duration::from_secs(10));

        let fast = base.with_query(&query("/?fps=100000"));
        assert_eq!(fast.fps, Some(MAX_FPS));
        assert!(!fast.frame_interval().is_zero());

        let mut configured = StreamSettings::new(80);
        configured.apply_config_json("serve_front", &json!({"properties": [{"name": "fps", "value": 1e-300}]}));
        assert_eq!(configured.fps, Some(MIN_FPS));
    }

    #[test]
    fn encodes_and_resizes() {
        let image = Mat::new_rows_cols_with_default(120, 160, CV_8UC3, Scalar::new(0.0, 128.0, 255.0, 0.0)).unwrap();
        let settings = StreamSettings::new(80).with_query(&query("/?resolution=80x60"));
        let jpeg = encode_jpeg(&image, &settings).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = imgcodecs::imdecode(&Vector::<u8>::from_slice(&jpeg), imgcodecs::IMREAD_COLOR).unwrap();
        assert_eq!((decoded.cols(), decoded.rows()), (80, 60));
    }
}
