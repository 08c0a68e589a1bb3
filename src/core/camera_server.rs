use crate::app_config::ApplicationConfig;
use crate::camera::capture_device::DeviceOpener;
use crate::camera::cv_sink::CvSink;
use crate::camera::cv_source::CvSource;
use crate::camera::mjpeg_server::MjpegServer;
use crate::camera::switched_camera::SwitchedCamera;
use crate::camera::usb_camera::UsbCamera;
use crate::core::video_source::VideoSource;
use crate::errors::AppError;
use crate::nt::NetworkTableInstance;
use log::{debug, info};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const PUBLISHER_TABLE: &str = "CameraPublisher";

/// Owns every started source and its stream server, and advertises them
/// under `/CameraPublisher`.
pub struct CameraServer {
    nt: NetworkTableInstance,
    opener: Arc<dyn DeviceOpener>,
    stream_host: String,
    default_compression: i32,
    frame_timeout: Duration,
    next_port: Mutex<u16>,
    primary: Mutex<Option<Arc<dyn VideoSource>>>,
    sources: Mutex<Vec<Arc<dyn VideoSource>>>,
    servers: Mutex<Vec<Arc<MjpegServer>>>,
}

impl CameraServer {
    pub fn new(settings: &ApplicationConfig, nt: NetworkTableInstance, opener: Arc<dyn DeviceOpener>) -> Self {
        debug!("🛠️ Initializing CameraServer (streams from port {})", settings.stream_base_port);
        CameraServer {
            nt,
            opener,
            stream_host: settings.stream_host.clone(),
            default_compression: settings.default_stream_compression,
            frame_timeout: Duration::from_millis(settings.frame_timeout_ms),
            next_port: Mutex::new(settings.stream_base_port),
            primary: Mutex::new(None),
            sources: Mutex::new(Vec::new()),
            servers: Mutex::new(Vec::new()),
        }
    }

    pub fn open_usb_camera(&self, name: &str, path: &str) -> Arc<UsbCamera> {
        Arc::new(UsbCamera::open(name, path, self.opener.as_ref()))
    }

    fn allocate_port(&self) -> u16 {
        let mut next = self.next_port.lock().unwrap_or_else(|p| p.into_inner());
        let port = *next;
        if port != 0 {
            *next = port.saturating_add(1);
        }
        port
    }

    async fn serve(&self, source: Arc<dyn VideoSource>) -> Result<Arc<MjpegServer>, AppError> {
        let start_time = Instant::now();
        let server_name = format!("serve_{}", source.name());
        let server = Arc::new(
            MjpegServer::start(&server_name, source.clone(), self.allocate_port(), self.default_compression).await?,
        );
        self.publish(source.as_ref(), server.port());
        self.sources.lock().unwrap_or_else(|p| p.into_inner()).push(source);
        self.servers.lock().unwrap_or_else(|p| p.into_inner()).push(server.clone());
        debug!("Started '{}' in {:?}", server_name, start_time.elapsed());
        Ok(server)
    }

    fn publish(&self, source: &dyn VideoSource, port: u16) {
        let table = self.nt.get_table(&format!("{}/{}", PUBLISHER_TABLE, source.name()));
        table.put_string("source", &source.description());
        table.put_string_array(
            "streams",
            &[format!("mjpg:http://{}:{}/?action=stream", self.stream_host, port)],
        );
    }

    /// Serves `source` and makes it the primary video if none is set yet.
    pub async fn start_automatic_capture(&self, source: Arc<dyn VideoSource>) -> Result<Arc<MjpegServer>, AppError> {
        {
            let mut primary = self.primary.lock().unwrap_or_else(|p| p.into_inner());
            if primary.is_none() {
                info!("🎥 '{}' is the primary video source", source.name());
                *primary = Some(source.clone());
            }
        }
        self.serve(source).await
    }

    pub async fn add_switched_camera(&self, name: &str) -> Result<(Arc<SwitchedCamera>, Arc<MjpegServer>), AppError> {
        let switched = Arc::new(SwitchedCamera::new(name));
        let server = self.serve(switched.clone()).await?;
        Ok((switched, server))
    }

    /// A sink reading the primary video source.
    pub fn get_video(&self) -> Result<CvSink, AppError> {
        let primary = self.primary.lock().unwrap_or_else(|p| p.into_inner()).clone();
        let source = primary.ok_or_else(|| AppError::NotFound("no primary camera has been started".to_string()))?;
        Ok(CvSink::new(source, self.frame_timeout))
    }

    /// Creates and serves a source for processed frames.
    pub async fn put_video(&self, name: &str, width: i32, height: i32) -> Result<Arc<CvSource>, AppError> {
        let source = Arc::new(CvSource::new(name, width, height));
        self.serve(source.clone()).await?;
        Ok(source)
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    pub fn servers(&self) -> Vec<Arc<MjpegServer>> {
        self.servers.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}
