use crate::app_config::ApplicationConfig;
use crate::camera::cv_sink::CvSink;
use crate::camera::cv_source::CvSource;
use crate::config_loader::FrcConfig;
use crate::core::camera_server::CameraServer;
use crate::errors::AppError;
use crate::nt::{NetworkTable, NetworkTableInstance};
use crate::vision::ObjectDetectPipeline;
use log::{debug, info, warn};
use opencv::core::Mat;
use std::sync::Arc;
use std::time::Instant;

pub const FPS_KEY: &str = "Frame Rate (fps)";
pub const CENTER_COLOR_KEY: &str = "Center Color";

#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    /// No frame arrived; the sink error went to the output stream.
    Skipped,
    Processed { fps: f64, contours: usize },
}

/// Grabs from the primary camera, runs the pipeline and publishes the result.
pub struct ObjectDetectLoop {
    sink: CvSink,
    output: Arc<CvSource>,
    table: NetworkTable,
    pipeline: ObjectDetectPipeline,
    buffer: Mat,
}

impl ObjectDetectLoop {
    pub fn new(sink: CvSink, output: Arc<CvSource>, table: NetworkTable, pipeline: ObjectDetectPipeline) -> Self {
        ObjectDetectLoop {
            sink,
            output,
            table,
            pipeline,
            buffer: Mat::default(),
        }
    }

    pub fn run_iteration(&mut self) -> Result<IterationOutcome, AppError> {
        let start = Instant::now();

        let frame_time = self.sink.grab_frame(&mut self.buffer)?;
        if frame_time == 0 {
            self.output.notify_error(self.sink.get_error());
            return Ok(IterationOutcome::Skipped);
        }

        let result = self.pipeline.process(&self.buffer)?;

        let elapsed = start.elapsed().as_secs_f64();
        let fps = if elapsed > 0.0 { 1.0 / elapsed } else { 0.0 };
        self.table.put_number(FPS_KEY, fps);
        if let Some(color) = result.center_color {
            self.table.put_number_array(CENTER_COLOR_KEY, &color);
        }

        let contours = result.contours.len();
        self.output.put_frame(result.output);
        Ok(IterationOutcome::Processed { fps, contours })
    }

    /// Runs until the process exits. Pipeline failures are reported to the
    /// output stream and the loop carries on with the next frame.
    pub fn run_forever(&mut self) {
        let mut processed: u64 = 0;
        loop {
            match self.run_iteration() {
                Ok(IterationOutcome::Processed { fps, contours }) => {
                    processed += 1;
                    if processed % 300 == 0 {
                        debug!("Processed {} frames ({:.1} fps, {} contours)", processed, fps, contours);
                    }
                }
                Ok(IterationOutcome::Skipped) => {}
                Err(e) => {
                    self.output.notify_error(&e.to_string());
                }
            }
        }
    }
}

/// Resolution of the processed stream, taken from the first camera entry.
pub fn output_size(config: &FrcConfig) -> Result<(i32, i32, Option<i64>), AppError> {
    let camera = config
        .cameras
        .first()
        .ok_or_else(|| AppError::NotFound("no cameras configured, nothing to process".to_string()))?;
    let dimension = |field: &str| -> Result<i32, AppError> {
        camera
            .video_mode_field(field)
            .and_then(|v| i32::try_from(v).ok())
            .filter(|v| *v > 0)
            .ok_or_else(|| AppError::Config(format!("camera '{}': could not read {}", camera.name, field)))
    };
    Ok((dimension("width")?, dimension("height")?, camera.video_mode_field("fps")))
}

pub async fn run_object_detection(
    server: &CameraServer,
    nt: &NetworkTableInstance,
    config: &FrcConfig,
    settings: &ApplicationConfig,
) -> Result<(), AppError> {
    let (width, height, fps) = output_size(config)?;
    match fps {
        Some(fps) => info!("Image Size: {} x {} @ {} fps", width, height, fps),
        None => info!("Image Size: {} x {}", width, height),
    }

    let output = server.put_video(&settings.output_stream_name, width, height).await?;
    let sink = server.get_video()?;
    let pipeline = ObjectDetectPipeline::new(settings.pipeline.clone())?;
    let table = nt.get_table(&settings.vision_table);

    info!("🔍 Object detection running, output on '{}'", settings.output_stream_name);
    let mut detect_loop = ObjectDetectLoop::new(sink, output, table, pipeline);
    tokio::task::spawn_blocking(move || detect_loop.run_forever())
        .await
        .map_err(|e| {
            warn!("Object detection thread stopped: {}", e);
            AppError::Camera(format!("object detection thread stopped: {}", e))
        })
}
