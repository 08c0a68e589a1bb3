mod common;

use common::{orange_scene, test_settings, FakeOpener, FRAME_HEIGHT, FRAME_WIDTH};
use opencv::core::{Mat, Vec3b};
use opencv::prelude::*;
use rvision::app_config::PipelineSettings;
use rvision::camera::cv_sink::{CvSink, TIMEOUT_ERROR};
use rvision::camera::cv_source::CvSource;
use rvision::camera_config::CameraConfig;
use rvision::core::camera_server::CameraServer;
use rvision::core::video_source::VideoSource;
use rvision::nt::{NetworkTableInstance, Value};
use rvision::operations::object_detect_op::{CENTER_COLOR_KEY, FPS_KEY};
use rvision::operations::{start_camera, IterationOutcome, ObjectDetectLoop};
use rvision::vision::ObjectDetectPipeline;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn front_camera(path: &str) -> CameraConfig {
    CameraConfig {
        name: "front".to_string(),
        path: path.to_string(),
        config: json!({"name": "front", "path": path, "width": FRAME_WIDTH, "height": FRAME_HEIGHT}),
        stream_config: None,
    }
}

async fn detect_loop(opener: FakeOpener, nt: &NetworkTableInstance) -> (ObjectDetectLoop, Arc<CvSource>, CameraServer) {
    let settings = test_settings();
    let server = CameraServer::new(&settings, nt.clone(), Arc::new(opener));
    start_camera(&server, &front_camera("/dev/video0")).await.unwrap();

    let output = server.put_video("Processed", FRAME_WIDTH, FRAME_HEIGHT).await.unwrap();
    let sink = server.get_video().unwrap();
    let pipeline = ObjectDetectPipeline::new(PipelineSettings::default()).unwrap();
    let detect = ObjectDetectLoop::new(sink, output.clone(), nt.get_table("Vision"), pipeline);
    (detect, output, server)
}

#[tokio::test]
async fn processed_frame_is_published() {
    let nt = NetworkTableInstance::new();
    let (mut detect, output, _server) = detect_loop(FakeOpener::default(), &nt).await;

    let outcome = detect.run_iteration().unwrap();
    let IterationOutcome::Processed { fps, contours } = outcome.clone() else {
        panic!("expected a processed frame, got {:?}", outcome);
    };
    assert!(fps > 0.0);
    assert_eq!(contours, 1);

    assert_eq!(nt.get_value(&format!("/Vision/{}", FPS_KEY)), Some(Value::Double(fps)));
    let Some(Value::DoubleArray(color)) = nt.get_value(&format!("/Vision/{}", CENTER_COLOR_KEY)) else {
        panic!("center color not published");
    };
    assert_eq!(color.len(), 3);
    assert!(color[0] > 10.0 && color[0] < 20.0, "hue {}", color[0]);
    assert_eq!(color[1], 255.0);
    assert_eq!(color[2], 255.0);

    let frame = output.frames().unwrap().latest().unwrap().unwrap();
    assert_eq!((frame.image.cols(), frame.image.rows()), (FRAME_WIDTH, FRAME_HEIGHT));
    let edge = frame.image.at_2d::<Vec3b>(55, 61).unwrap();
    assert_eq!((edge[0], edge[1], edge[2]), (0, 255, 0));
    assert!(output.last_error().is_none());
}

#[tokio::test]
async fn missing_camera_is_reported_on_the_output_stream() {
    let nt = NetworkTableInstance::new();
    let opener = FakeOpener::with_unplugged(&["/dev/video0"]);
    let (mut detect, output, _server) = detect_loop(opener, &nt).await;

    assert_eq!(detect.run_iteration().unwrap(), IterationOutcome::Skipped);
    let error = output.last_error().unwrap();
    assert!(error.contains("could not open /dev/video0"), "{}", error);
    assert_eq!(output.frames().unwrap().sequence(), 0);
    assert!(nt.get_value(&format!("/Vision/{}", FPS_KEY)).is_none());
}

#[test]
fn idle_source_times_out() {
    let source = Arc::new(CvSource::new("idle", FRAME_WIDTH, FRAME_HEIGHT));
    let mut sink = CvSink::new(source.clone(), Duration::from_millis(20));
    let mut image = Mat::default();

    assert_eq!(sink.grab_frame(&mut image).unwrap(), 0);
    assert_eq!(sink.get_error(), TIMEOUT_ERROR);

    source.put_frame(orange_scene());
    assert!(sink.grab_frame(&mut image).unwrap() > 0);
    assert_eq!(sink.get_error(), "");
    assert_eq!(image.cols(), FRAME_WIDTH);

    // The same frame is not handed out twice.
    assert_eq!(sink.grab_frame(&mut image).unwrap(), 0);
}

#[test]
fn notify_error_is_visible_until_next_frame() {
    let source = CvSource::new("Processed", FRAME_WIDTH, FRAME_HEIGHT);
    source.notify_error(TIMEOUT_ERROR);
    source.notify_error(TIMEOUT_ERROR);
    assert_eq!(source.last_error().as_deref(), Some(TIMEOUT_ERROR));
    assert_eq!(source.frames().unwrap().last_error().as_deref(), Some(TIMEOUT_ERROR));

    source.put_frame(orange_scene());
    assert!(source.last_error().is_none());
    assert!(source.frames().unwrap().last_error().is_none());
}
