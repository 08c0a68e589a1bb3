mod common;

use common::{test_settings, FakeOpener};
use rvision::app_config::ApplicationConfig;
use rvision::errors::AppError;
use rvision::nt::{NetworkTableInstance, Value};
use rvision::operations::start_program;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn local_settings() -> ApplicationConfig {
    ApplicationConfig {
        nt_port: 0,
        nt_server_bind: "127.0.0.1".to_string(),
        ..test_settings()
    }
}

#[tokio::test]
async fn bad_config_opens_no_camera() {
    let cases = [
        r#"{"ntmode": "server", "cameras": [{"name": "front", "path": "/dev/video0"}]}"#,
        r#"{"team": 1, "ntmode": "server", "cameras": [{"name": "front", "path": "/dev/video0"}, {"name": "rear"}]}"#,
        r#"{"team": 1, "ntmode": "server", "cameras": [{"name": "front", "path": "/dev/video0"}],
            "switched cameras": [{"name": "driver"}]}"#,
        "not json at all",
    ];
    for contents in cases {
        let file = write_temp(contents);
        let opener = FakeOpener::default();
        let nt = NetworkTableInstance::new();

        let result = start_program(file.path().to_str().unwrap(), &local_settings(), &nt, Arc::new(opener.clone())).await;
        assert!(matches!(result, Err(AppError::Config(_))), "accepted {}", contents);
        assert!(opener.opened_paths().is_empty());
        assert!(nt.get_value("/CameraPublisher/front/source").is_none());
    }
}

#[tokio::test]
async fn missing_config_file_opens_no_camera() {
    let opener = FakeOpener::default();
    let nt = NetworkTableInstance::new();
    let result = start_program("/nonexistent/frc.json", &local_settings(), &nt, Arc::new(opener.clone())).await;
    assert!(result.is_err());
    assert!(opener.opened_paths().is_empty());
}

#[tokio::test]
async fn good_config_starts_everything() {
    let file = write_temp(
        r#"{
            "team": 4904,
            "ntmode": "server",
            "cameras": [
                {"name": "front", "path": "/dev/video0", "width": 160, "height": 120},
                {"name": "rear", "path": "/dev/video1", "width": 160, "height": 120}
            ],
            "switched cameras": [{"name": "driver", "key": "/selector"}]
        }"#,
    );
    let opener = FakeOpener::default();
    let nt = NetworkTableInstance::new();

    let program = start_program(file.path().to_str().unwrap(), &local_settings(), &nt, Arc::new(opener.clone()))
        .await
        .unwrap();

    assert_eq!(opener.opened_paths(), vec!["/dev/video0", "/dev/video1"]);
    assert_eq!(program.cameras.len(), 2);
    assert_eq!(program.switched_cameras.len(), 1);
    assert!(program.nt_server_addr.is_some());
    assert_eq!(program.camera_server.source_names(), vec!["front", "rear", "driver"]);
    assert_eq!(
        nt.get_value("/CameraPublisher/driver/source"),
        Some(Value::String("switched:".to_string()))
    );
}
