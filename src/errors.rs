use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Config(String),

    #[error("File I/O Error: {0}")]
    Io(String),

    #[error("Camera Error: {0}")]
    Camera(String),

    #[error("Stream Error: {0}")]
    Stream(String),

    #[error("Network Table Error: {0}")]
    Network(String),

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("OpenCV Error: {0}")]
    OpenCV(String),
}

// Allow conversion from std::io::Error to AppError::Io
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<opencv::Error> for AppError {
    fn from(err: opencv::Error) -> Self {
        AppError::OpenCV(err.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_displays_message_verbatim() {
        let err = AppError::Config("config error in 'frc.json': must be JSON object".to_string());
        assert_eq!(err.to_string(), "config error in 'frc.json': must be JSON object");
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err: AppError = io_err.into();
        match err {
            AppError::Io(msg) => assert!(msg.contains("no such file")),
            other => panic!("expected Io error, got {:?}", other),
        }
    }
}
