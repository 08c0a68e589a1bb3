pub mod camera_server;
pub mod video_source;
