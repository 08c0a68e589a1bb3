pub mod camera_startup_op;
pub mod object_detect_op;
pub mod startup_op;

pub use camera_startup_op::{select_camera, start_camera, start_cameras, start_switched_camera};
pub use object_detect_op::{run_object_detection, IterationOutcome, ObjectDetectLoop};
pub use startup_op::{start_program, VisionProgram};
