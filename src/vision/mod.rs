pub mod pipeline;

pub use pipeline::{ObjectDetectPipeline, PipelineOutput};
