pub mod chunker;
pub mod classify;
pub mod extraction;
pub mod fields;
pub mod processor;

pub use processor::{DocumentPipeline, PipelineError, PipelineRunReport, StageReport};
