pub mod config;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod pipeline;
pub mod processor;

pub use error::PipelineError;
pub use pipeline::{DetectionPipeline, ProgressEvent, RunOptions};
