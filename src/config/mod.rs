pub mod pipeline_config;
pub mod service_config;

pub use pipeline_config::PipelineConfig;
pub use service_config::*;
