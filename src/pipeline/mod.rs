pub mod orchestrator;
pub mod verifier;

use serde::Serialize;
use std::sync::Arc;

pub use orchestrator::{DetectionPipeline, RunOptions};
pub use verifier::MarketplaceVerifier;

/// Progress notification emitted during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    Stage { label: String, step: usize, total: usize },
    Verifying { current: usize, total: usize, name: String },
}

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

pub(crate) fn report(callback: Option<&ProgressCallback>, event: ProgressEvent) {
    if let Some(callback) = callback {
        callback(event);
    }
}
