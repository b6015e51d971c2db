/// Errors surfaced by a detection run.
///
/// Collaborator failures that only cost a candidate (or the optional deep
/// extraction stage) are logged and absorbed; they never reach the caller.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The marketplace rejected our credentials before any product was verified
    #[error("Marketplace authentication failed: {0}")]
    MarketplaceAuth(String),
}
