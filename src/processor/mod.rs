pub mod brand_catalog;
pub mod calibrator;
pub mod context_scorer;
pub mod lexical_extractor;
pub mod merger;
pub mod segmenter;
pub mod structural_extractor;

pub use brand_catalog::BrandCatalog;
pub use calibrator::{ConfidenceCalibrator, ScoreBreakdown};
pub use context_scorer::ContextScorer;
pub use lexical_extractor::LexicalExtractor;
pub use merger::{merge_candidates, normalized_key, similarity};
pub use segmenter::Segmenter;
pub use structural_extractor::StructuralExtractor;
