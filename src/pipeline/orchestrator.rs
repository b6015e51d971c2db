use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::fetcher::{DeepExtractionRequest, DeepExtractor, ExtractedMention, ProductLookup};
use crate::models::{
    ComparisonGroup, ContentType, DetectedCandidate, DetectionSource, DetectionSourceKind, ParagraphBlock,
    PipelineOutput, VerifiedProduct,
};
use crate::pipeline::verifier::MarketplaceVerifier;
use crate::pipeline::{ProgressCallback, ProgressEvent, report};
use crate::processor::merger::merge_candidates;
use crate::processor::segmenter::quote_around;
use crate::processor::{ConfidenceCalibrator, LexicalExtractor, Segmenter, StructuralExtractor};

const TOTAL_STAGES: usize = 6;
const COMPARISON_CRITERIA: &[&str] = &["Price", "Rating", "Review count", "Key features"];

/// Per-run switches
#[derive(Clone, Default)]
pub struct RunOptions {
    pub skip_external_extraction: bool,
    pub on_progress: Option<ProgressCallback>,
}

/// Candidates found before verification, with the blocks they index into
#[derive(Debug, Clone, Default)]
pub struct Detection {
    pub blocks: Vec<ParagraphBlock>,
    pub candidates: Vec<DetectedCandidate>,
    pub content_type: ContentType,
}

/// End-to-end product detection over one article at a time.
///
/// Holds only compiled pattern tables and shared collaborators, so a single
/// instance can serve any number of independent runs.
pub struct DetectionPipeline {
    config: PipelineConfig,
    segmenter: Segmenter,
    structural: StructuralExtractor,
    lexical: LexicalExtractor,
    calibrator: ConfidenceCalibrator,
    deep_extractor: Option<Arc<dyn DeepExtractor>>,
    verifier: MarketplaceVerifier,
}

impl DetectionPipeline {
    pub fn new(config: PipelineConfig, lookup: Arc<dyn ProductLookup>) -> Result<Self> {
        config.validate()?;

        let verifier = MarketplaceVerifier::new(lookup, config.max_verified_candidates, config.verification_delay());

        Ok(Self {
            segmenter: Segmenter::new(config.min_block_text_len),
            structural: StructuralExtractor::new(),
            lexical: LexicalExtractor::new()?,
            calibrator: ConfidenceCalibrator::new(),
            deep_extractor: None,
            verifier,
            config,
        })
    }

    pub fn with_deep_extractor(mut self, extractor: Arc<dyn DeepExtractor>) -> Self {
        self.deep_extractor = Some(extractor);
        self
    }

    pub async fn run(&self, title: &str, html: &str, options: RunOptions) -> Result<PipelineOutput, PipelineError> {
        let progress = options.on_progress.as_ref();
        let use_external = !options.skip_external_extraction && self.deep_extractor.is_some();

        let detection = self.detect(title, html, use_external, progress).await;
        if detection.blocks.is_empty() {
            info!("Document produced no usable paragraphs; nothing to detect");
            return Ok(PipelineOutput::default());
        }

        let candidate_count = detection.candidates.len();
        let viable: Vec<DetectedCandidate> = detection
            .candidates
            .into_iter()
            .filter(|c| c.score() >= self.config.min_confidence)
            .collect();
        info!(
            "{} of {} candidates meet the {} confidence threshold",
            viable.len(),
            candidate_count,
            self.config.min_confidence
        );

        stage(progress, "Verifying products", 5);
        let products = self.verifier.verify(&viable, progress).await?;

        stage(progress, "Assembling output", 6);
        let comparison = self.comparison_group(title, &products);

        info!(
            "Detection finished: {} verified products from {} candidates",
            products.len(),
            candidate_count
        );

        Ok(PipelineOutput {
            products,
            comparison,
            content_type: detection.content_type,
            candidate_count,
        })
    }

    /// Segmentation through calibration, without the marketplace.
    /// Candidates come back sorted by confidence, highest first.
    pub async fn detect_candidates(&self, title: &str, html: &str, use_external: bool) -> Detection {
        self.detect(title, html, use_external && self.deep_extractor.is_some(), None).await
    }

    async fn detect(&self, title: &str, html: &str, use_external: bool, progress: Option<&ProgressCallback>) -> Detection {
        stage(progress, "Segmenting article", 1);
        let blocks = self.segmenter.segment(html);
        if blocks.is_empty() {
            return Detection::default();
        }

        stage(progress, "Extracting pattern candidates", 2);
        let mut candidates = self.structural.extract(html, &blocks);
        let structural_count = candidates.len();
        candidates.extend(self.lexical.extract(&blocks));
        info!(
            "Found {} structural and {} lexical candidates in {} paragraphs",
            structural_count,
            candidates.len() - structural_count,
            blocks.len()
        );
        let mut candidates = merge_candidates(candidates);

        stage(progress, "Running deep extraction", 3);
        let mut content_type = ContentType::General;
        if use_external {
            let (external, detected_type) = self.deep_extract(title, &blocks, &candidates).await;
            content_type = detected_type;
            if !external.is_empty() {
                candidates.extend(external);
                candidates = merge_candidates(candidates);
            }
        }

        stage(progress, "Calibrating confidence", 4);
        self.calibrator.calibrate_all(&mut candidates, &blocks);
        candidates.sort_by(|a, b| b.score().cmp(&a.score()));

        Detection {
            blocks,
            candidates,
            content_type,
        }
    }

    async fn deep_extract(
        &self,
        title: &str,
        blocks: &[ParagraphBlock],
        candidates: &[DetectedCandidate],
    ) -> (Vec<DetectedCandidate>, ContentType) {
        let Some(extractor) = &self.deep_extractor else {
            return (Vec::new(), ContentType::General);
        };

        let request = build_deep_request(title, blocks, candidates);
        match extractor.extract(&request).await {
            Ok(result) => {
                let reported = result.candidates.len();
                let accepted = external_candidates(result.candidates, blocks, self.config.external_min_confidence);
                info!(
                    "Deep extraction kept {} of {} reported candidates",
                    accepted.len(),
                    reported
                );
                (accepted, result.content_type)
            }
            Err(e) => {
                warn!("Deep extraction failed, continuing with pattern results: {:#}", e);
                (Vec::new(), ContentType::General)
            }
        }
    }

    fn comparison_group(&self, title: &str, products: &[VerifiedProduct]) -> Option<ComparisonGroup> {
        if products.len() < self.config.comparison_min_products {
            return None;
        }

        let title = if title.trim().is_empty() {
            "Product comparison".to_string()
        } else {
            format!("{}: comparison", title.trim())
        };

        Some(ComparisonGroup {
            id: Uuid::new_v4().to_string(),
            title,
            product_ids: products
                .iter()
                .take(self.config.comparison_max_products)
                .map(|p| p.id.clone())
                .collect(),
            criteria: COMPARISON_CRITERIA.iter().map(|c| c.to_string()).collect(),
        })
    }
}

fn stage(progress: Option<&ProgressCallback>, label: &str, step: usize) {
    info!("[{}/{}] {}", step, TOTAL_STAGES, label);
    report(
        progress,
        ProgressEvent::Stage {
            label: label.to_string(),
            step,
            total: TOTAL_STAGES,
        },
    );
}

pub fn build_deep_request(title: &str, blocks: &[ParagraphBlock], candidates: &[DetectedCandidate]) -> DeepExtractionRequest {
    let numbered_paragraphs = blocks
        .iter()
        .map(|block| format!("[{}] {}", block.index, block.text))
        .collect::<Vec<_>>()
        .join("\n");

    let pre_detected_summary = candidates
        .iter()
        .map(|c| {
            let kinds: Vec<&str> = c.distinct_kinds().iter().map(|k| k.label()).collect();
            format!(
                "- {} (sources: {}; confidence {})",
                c.canonical_name,
                kinds.join(", "),
                c.best_source_confidence()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    DeepExtractionRequest {
        title: title.to_string(),
        numbered_paragraphs,
        pre_detected_summary,
    }
}

/// Converts extractor mentions into candidates, dropping those below
/// `min_confidence` and repairing paragraph numbers that do not address a block
pub fn external_candidates(
    mentions: Vec<ExtractedMention>,
    blocks: &[ParagraphBlock],
    min_confidence: u8,
) -> Vec<DetectedCandidate> {
    mentions
        .into_iter()
        .filter(|m| m.confidence >= min_confidence)
        .map(|mention| {
            let paragraph = mention
                .paragraph
                .filter(|&p| p < blocks.len())
                .or_else(|| {
                    let needle = mention.name.to_lowercase();
                    blocks.iter().position(|b| b.text.to_lowercase().contains(&needle))
                })
                .unwrap_or(0);

            let position = blocks
                .get(paragraph)
                .and_then(|b| b.text.find(&mention.name))
                .unwrap_or(0);
            let source = DetectionSource::new(
                DetectionSourceKind::ExternalExtraction,
                mention.confidence,
                &mention.name,
                position,
            );

            let mut candidate = DetectedCandidate::new(&mention.name, paragraph, source);
            candidate.brand = mention.brand;
            candidate.model = mention.model;
            if let Some(block) = blocks.get(paragraph) {
                candidate.first_mention = quote_around(&block.text, position);
            }
            candidate
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks() -> Vec<ParagraphBlock> {
        Segmenter::default().segment(
            "<h2>Top picks</h2><p>The Sony WH-1000XM5 is quiet.</p><p>We also liked the Bose QuietComfort Ultra.</p>",
        )
    }

    fn mention(name: &str, paragraph: Option<usize>, confidence: u8) -> ExtractedMention {
        ExtractedMention {
            name: name.to_string(),
            brand: None,
            model: None,
            search_query: None,
            paragraph,
            confidence,
        }
    }

    #[test]
    fn test_deep_request_numbers_paragraphs_by_index() {
        let blocks = blocks();
        let candidate = DetectedCandidate::new(
            "Sony WH-1000XM5",
            1,
            DetectionSource::new(DetectionSourceKind::BrandModelPattern, 80, "Sony WH-1000XM5", 4),
        );

        let request = build_deep_request("Headphones", &blocks, &[candidate]);
        assert_eq!(
            request.numbered_paragraphs,
            "[0] Top picks\n[1] The Sony WH-1000XM5 is quiet.\n[2] We also liked the Bose QuietComfort Ultra."
        );
        assert_eq!(
            request.pre_detected_summary,
            "- Sony WH-1000XM5 (sources: brand-model-pattern; confidence 80)"
        );
    }

    #[test]
    fn test_external_candidates_filter_and_repair_paragraphs() {
        let blocks = blocks();
        let mentions = vec![
            mention("Bose QuietComfort Ultra", Some(42), 90),
            mention("Sony WH-1000XM5", Some(1), 70),
            mention("Mystery Gadget", None, 60),
            mention("Weak Guess", Some(1), 49),
        ];

        let candidates = external_candidates(mentions, &blocks, 50);
        assert_eq!(candidates.len(), 3);

        assert_eq!(candidates[0].first_paragraph(), 2);
        assert_eq!(candidates[0].first_mention, "We also liked the Bose QuietComfort Ultra.");
        assert_eq!(candidates[0].sources[0].kind, DetectionSourceKind::ExternalExtraction);
        assert_eq!(candidates[0].sources[0].confidence, 90);
        assert_eq!(candidates[1].first_paragraph(), 1);
        assert_eq!(candidates[2].first_paragraph(), 0);
        assert_eq!(candidates[2].confidence, None);
    }

    #[test]
    fn test_external_queries_are_rebuilt_on_merge() {
        let blocks = blocks();
        let mut sony = mention("Sony WH-1000XM5 wireless headphones", Some(1), 80);
        sony.brand = Some("Sony".to_string());
        sony.model = Some("WH-1000XM5".to_string());
        sony.search_query = Some("best noise cancelling headphones".to_string());

        let merged = merge_candidates(external_candidates(vec![sony], &blocks, 50));
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].search_query, "Sony WH-1000XM5");
    }
}
