use regex::Regex;
use std::sync::LazyLock;

use crate::models::{DetectedCandidate, DetectionSourceKind, ParagraphBlock};
use crate::processor::brand_catalog::BrandCatalog;
use crate::processor::context_scorer::ContextScorer;

pub const MIN_CONFIDENCE: u32 = 5;
pub const MAX_CONFIDENCE: u32 = 100;

static ACRONYM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z]{2,}").unwrap());

/// Per-component breakdown of a calibrated score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub source_quality: u32,
    pub brand_recognition: u32,
    pub name_quality: u32,
    pub contextual: u32,
    pub mention_frequency: u32,
    pub multi_source: u32,
}

impl ScoreBreakdown {
    /// Sum of all components clamped to [5, 100]
    pub fn total(&self) -> u8 {
        let sum = self.source_quality
            + self.brand_recognition
            + self.name_quality
            + self.contextual
            + self.mention_frequency
            + self.multi_source;

        sum.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE) as u8
    }
}

/// Turns heterogeneous detection evidence into one 0–100 confidence
pub struct ConfidenceCalibrator {
    catalog: BrandCatalog,
    scorer: ContextScorer,
}

impl ConfidenceCalibrator {
    pub fn new() -> Self {
        Self {
            catalog: BrandCatalog,
            scorer: ContextScorer,
        }
    }

    pub fn breakdown(&self, candidate: &DetectedCandidate, blocks: &[ParagraphBlock]) -> ScoreBreakdown {
        ScoreBreakdown {
            source_quality: self.source_quality(candidate),
            brand_recognition: self.brand_recognition(candidate),
            name_quality: self.name_quality(&candidate.canonical_name),
            contextual: self.scorer.signal_for(&candidate.paragraph_indices, blocks),
            mention_frequency: (candidate.paragraph_indices.len() as u32 * 3).min(10),
            multi_source: match candidate.distinct_kinds().len() {
                0 | 1 => 0,
                2 => 5,
                _ => 10,
            },
        }
    }

    pub fn score(&self, candidate: &DetectedCandidate, blocks: &[ParagraphBlock]) -> u8 {
        self.breakdown(candidate, blocks).total()
    }

    /// Calibrates every candidate that has no confidence yet and picks its placement paragraph
    pub fn calibrate_all(&self, candidates: &mut [DetectedCandidate], blocks: &[ParagraphBlock]) {
        for candidate in candidates.iter_mut() {
            if candidate.confidence.is_none() {
                candidate.confidence = Some(self.score(candidate, blocks));
            }
            candidate.placement_index = self.select_placement(candidate, blocks);
        }
    }

    /// First heading the candidate appears in, otherwise its strongest paragraph
    /// (earliest wins ties). Always a valid index when `blocks` is non-empty.
    pub fn select_placement(&self, candidate: &DetectedCandidate, blocks: &[ParagraphBlock]) -> usize {
        let valid: Vec<&ParagraphBlock> = candidate
            .paragraph_indices
            .iter()
            .filter_map(|&i| blocks.get(i))
            .collect();

        if let Some(heading) = valid.iter().find(|block| block.is_heading) {
            return heading.index;
        }

        let mut best: Option<(&ParagraphBlock, u32)> = None;
        for block in valid {
            let score = self.scorer.score(block);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((block, score));
            }
        }

        best.map(|(block, _)| block.index).unwrap_or(0)
    }

    fn source_quality(&self, candidate: &DetectedCandidate) -> u32 {
        if candidate.identifier.is_some() || candidate.has_kind(DetectionSourceKind::LinkId) {
            return 40;
        }

        match candidate.best_source_confidence() {
            90..=u8::MAX => 35,
            80..=89 => 28,
            70..=79 => 20,
            _ => 12,
        }
    }

    fn brand_recognition(&self, candidate: &DetectedCandidate) -> u32 {
        match candidate.brand.as_deref().map(str::trim) {
            Some(brand) if self.catalog.is_known(brand) => 15,
            Some(brand) if !brand.is_empty() => 8,
            _ => 0,
        }
    }

    fn name_quality(&self, name: &str) -> u32 {
        let mut score = 0;

        if name.chars().any(|c| c.is_ascii_digit()) {
            score += 7;
        }

        if ACRONYM.is_match(name) {
            score += 4;
        }

        let words = name.split_whitespace().count();
        if (2..=6).contains(&words) {
            score += 4;
        }

        score
    }
}

impl Default for ConfidenceCalibrator {
    fn default() -> Self {
        Self::new()
    }
}
