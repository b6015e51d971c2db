use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One segmented unit of article content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParagraphBlock {
    pub index: usize,
    pub markup: String,
    pub text: String,
    pub is_heading: bool,
    pub heading_level: Option<u8>,
    pub has_emphasis: bool,
    pub has_list: bool,
    pub has_link: bool,
    pub has_image: bool,
    pub has_price_like: bool,
    pub has_rating_like: bool,
    /// Byte offset of `markup` inside the raw document
    pub start: usize,
    pub end: usize,
}

impl ParagraphBlock {
    pub fn contains_offset(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionSourceKind {
    LinkId,
    AnchorText,
    Heading,
    Emphasis,
    NumberedList,
    BrandModelPattern,
    StandalonePattern,
    ModelNumberPattern,
    ExternalExtraction,
    Contextual,
}

impl DetectionSourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            DetectionSourceKind::LinkId => "link-id",
            DetectionSourceKind::AnchorText => "anchor-text",
            DetectionSourceKind::Heading => "heading",
            DetectionSourceKind::Emphasis => "emphasis",
            DetectionSourceKind::NumberedList => "numbered-list",
            DetectionSourceKind::BrandModelPattern => "brand-model-pattern",
            DetectionSourceKind::StandalonePattern => "standalone-pattern",
            DetectionSourceKind::ModelNumberPattern => "model-number-pattern",
            DetectionSourceKind::ExternalExtraction => "external-extraction",
            DetectionSourceKind::Contextual => "contextual",
        }
    }
}

/// One piece of evidence for a candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSource {
    pub kind: DetectionSourceKind,
    pub confidence: u8,
    pub matched_text: String,
    pub position: usize,
}

impl DetectionSource {
    pub fn new(kind: DetectionSourceKind, confidence: u8, matched_text: &str, position: usize) -> Self {
        Self {
            kind,
            confidence: confidence.min(100),
            matched_text: matched_text.to_string(),
            position,
        }
    }
}

/// A provisional, unverified product mention.
///
/// `confidence` stays `None` until the calibrator runs; once set it is never
/// recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedCandidate {
    pub canonical_name: String,
    pub name_variants: Vec<String>,
    pub identifier: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub category: Option<String>,
    pub paragraph_indices: BTreeSet<usize>,
    pub sources: Vec<DetectionSource>,
    pub confidence: Option<u8>,
    pub search_query: String,
    pub first_mention: String,
    pub placement_index: usize,
}

impl DetectedCandidate {
    pub fn new(name: &str, paragraph_index: usize, source: DetectionSource) -> Self {
        let name = name.trim().to_string();
        Self {
            canonical_name: name.clone(),
            name_variants: vec![name.clone()],
            identifier: None,
            brand: None,
            model: None,
            category: None,
            paragraph_indices: BTreeSet::from([paragraph_index]),
            sources: vec![source],
            confidence: None,
            search_query: name,
            first_mention: String::new(),
            placement_index: paragraph_index,
        }
    }

    pub fn add_variant(&mut self, name: &str) {
        let name = name.trim();
        if !name.is_empty() && !self.name_variants.iter().any(|v| v == name) {
            self.name_variants.push(name.to_string());
        }
    }

    pub fn has_kind(&self, kind: DetectionSourceKind) -> bool {
        self.sources.iter().any(|s| s.kind == kind)
    }

    pub fn distinct_kinds(&self) -> BTreeSet<DetectionSourceKind> {
        self.sources.iter().map(|s| s.kind).collect()
    }

    pub fn best_source_confidence(&self) -> u8 {
        self.sources.iter().map(|s| s.confidence).max().unwrap_or(0)
    }

    /// Calibrated confidence, or 0 while uncalibrated
    pub fn score(&self) -> u8 {
        self.confidence.unwrap_or(0)
    }

    pub fn first_paragraph(&self) -> usize {
        self.paragraph_indices.iter().next().copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

/// Final, verified output record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedProduct {
    pub id: String,
    pub title: String,
    pub identifier: String,
    pub price: String,
    pub image_url: String,
    pub rating: f32,
    pub review_count: u32,
    pub brand: String,
    pub category: String,
    pub description: String,
    pub claims: Vec<String>,
    pub faqs: Vec<FaqEntry>,
    pub confidence: u8,
    pub first_mention: String,
    pub placement_index: usize,
    pub verified_at: DateTime<Utc>,
}

/// Record returned by the marketplace lookup collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductData {
    pub identifier: Option<String>,
    pub title: String,
    pub price: Option<String>,
    pub image_url: Option<String>,
    pub rating: Option<f32>,
    pub review_count: Option<u32>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Review,
    Comparison,
    BuyingGuide,
    Listicle,
    HowTo,
    News,
    #[default]
    General,
}

impl ContentType {
    /// Lenient parse of a free-form classification label
    pub fn from_label(label: &str) -> Self {
        let normalized: String = label
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();

        match normalized.as_str() {
            "review" | "productreview" | "singlereview" => ContentType::Review,
            "comparison" | "versus" | "vs" => ContentType::Comparison,
            "buyingguide" | "guide" | "bestof" | "roundup" => ContentType::BuyingGuide,
            "listicle" | "list" | "toplist" => ContentType::Listicle,
            "howto" | "tutorial" => ContentType::HowTo,
            "news" | "announcement" => ContentType::News,
            _ => ContentType::General,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonGroup {
    pub id: String,
    pub title: String,
    pub product_ids: Vec<String>,
    pub criteria: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub products: Vec<VerifiedProduct>,
    pub comparison: Option<ComparisonGroup>,
    pub content_type: ContentType,
    pub candidate_count: usize,
}
