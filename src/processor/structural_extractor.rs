use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

use crate::models::{DetectedCandidate, DetectionSource, DetectionSourceKind, ParagraphBlock};
use crate::processor::brand_catalog::BrandCatalog;
use crate::processor::lexical_extractor::is_product_like;
use crate::processor::merger::normalized_key;
use crate::processor::segmenter::{quote_around, strip_markup};

const LINK_ID_CONFIDENCE: u8 = 100;
const ANCHOR_TEXT_CONFIDENCE: u8 = 75;
const MAX_ANCHOR_NAME_LEN: usize = 100;

const CALL_TO_ACTION: &[&str] = &[
    "buy on amazon",
    "buy now",
    "buy it now",
    "check price",
    "see price",
    "view on amazon",
    "shop now",
    "view deal",
    "see deal",
    "check availability",
    "add to cart",
    "click here",
    "read more",
    "here",
];

static ANCHOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a\s*>").unwrap());
static HREF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?i)\bhref\s*=\s*["']([^"']+)["']"#).unwrap());
static DETAIL_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"/(?i:dp|gp/product)/([A-Z0-9]{8,12})(?:[/?#&"']|$)"#).unwrap()
});
static ID_SEGMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"/(B0[A-Z0-9]{8})(?:[/?#&"']|$)"#).unwrap());
static DATA_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i:\bdata-(?:asin|product-id))\s*=\s*["']([A-Z0-9]{8,12})["']"#).unwrap()
});
static MARKETPLACE_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:(?:https?:)?//)?(?:[a-z0-9-]+\.)*(?:amazon\.[a-z.]+|amzn\.to|amzn\.com|a\.co)(?:[/?#]|$)",
    )
    .unwrap()
});
static BARE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:https?://|//|\bwww\.)[^\s"'<>]+"#).unwrap()
});

/// Marketplace codes are upper-case alphanumerics carrying at least one digit
fn is_product_code(id: &str) -> bool {
    id.bytes().any(|b| b.is_ascii_digit())
}

/// Identifier found in a URL: a detail path on a marketplace host, then a bare identifier segment
pub fn identifier_in_url(url: &str) -> Option<String> {
    let detail = MARKETPLACE_HOST
        .is_match(url)
        .then(|| DETAIL_PATH.captures(url))
        .flatten()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|id| is_product_code(id));

    detail
        .or_else(|| ID_SEGMENT.captures(url).and_then(|caps| caps.get(1)).map(|m| m.as_str()))
        .map(str::to_string)
}

/// Index of the block whose markup contains `offset`, else the nearest preceding block
pub fn block_for_offset(blocks: &[ParagraphBlock], offset: usize) -> usize {
    blocks
        .iter()
        .find(|block| block.contains_offset(offset))
        .or_else(|| blocks.iter().filter(|block| block.start <= offset).last())
        .map(|block| block.index)
        .unwrap_or(0)
}

fn is_call_to_action(text: &str) -> bool {
    let lowered = text.to_lowercase();
    let lowered = lowered.trim_matches(|c: char| !c.is_alphanumeric());
    CALL_TO_ACTION
        .iter()
        .any(|phrase| lowered == *phrase || (phrase.contains(' ') && lowered.len() <= 40 && lowered.starts_with(phrase)))
}

fn usable_anchor_name(text: &str) -> Option<&str> {
    let text = text.trim();
    let len = text.chars().count();
    if len < 3 || len > MAX_ANCHOR_NAME_LEN || is_call_to_action(text) || text.contains("://") {
        return None;
    }
    Some(text)
}

/// Mines marketplace identifiers and marketplace anchor text from raw markup
#[derive(Default)]
pub struct StructuralExtractor {
    catalog: BrandCatalog,
}

#[derive(Default)]
struct Collected {
    entries: Vec<(usize, DetectedCandidate)>,
    by_identifier: HashMap<String, usize>,
    by_anchor_key: HashMap<String, usize>,
}

impl StructuralExtractor {
    pub fn new() -> Self {
        Self { catalog: BrandCatalog }
    }

    pub fn extract(&self, html: &str, blocks: &[ParagraphBlock]) -> Vec<DetectedCandidate> {
        if blocks.is_empty() {
            return Vec::new();
        }

        let mut collected = Collected::default();

        for caps in ANCHOR.captures_iter(html) {
            let (Some(whole), Some(attrs), Some(inner)) = (caps.get(0), caps.get(1), caps.get(2)) else {
                continue;
            };
            let Some(href) = HREF.captures(attrs.as_str()).and_then(|c| c.get(1)) else { continue };
            let anchor_text = strip_markup(inner.as_str());

            match identifier_in_url(href.as_str()) {
                Some(identifier) => {
                    let name = usable_anchor_name(&anchor_text);
                    self.record_identifier(&mut collected, identifier, name, whole.start(), blocks);
                }
                None if MARKETPLACE_HOST.is_match(href.as_str()) => {
                    if let Some(name) = usable_anchor_name(&anchor_text).filter(|n| is_product_like(n)) {
                        self.record_anchor_text(&mut collected, name, whole.start(), blocks);
                    }
                }
                None => {}
            }
        }

        // identifiers outside anchors: bare URLs, image sources, data attributes
        for url in BARE_URL.find_iter(html) {
            if let Some(identifier) = identifier_in_url(url.as_str()) {
                self.record_identifier(&mut collected, identifier, None, url.start(), blocks);
            }
        }
        for regex in [&*ID_SEGMENT, &*DATA_ID] {
            for caps in regex.captures_iter(html) {
                let Some(id) = caps.get(1).filter(|id| is_product_code(id.as_str())) else { continue };
                self.record_identifier(&mut collected, id.as_str().to_string(), None, id.start(), blocks);
            }
        }

        let mut entries = collected.entries;
        entries.sort_by_key(|(offset, _)| *offset);
        let candidates: Vec<DetectedCandidate> = entries.into_iter().map(|(_, candidate)| candidate).collect();

        debug!(
            "Structural extraction found {} candidates ({} with identifiers)",
            candidates.len(),
            candidates.iter().filter(|c| c.identifier.is_some()).count()
        );

        candidates
    }

    fn record_identifier(
        &self,
        collected: &mut Collected,
        identifier: String,
        name: Option<&str>,
        offset: usize,
        blocks: &[ParagraphBlock],
    ) {
        let block_index = block_for_offset(blocks, offset);

        if let Some(&slot) = collected.by_identifier.get(&identifier) {
            let candidate = &mut collected.entries[slot].1;
            candidate.paragraph_indices.insert(block_index);
            if let Some(name) = name {
                candidate.add_variant(name);
                if candidate.canonical_name == identifier {
                    candidate.canonical_name = name.to_string();
                    candidate.search_query = name.to_string();
                    candidate.first_mention = self.first_mention(blocks, block_index, name);
                    self.apply_brand(candidate);
                }
            }
            return;
        }

        let label = name.unwrap_or(&identifier);
        let source = DetectionSource::new(DetectionSourceKind::LinkId, LINK_ID_CONFIDENCE, label, offset);
        let mut candidate = DetectedCandidate::new(label, block_index, source);
        candidate.identifier = Some(identifier.clone());
        candidate.first_mention = self.first_mention(blocks, block_index, label);
        self.apply_brand(&mut candidate);

        collected.by_identifier.insert(identifier, collected.entries.len());
        collected.entries.push((offset, candidate));
    }

    fn record_anchor_text(&self, collected: &mut Collected, name: &str, offset: usize, blocks: &[ParagraphBlock]) {
        let block_index = block_for_offset(blocks, offset);
        let key = normalized_key(name);

        if let Some(&slot) = collected.by_anchor_key.get(&key) {
            let candidate = &mut collected.entries[slot].1;
            candidate.paragraph_indices.insert(block_index);
            candidate.add_variant(name);
            return;
        }

        let source = DetectionSource::new(DetectionSourceKind::AnchorText, ANCHOR_TEXT_CONFIDENCE, name, offset);
        let mut candidate = DetectedCandidate::new(name, block_index, source);
        candidate.first_mention = self.first_mention(blocks, block_index, name);
        self.apply_brand(&mut candidate);

        collected.by_anchor_key.insert(key, collected.entries.len());
        collected.entries.push((offset, candidate));
    }

    fn apply_brand(&self, candidate: &mut DetectedCandidate) {
        if let Some(entry) = self.catalog.find_in_text(&candidate.canonical_name) {
            candidate.brand = Some(entry.display.to_string());
            candidate.category = Some(entry.category.to_string());
        }
    }

    fn first_mention(&self, blocks: &[ParagraphBlock], block_index: usize, name: &str) -> String {
        blocks
            .get(block_index)
            .map(|block| quote_around(&block.text, block.text.find(name).unwrap_or(0)))
            .unwrap_or_default()
    }
}
