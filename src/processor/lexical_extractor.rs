use anyhow::{Context, Result};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

use crate::models::{DetectedCandidate, DetectionSource, DetectionSourceKind, ParagraphBlock};
use crate::processor::brand_catalog::{
    BRANDS, BrandCatalog, BrandEntry, STANDALONE_PATTERNS, StandalonePattern,
};
use crate::processor::merger::normalized_key;
use crate::processor::segmenter::{collapse_whitespace, quote_around};

const STANDALONE_CONFIDENCE: u8 = 85;
const BRAND_MODEL_CONFIDENCE: u8 = 80;
const NUMBERED_LIST_CONFIDENCE: u8 = 75;
const HEADING_CONFIDENCE: u8 = 70;
const MODEL_NUMBER_CONFIDENCE: u8 = 65;
const EMPHASIS_CONFIDENCE: u8 = 60;
const CONTEXTUAL_CONFIDENCE: u8 = 55;

const MIN_STANDALONE_LEN: usize = 4;
const BRAND_MODEL_LEN: (usize, usize) = (5, 70);
const EMPHASIS_LEN: (usize, usize) = (5, 80);
const EMPHASIS_MAX_WORDS: usize = 8;
const HEADING_MAX_WORDS: usize = 10;

const LINKING_WORDS: &[&str] = &[
    "is", "are", "was", "were", "features", "offers", "has", "have", "review", "reviews", "comes",
    "delivers", "provides", "includes", "and", "or", "vs", "versus", "with", "for", "from", "at",
    "in", "on", "which", "that", "costs", "sells",
];

const NAME_STOPWORDS: &[&str] = &[
    "the", "this", "that", "these", "those", "a", "an", "our", "my", "your", "it", "its", "we", "i",
    "you", "in", "on", "at", "for", "from", "since", "over", "under", "about", "around", "only",
    "just", "top", "best", "chapter", "page", "part", "step", "section", "figure", "table", "note",
    "tip", "update", "warning", "important", "pros", "cons", "verdict", "bottom", "editor",
    "disclosure", "why", "how", "what", "and", "or", "with", "after", "before", "every", "each",
];

static MODEL_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)?)\s+((?:[A-Z]{1,4}-?)?\d{2,5}[A-Za-z0-9]{0,4}(?:-\d{1,3})?)\b(?:\s+(Pro|Max|Plus|Ultra|Mini|SE|Gen\s?\d+)\b)?",
    )
    .unwrap()
});
static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?:19|20)\d{2}$").unwrap());
static YEAR_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());
static ORDINAL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:#?\d{1,2}\s*[.):\-]?\s+|no\.\s*\d{1,2}\s*[.:)]?\s+|[ivx]{1,4}\.\s+|[-•*]\s+)")
        .unwrap()
});
static LEAD_IN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:best|top|runner[- ]up|budget|premium|upgrade|our|editor'?s)\b[^:]{0,40}:\s*")
        .unwrap()
});
static DESCRIPTIVE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\s*[-–—|:,]\s*(?:(?:a|the|our|full|in-depth|hands-on|detailed|quick|long-term)\s+)*(?:review|verdict|overview|pros and cons|specs|first look|impressions|best\b.*|our pick.*|runner.up.*|great for.*|ideal for.*|perfect for.*).*$",
    )
    .unwrap()
});
static DASH_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+[–—|]\s+.*$|\s+-\s+.*$").unwrap());
static GENERIC_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:the\s+)?(?:\d+\s+)?(?:best|top|how|why|what|which|when|where|who|our|final|conclusion|faq|frequently|summary|bottom line|verdict|pros|cons|specs|features|price|pricing|comparison|table of contents|introduction|overview)\b|\?",
    )
    .unwrap()
});
static CAP_ALNUM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[A-Za-z]*[A-Z][A-Za-z]*\d[A-Za-z0-9]*|\d+[A-Z][A-Za-z0-9]*|[a-z]+[A-Z][A-Za-z0-9]*|[A-Z][a-z]+[A-Z][A-Za-z0-9]*)\b")
        .unwrap()
});
static EMPHASIS_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("strong, b, em").unwrap());

/// A single match produced by one strategy inside one block
#[derive(Debug, Clone)]
struct Mention {
    name: String,
    kind: DetectionSourceKind,
    confidence: u8,
    position: usize,
    brand: Option<String>,
    model: Option<String>,
    category: Option<String>,
}

impl Mention {
    fn new(name: &str, kind: DetectionSourceKind, confidence: u8, position: usize) -> Self {
        Self {
            name: collapse_whitespace(name),
            kind,
            confidence,
            position,
            brand: None,
            model: None,
            category: None,
        }
    }

    fn with_brand_entry(mut self, entry: Option<&BrandEntry>) -> Self {
        if let Some(entry) = entry {
            self.brand = Some(entry.display.to_string());
            self.category = Some(entry.category.to_string());
        }
        self
    }
}

struct CompiledStandalone {
    regex: Regex,
    pattern: &'static StandalonePattern,
}

struct CompiledBrandPattern {
    regex: Regex,
    entry: &'static BrandEntry,
}

/// In-stage deduplication by normalized key, preserving discovery order
#[derive(Default)]
struct CandidateAccumulator {
    candidates: Vec<DetectedCandidate>,
    by_key: HashMap<String, usize>,
}

impl CandidateAccumulator {
    /// Returns the key the mention was filed under
    fn record(&mut self, mention: Mention, block: &ParagraphBlock) -> Option<String> {
        let key = normalized_key(&mention.name);
        if key.is_empty() {
            return None;
        }

        let source =
            DetectionSource::new(mention.kind, mention.confidence, &mention.name, mention.position);

        match self.by_key.get(&key) {
            Some(&slot) => {
                let candidate = &mut self.candidates[slot];
                candidate.add_variant(&mention.name);
                candidate.paragraph_indices.insert(block.index);
                candidate.sources.push(source);
                if candidate.brand.is_none() {
                    candidate.brand = mention.brand;
                }
                if candidate.model.is_none() {
                    candidate.model = mention.model;
                }
                if candidate.category.is_none() {
                    candidate.category = mention.category;
                }
            }
            None => {
                let mut candidate = DetectedCandidate::new(&mention.name, block.index, source);
                candidate.brand = mention.brand;
                candidate.model = mention.model;
                candidate.category = mention.category;
                candidate.first_mention = quote_around(&block.text, mention.position);
                self.by_key.insert(key.clone(), self.candidates.len());
                self.candidates.push(candidate);
            }
        }

        Some(key)
    }

    fn add_contextual(&mut self, key: &str, block: &ParagraphBlock) {
        if let Some(&slot) = self.by_key.get(key) {
            let candidate = &mut self.candidates[slot];
            let name = candidate.canonical_name.clone();
            candidate.sources.push(DetectionSource::new(
                DetectionSourceKind::Contextual,
                CONTEXTUAL_CONFIDENCE,
                &name,
                block.start,
            ));
        }
    }
}

/// Finds product names in segmented text using the brand base and pattern catalogue
pub struct LexicalExtractor {
    standalone: Vec<CompiledStandalone>,
    brand_patterns: Vec<CompiledBrandPattern>,
    catalog: BrandCatalog,
}

impl LexicalExtractor {
    /// Compiles the catalogue tables into matchers
    pub fn new() -> Result<Self> {
        let standalone = STANDALONE_PATTERNS
            .iter()
            .map(|pattern| {
                Regex::new(pattern.pattern)
                    .map(|regex| CompiledStandalone { regex, pattern })
                    .with_context(|| format!("Invalid standalone pattern: {}", pattern.pattern))
            })
            .collect::<Result<Vec<_>>>()?;

        let linkers = LINKING_WORDS.join("|");
        let mut brand_patterns = Vec::new();
        for entry in BRANDS {
            for alias in entry.aliases {
                let pattern = format!(
                    r"\b({alias})\s+([A-Za-z0-9][A-Za-z0-9+./\- ]{{0,49}}?)\s*(?:[,;:!?()\[\]\n–—|]|\.(?:\s|$)|\s+(?:{linkers})\b|$)",
                    alias = regex::escape(alias),
                    linkers = linkers,
                );
                let regex = Regex::new(&pattern)
                    .with_context(|| format!("Invalid brand pattern for alias {}", alias))?;
                brand_patterns.push(CompiledBrandPattern { regex, entry });
            }
        }

        debug!(
            "Compiled {} standalone and {} brand+model patterns",
            standalone.len(),
            brand_patterns.len()
        );

        Ok(Self {
            standalone,
            brand_patterns,
            catalog: BrandCatalog,
        })
    }

    /// Runs every strategy over every block and returns stage-deduplicated candidates
    pub fn extract(&self, blocks: &[ParagraphBlock]) -> Vec<DetectedCandidate> {
        let mut accumulator = CandidateAccumulator::default();

        for block in blocks {
            let mut mentions = Vec::new();
            mentions.extend(self.match_standalone(&block.text));
            mentions.extend(self.match_brand_models(&block.text));
            mentions.extend(self.match_model_numbers(&block.text));

            if let Some(mention) = self.match_heading(block) {
                mentions.push(mention);
            }
            mentions.extend(self.match_emphasis(block));

            let mut touched: Vec<String> = Vec::new();
            for mention in mentions {
                if let Some(key) = accumulator.record(mention, block) {
                    if !touched.contains(&key) {
                        touched.push(key);
                    }
                }
            }

            if block.has_price_like || block.has_rating_like {
                for key in &touched {
                    accumulator.add_contextual(key, block);
                }
            }
        }

        debug!("Lexical extraction produced {} candidates", accumulator.candidates.len());
        accumulator.candidates
    }

    fn match_standalone(&self, text: &str) -> Vec<Mention> {
        let mut mentions = Vec::new();

        for compiled in &self.standalone {
            for found in compiled.regex.find_iter(text) {
                let name = found.as_str().trim();
                if name.chars().count() < MIN_STANDALONE_LEN {
                    continue;
                }

                let mut mention = Mention::new(
                    name,
                    DetectionSourceKind::StandalonePattern,
                    STANDALONE_CONFIDENCE,
                    found.start(),
                );
                mention.brand = compiled.pattern.brand.map(str::to_string);
                mention.category = Some(compiled.pattern.category.to_string());
                mentions.push(mention);
            }
        }

        mentions
    }

    fn match_brand_models(&self, text: &str) -> Vec<Mention> {
        let mut mentions = Vec::new();

        for compiled in &self.brand_patterns {
            for caps in compiled.regex.captures_iter(text) {
                let (Some(alias), Some(model)) = (caps.get(1), caps.get(2)) else { continue };
                let model_text =
                    model.as_str().trim().trim_end_matches(['-', '/', '.', '+']).trim();

                if !looks_like_model(model_text) {
                    continue;
                }

                let name = format!("{} {}", alias.as_str(), model_text);
                let len = name.chars().count();
                if len < BRAND_MODEL_LEN.0 || len > BRAND_MODEL_LEN.1 {
                    continue;
                }

                let mut mention = Mention::new(
                    &name,
                    DetectionSourceKind::BrandModelPattern,
                    BRAND_MODEL_CONFIDENCE,
                    alias.start(),
                )
                .with_brand_entry(Some(compiled.entry));
                mention.model = Some(model_text.to_string());
                mentions.push(mention);
            }
        }

        mentions
    }

    fn match_model_numbers(&self, text: &str) -> Vec<Mention> {
        let mut mentions = Vec::new();

        for caps in MODEL_NUMBER.captures_iter(text) {
            let (Some(words), Some(code)) = (caps.get(1), caps.get(2)) else { continue };

            if YEAR.is_match(code.as_str()) {
                continue;
            }

            let mut prefix: Vec<&str> = words.as_str().split_whitespace().collect();
            let mut position = words.start();
            if prefix.first().copied().is_some_and(is_stopword) {
                prefix.remove(0);
                let Some(second) = prefix.first() else { continue };
                position += words.as_str().rfind(second).unwrap_or(0);
            }
            let Some(first_word) = prefix.first().copied() else { continue };

            let mut name_parts: Vec<&str> = prefix.clone();
            name_parts.push(code.as_str());
            if let Some(qualifier) = caps.get(3) {
                name_parts.push(qualifier.as_str());
            }
            let name = name_parts.join(" ");
            let model = name_parts[1..].join(" ");

            let entry = self.catalog.resolve(first_word);
            let mut mention = Mention::new(
                &name,
                DetectionSourceKind::ModelNumberPattern,
                MODEL_NUMBER_CONFIDENCE,
                position,
            );
            mention.brand = Some(entry.map(|e| e.display).unwrap_or(first_word).to_string());
            mention.category = entry.map(|e| e.category.to_string());
            mention.model = Some(model);
            mentions.push(mention);
        }

        mentions
    }

    fn match_heading(&self, block: &ParagraphBlock) -> Option<Mention> {
        let level = block.heading_level?;
        if !(2..=4).contains(&level) {
            return None;
        }

        let numbered = ORDINAL_PREFIX.is_match(&block.text);
        let name = clean_heading(&block.text);

        if GENERIC_HEADING.is_match(&name)
            || name.split_whitespace().count() > HEADING_MAX_WORDS
            || !is_product_like(&name)
        {
            return None;
        }

        let (kind, confidence) = if numbered {
            (DetectionSourceKind::NumberedList, NUMBERED_LIST_CONFIDENCE)
        } else {
            (DetectionSourceKind::Heading, HEADING_CONFIDENCE)
        };

        let position = block.text.find(&name).unwrap_or(0);
        Some(
            Mention::new(&name, kind, confidence, position)
                .with_brand_entry(self.catalog.find_in_text(&name)),
        )
    }

    fn match_emphasis(&self, block: &ParagraphBlock) -> Vec<Mention> {
        if !block.has_emphasis {
            return Vec::new();
        }

        let fragment = Html::parse_fragment(&block.markup);
        let mut mentions = Vec::new();

        for element in fragment.select(&EMPHASIS_SELECTOR) {
            let text = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
            let text = text.trim_matches(|c: char| !c.is_alphanumeric() && c != ')').to_string();
            let len = text.chars().count();

            if len < EMPHASIS_LEN.0 || len > EMPHASIS_LEN.1 {
                continue;
            }
            if text.split_whitespace().count() > EMPHASIS_MAX_WORDS {
                continue;
            }
            if text.split_whitespace().next().is_some_and(is_stopword) {
                continue;
            }
            if !is_product_like(&text) {
                continue;
            }

            let position = block.text.find(&text).unwrap_or(0);
            mentions.push(
                Mention::new(&text, DetectionSourceKind::Emphasis, EMPHASIS_CONFIDENCE, position)
                    .with_brand_entry(self.catalog.find_in_text(&text)),
            );
        }

        mentions
    }
}

/// A name carrying a capitalization+alphanumeric token, a non-year digit, or a known brand
pub fn is_product_like(name: &str) -> bool {
    let len = name.chars().count();
    if !(3..=80).contains(&len) {
        return false;
    }

    let has_model_digit = YEAR_IN_TEXT.replace_all(name, "").chars().any(|c| c.is_ascii_digit());

    CAP_ALNUM.is_match(name) || has_model_digit || BrandCatalog.find_in_text(name).is_some()
}

/// Strips ordinal prefixes, "Best X:" lead-ins and descriptive suffixes from a heading
pub fn clean_heading(text: &str) -> String {
    let without_ordinal = ORDINAL_PREFIX.replace(text, "");
    let without_lead = LEAD_IN.replace(&without_ordinal, "");
    let without_suffix = DESCRIPTIVE_SUFFIX.replace(&without_lead, "");
    let without_tail = DASH_TAIL.replace(&without_suffix, "");

    without_tail
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric() && c != ')' && c != '+')
        .to_string()
}

fn is_stopword(word: &str) -> bool {
    NAME_STOPWORDS.contains(&word.to_lowercase().as_str())
}

/// Model tokens must carry a digit, an all-caps run or inner capitals, and
/// start like a name rather than a sentence continuation
fn looks_like_model(token: &str) -> bool {
    let Some(first_word) = token.split_whitespace().next() else { return false };

    let starts_like_name = first_word
        .chars()
        .next()
        .is_some_and(|c| c.is_uppercase() || c.is_ascii_digit())
        || first_word.chars().any(char::is_uppercase);
    if !starts_like_name || LINKING_WORDS.contains(&first_word.to_lowercase().as_str()) {
        return false;
    }

    token.chars().any(|c| c.is_ascii_digit())
        || token.split_whitespace().any(|word| {
            word.chars().filter(|c| c.is_uppercase()).count() >= 2
                || word
                    .chars()
                    .zip(word.chars().skip(1))
                    .any(|(a, b)| a.is_lowercase() && b.is_uppercase())
        })
}
