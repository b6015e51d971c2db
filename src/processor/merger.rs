use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

use crate::models::DetectedCandidate;

/// Similarity at or above which two candidates are the same product
pub const MERGE_THRESHOLD: f64 = 0.6;
const CONTAINMENT_BONUS: f64 = 0.3;
const KEY_MAX_WORDS: usize = 5;
const QUERY_MAX_WORDS: usize = 7;

const QUERY_STOPWORDS: &[&str] = &[
    "the", "a", "an", "new", "best", "top", "review", "our", "my", "your", "this", "that", "with",
    "for",
];

static POSSESSIVE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)['’]s\b").unwrap());
static PARENTHETICAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]").unwrap());
static DASHES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+-+\s+|[–—]").unwrap());

/// Lower-cased, punctuation-free, whitespace-collapsed name limited to its first five words
pub fn normalized_key(name: &str) -> String {
    let lowered = name.to_lowercase();
    let without_possessive = POSSESSIVE.replace_all(&lowered, "");

    let cleaned: String = without_possessive
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    cleaned
        .split_whitespace()
        .take(KEY_MAX_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Jaccard similarity of the normalized word sets, plus 0.3 when one key
/// contains the other, capped at 1.0
pub fn similarity(a: &str, b: &str) -> f64 {
    let key_a = normalized_key(a);
    let key_b = normalized_key(b);

    let words_a: HashSet<&str> = key_a.split_whitespace().collect();
    let words_b: HashSet<&str> = key_b.split_whitespace().collect();

    let union = words_a.union(&words_b).count();
    let jaccard = if union == 0 {
        0.0
    } else {
        words_a.intersection(&words_b).count() as f64 / union as f64
    };

    let contained = !key_a.is_empty()
        && !key_b.is_empty()
        && (key_a.contains(key_b.as_str()) || key_b.contains(key_a.as_str()));
    let bonus = if contained { CONTAINMENT_BONUS } else { 0.0 };

    (jaccard + bonus).min(1.0)
}

/// Folds `other` into `primary`
pub fn absorb(primary: &mut DetectedCandidate, other: DetectedCandidate) {
    if other.canonical_name.chars().count() > primary.canonical_name.chars().count() {
        primary.canonical_name = other.canonical_name.clone();
    }

    for variant in &other.name_variants {
        primary.add_variant(variant);
    }

    if other.first_paragraph() < primary.first_paragraph() && !other.first_mention.is_empty() {
        primary.first_mention = other.first_mention;
    } else if primary.first_mention.is_empty() {
        primary.first_mention = other.first_mention;
    }

    primary.sources.extend(other.sources);
    primary.paragraph_indices.extend(other.paragraph_indices);
    primary.identifier = primary.identifier.take().or(other.identifier);
    primary.brand = primary.brand.take().or(other.brand);
    primary.model = primary.model.take().or(other.model);

    if primary.category.as_deref().is_none_or(str::is_empty) {
        primary.category = other.category;
    }
}

/// Consolidates near-duplicate candidates.
///
/// Single left-to-right pass: every unconsumed candidate absorbs each later
/// candidate matching its *own original* name or identifier. Matches reached
/// only through an absorbed candidate are not followed, so the grouping is
/// not a transitive closure.
pub fn merge_candidates(candidates: Vec<DetectedCandidate>) -> Vec<DetectedCandidate> {
    let input_len = candidates.len();
    let mut slots: Vec<Option<DetectedCandidate>> = candidates.into_iter().map(Some).collect();
    let mut merged = Vec::new();

    for i in 0..slots.len() {
        let Some(mut primary) = slots[i].take() else { continue };
        let anchor_name = primary.canonical_name.clone();
        let anchor_identifier = primary.identifier.clone();

        for slot in slots.iter_mut().skip(i + 1) {
            let matches = match slot.as_ref() {
                Some(other) => {
                    let same_identifier = anchor_identifier.is_some() && anchor_identifier == other.identifier;
                    same_identifier || similarity(&anchor_name, &other.canonical_name) >= MERGE_THRESHOLD
                }
                None => false,
            };

            if matches {
                if let Some(other) = slot.take() {
                    absorb(&mut primary, other);
                }
            }
        }

        merged.push(primary);
    }

    for candidate in merged.iter_mut() {
        candidate.search_query = build_search_query(candidate);
    }

    debug!("Merged {} candidates into {}", input_len, merged.len());
    merged
}

/// Marketplace search query for a candidate
pub fn build_search_query(candidate: &DetectedCandidate) -> String {
    if let (Some(brand), Some(model)) = (candidate.brand.as_deref(), candidate.model.as_deref()) {
        let brand = brand.trim();
        let model = model.trim();
        if !brand.is_empty() && !model.is_empty() {
            return if model.to_lowercase().starts_with(&brand.to_lowercase()) {
                model.to_string()
            } else {
                format!("{} {}", brand, model)
            };
        }
    }

    let without_asides = PARENTHETICAL.replace_all(&candidate.canonical_name, " ");
    let without_dashes = DASHES.replace_all(&without_asides, " ");

    without_dashes
        .split_whitespace()
        .filter(|word| !QUERY_STOPWORDS.contains(&word.to_lowercase().as_str()))
        .take(QUERY_MAX_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DetectionSource, DetectionSourceKind};

    fn candidate(name: &str, paragraph: usize) -> DetectedCandidate {
        DetectedCandidate::new(
            name,
            paragraph,
            DetectionSource::new(DetectionSourceKind::Heading, 70, name, 0),
        )
    }

    fn covered_names(candidates: &[DetectedCandidate]) -> Vec<Vec<String>> {
        let mut groups: Vec<Vec<String>> = candidates
            .iter()
            .map(|c| {
                let mut names = c.name_variants.clone();
                names.sort();
                names
            })
            .collect();
        groups.sort();
        groups
    }

    #[test]
    fn test_normalized_key() {
        assert_eq!(normalized_key("Sony's WH-1000XM5!"), "sony wh1000xm5");
        assert_eq!(normalized_key("  The   Apple  iPhone 15 Pro Max (256GB) "), "the apple iphone 15 pro");
        assert_eq!(normalized_key("Dyson’s V15"), "dyson v15");
        assert_eq!(normalized_key("---"), "");
    }

    #[test]
    fn test_similarity() {
        assert_eq!(similarity("Sony WH-1000XM5", "sony wh1000xm5"), 1.0);
        assert_eq!(similarity("Bose QC45", "Dyson V15"), 0.0);
        assert_eq!(similarity("", ""), 0.0);

        // 2/3 overlap plus containment bonus
        let sim = similarity("Sony WH-1000XM5", "Sony WH-1000XM5 Headphones");
        assert!((sim - (2.0 / 3.0 + 0.3)).abs() < 1e-9);

        // Jaccard 1/3, no containment
        let sim = similarity("Sony WH-1000XM5", "WH-1000XM5 Headphones");
        assert!((sim - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_combines_fields() {
        let mut first = candidate("Dyson V15", 3);
        first.brand = Some("Dyson".to_string());
        first.first_mention = "Later mention of the Dyson V15.".to_string();

        let mut second = candidate("Dyson V15 Detect", 1);
        second.identifier = Some("B0TESTV150".to_string());
        second.category = Some("Home Appliances".to_string());
        second.first_mention = "Early mention of the Dyson V15 Detect.".to_string();

        let merged = merge_candidates(vec![first, second]);
        assert_eq!(merged.len(), 1);

        let product = &merged[0];
        assert_eq!(product.canonical_name, "Dyson V15 Detect");
        assert_eq!(product.identifier.as_deref(), Some("B0TESTV150"));
        assert_eq!(product.brand.as_deref(), Some("Dyson"));
        assert_eq!(product.category.as_deref(), Some("Home Appliances"));
        assert_eq!(product.paragraph_indices.iter().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(product.sources.len(), 2);
        assert_eq!(product.name_variants, vec!["Dyson V15", "Dyson V15 Detect"]);
        assert_eq!(product.first_mention, "Early mention of the Dyson V15 Detect.");
    }

    #[test]
    fn test_merge_on_shared_identifier() {
        let mut first = candidate("B0ABCDEF12", 0);
        first.identifier = Some("B0ABCDEF12".to_string());
        let mut second = candidate("Completely Different Name", 4);
        second.identifier = Some("B0ABCDEF12".to_string());

        let merged = merge_candidates(vec![first, second]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].canonical_name, "Completely Different Name");
    }

    #[test]
    fn test_merge_membership_is_commutative() {
        let a = candidate("Bose QuietComfort Ultra", 0);
        let b = candidate("Bose QuietComfort Ultra Headphones", 2);

        let forward = merge_candidates(vec![a.clone(), b.clone()]);
        let backward = merge_candidates(vec![b, a]);

        assert_eq!(forward.len(), 1);
        assert_eq!(backward.len(), 1);
        assert_eq!(covered_names(&forward), covered_names(&backward));
        assert_eq!(forward[0].canonical_name, backward[0].canonical_name);
    }

    #[test]
    fn test_single_pass_is_not_transitive() {
        let a = candidate("Sony WH-1000XM5", 0);
        let b = candidate("Sony WH-1000XM5 Headphones", 1);
        let c = candidate("WH-1000XM5 Headphones", 2);

        assert!(similarity(&a.canonical_name, &b.canonical_name) >= MERGE_THRESHOLD);
        assert!(similarity(&b.canonical_name, &c.canonical_name) >= MERGE_THRESHOLD);
        assert!(similarity(&a.canonical_name, &c.canonical_name) < MERGE_THRESHOLD);

        let merged = merge_candidates(vec![a, b, c]);

        // A absorbs B; C only matched B, so it stays on its own
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].canonical_name, "Sony WH-1000XM5 Headphones");
        assert_eq!(merged[0].name_variants.len(), 2);
        assert_eq!(merged[1].canonical_name, "WH-1000XM5 Headphones");
    }

    #[test]
    fn test_search_query_prefers_brand_and_model() {
        let mut product = candidate("The best Sony WH-1000XM5 review", 0);
        product.brand = Some("Sony".to_string());
        product.model = Some("WH-1000XM5".to_string());
        assert_eq!(build_search_query(&product), "Sony WH-1000XM5");

        product.model = Some("Sony WH-1000XM5".to_string());
        assert_eq!(build_search_query(&product), "Sony WH-1000XM5");
    }

    #[test]
    fn test_search_query_from_name() {
        let product = candidate("Our Top Pick - The New Anker 737 Power Bank (24,000mAh) with USB-C for travel", 0);
        assert_eq!(build_search_query(&product), "Pick Anker 737 Power Bank USB-C travel");
    }
}
