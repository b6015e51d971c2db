use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

use crate::models::ParagraphBlock;

static BOUNDARY_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(/?)(?:p|h[1-6]|div|li|tr|blockquote|figcaption|dt|dd)\b[^>]*>").unwrap()
});
static HEADING_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^\s*<h([1-6])\b").unwrap());
static LIST_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<(?:li|ul|ol)\b").unwrap());
static NON_CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:script|style|noscript)\b.*?</(?:script|style|noscript)\s*>").unwrap()
});

pub(crate) static PRICE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:[$£€]\s?\d[\d,]*(?:\.\d{1,2})?|\b\d[\d,]*(?:\.\d{2})?\s?(?:usd|eur|gbp|dollars)\b)").unwrap()
});
pub(crate) static RATING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\b\d(?:\.\d)?\s?(?:/|out of)\s?(?:5|10)\b|\b\d(?:\.\d)?\s?stars?\b|★)").unwrap()
});

static EMPHASIS_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("strong, b, em, mark").unwrap());
static LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static IMAGE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img, picture").unwrap());

/// Splits raw article HTML into ordered paragraph-like blocks
pub struct Segmenter {
    min_text_len: usize,
}

impl Segmenter {
    pub fn new(min_text_len: usize) -> Self {
        Self { min_text_len }
    }

    /// Segment a document. Block indices are dense and follow document order.
    pub fn segment(&self, html: &str) -> Vec<ParagraphBlock> {
        let mut cuts = vec![0, html.len()];

        for caps in BOUNDARY_TAG.captures_iter(html) {
            let Some(tag) = caps.get(0) else { continue };
            let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
            cuts.push(if closing { tag.end() } else { tag.start() });
        }

        cuts.sort_unstable();
        cuts.dedup();

        let mut blocks = Vec::new();
        let mut discarded = 0;

        for window in cuts.windows(2) {
            let (start, end) = (window[0], window[1]);
            let markup = &html[start..end];

            match self.build_block(blocks.len(), markup, start, end) {
                Some(block) => blocks.push(block),
                None => discarded += 1,
            }
        }

        debug!(
            "Segmented {} bytes into {} blocks ({} noise spans discarded)",
            html.len(),
            blocks.len(),
            discarded
        );

        blocks
    }

    fn build_block(&self, index: usize, markup: &str, start: usize, end: usize) -> Option<ParagraphBlock> {
        let cleaned = NON_CONTENT.replace_all(markup, " ");
        let fragment = Html::parse_fragment(&cleaned);
        let text = collapse_whitespace(&fragment.root_element().text().collect::<Vec<_>>().join(" "));

        if text.chars().count() < self.min_text_len {
            return None;
        }

        let heading_level = HEADING_OPEN
            .captures(markup)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u8>().ok());

        Some(ParagraphBlock {
            index,
            markup: markup.to_string(),
            is_heading: heading_level.is_some(),
            heading_level,
            has_emphasis: fragment.select(&EMPHASIS_SELECTOR).next().is_some(),
            has_list: LIST_TAG.is_match(markup),
            has_link: fragment.select(&LINK_SELECTOR).next().is_some(),
            has_image: fragment.select(&IMAGE_SELECTOR).next().is_some(),
            has_price_like: PRICE_PATTERN.is_match(&text),
            has_rating_like: RATING_PATTERN.is_match(&text),
            text,
            start,
            end,
        })
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Strip tags from a markup fragment and collapse whitespace
pub fn strip_markup(markup: &str) -> String {
    let cleaned = NON_CONTENT.replace_all(markup, " ");
    let fragment = Html::parse_fragment(&cleaned);
    collapse_whitespace(&fragment.root_element().text().collect::<Vec<_>>().join(" "))
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The sentence of `text` surrounding byte offset `position`, trimmed to 240 chars
pub fn quote_around(text: &str, position: usize) -> String {
    let position = position.min(text.len());
    // terminal punctuation followed by whitespace; decimals like 9.99 are not sentence ends
    let ends_sentence = |i: usize, c: char| {
        matches!(c, '.' | '!' | '?') && text[i + c.len_utf8()..].starts_with(char::is_whitespace)
    };

    let start = text[..position]
        .char_indices()
        .filter(|(i, c)| ends_sentence(*i, *c))
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let end = text[position..]
        .char_indices()
        .find(|(i, c)| ends_sentence(position + i, *c))
        .map(|(i, c)| position + i + c.len_utf8())
        .unwrap_or(text.len());

    let sentence = text[start..end].trim();
    if sentence.chars().count() > 240 {
        let cut: String = sentence.chars().take(237).collect();
        format!("{}...", cut.trim_end())
    } else {
        sentence.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_in_document_order() {
        let html = r#"<h2>Sony WH-1000XM5</h2>
<p>The <strong>best</strong> noise cancelling headphones we tested.</p>
<ul><li>Battery life of 30 hours</li><li>Costs $399 at launch</li></ul>"#;

        let blocks = Segmenter::default().segment(html);
        assert_eq!(blocks.len(), 4);

        assert_eq!(blocks[0].text, "Sony WH-1000XM5");
        assert!(blocks[0].is_heading);
        assert_eq!(blocks[0].heading_level, Some(2));

        assert!(blocks[1].has_emphasis);
        assert!(!blocks[1].is_heading);

        assert!(blocks[2].has_list);
        assert!(blocks[3].has_price_like);

        for (i, block) in blocks.iter().enumerate() {
            assert_eq!(block.index, i);
            assert_eq!(&html[block.start..block.end], block.markup);
        }
    }

    #[test]
    fn test_discards_spacer_blocks() {
        let html = "<div>&nbsp;</div><p>ok</p><p>Real paragraph content here.</p><div><br></div>";
        let blocks = Segmenter::default().segment(html);

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "Real paragraph content here.");
        assert_eq!(blocks[0].index, 0);
    }

    #[test]
    fn test_nested_containers_do_not_duplicate_text() {
        let html = r#"<div class="entry"><p>First paragraph of text.</p><p>Second paragraph of text.</p></div>"#;
        let blocks = Segmenter::default().segment(html);

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text, "First paragraph of text.");
        assert_eq!(blocks[1].text, "Second paragraph of text.");
    }

    #[test]
    fn test_structural_flags() {
        let html = r#"<p><a href="https://example.com/x">Link</a> with <img src="a.jpg"> rated 4.5/5 stars</p>"#;
        let blocks = Segmenter::default().segment(html);

        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].has_link);
        assert!(blocks[0].has_image);
        assert!(blocks[0].has_rating_like);
        assert!(!blocks[0].has_price_like);
    }

    #[test]
    fn test_scripts_are_not_text() {
        let html = "<p>Visible words only<script>var hidden = 'Sony WH-1000XM5';</script></p>";
        let blocks = Segmenter::default().segment(html);

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "Visible words only");
    }

    #[test]
    fn test_empty_document() {
        assert!(Segmenter::default().segment("").is_empty());
        assert!(Segmenter::default().segment("<div></div>").is_empty());
    }

    #[test]
    fn test_quote_around() {
        let text = "Intro sentence. The Dyson V15 costs $749.99 today! Last one.";
        let pos = text.find("Dyson").unwrap();
        assert_eq!(quote_around(text, pos), "The Dyson V15 costs $749.99 today!");
        assert_eq!(quote_around(text, 0), "Intro sentence.");
        assert_eq!(quote_around("no punctuation at all", 3), "no punctuation at all");
    }

    #[test]
    fn test_strip_markup_decodes_entities() {
        assert_eq!(strip_markup("<b>Tom &amp; Jerry</b>\n  show"), "Tom & Jerry show");
    }
}
