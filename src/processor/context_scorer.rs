use crate::models::ParagraphBlock;

pub const HEADING_WEIGHT: u32 = 25;
pub const EMPHASIS_WEIGHT: u32 = 10;
pub const LIST_WEIGHT: u32 = 5;
pub const LINK_WEIGHT: u32 = 15;
pub const PRICE_WEIGHT: u32 = 20;
pub const RATING_WEIGHT: u32 = 20;
pub const IMAGE_WEIGHT: u32 = 10;

/// Cap applied to a candidate's summed contextual signal
pub const CONTEXT_SIGNAL_CAP: u32 = 20;

/// Structural signal strength of paragraphs
pub struct ContextScorer;

impl ContextScorer {
    pub fn score(&self, block: &ParagraphBlock) -> u32 {
        let flags = [
            (block.is_heading, HEADING_WEIGHT),
            (block.has_emphasis, EMPHASIS_WEIGHT),
            (block.has_list, LIST_WEIGHT),
            (block.has_link, LINK_WEIGHT),
            (block.has_price_like, PRICE_WEIGHT),
            (block.has_rating_like, RATING_WEIGHT),
            (block.has_image, IMAGE_WEIGHT),
        ];

        flags
            .iter()
            .filter(|(present, _)| *present)
            .map(|(_, weight)| weight)
            .sum()
    }

    /// Summed score of every paragraph a candidate appears in, capped at 20.
    /// Indices outside `blocks` contribute nothing.
    pub fn signal_for<'a, I>(&self, paragraph_indices: I, blocks: &[ParagraphBlock]) -> u32
    where
        I: IntoIterator<Item = &'a usize>,
    {
        let total: u32 = paragraph_indices
            .into_iter()
            .filter_map(|&i| blocks.get(i))
            .map(|block| self.score(block))
            .sum();

        total.min(CONTEXT_SIGNAL_CAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(index: usize) -> ParagraphBlock {
        ParagraphBlock {
            index,
            markup: String::new(),
            text: "placeholder text".to_string(),
            is_heading: false,
            heading_level: None,
            has_emphasis: false,
            has_list: false,
            has_link: false,
            has_image: false,
            has_price_like: false,
            has_rating_like: false,
            start: 0,
            end: 0,
        }
    }

    #[test]
    fn test_weights_sum() {
        let scorer = ContextScorer;

        let plain = block(0);
        assert_eq!(scorer.score(&plain), 0);

        let mut rich = block(1);
        rich.is_heading = true;
        rich.has_link = true;
        rich.has_image = true;
        assert_eq!(scorer.score(&rich), 50);

        let mut all = block(2);
        all.is_heading = true;
        all.has_emphasis = true;
        all.has_list = true;
        all.has_link = true;
        all.has_price_like = true;
        all.has_rating_like = true;
        all.has_image = true;
        assert_eq!(scorer.score(&all), 105);
    }

    #[test]
    fn test_signal_is_capped() {
        let scorer = ContextScorer;

        let mut first = block(0);
        first.has_list = true;
        let mut second = block(1);
        second.has_emphasis = true;
        let mut third = block(2);
        third.has_price_like = true;
        let blocks = vec![first, second, third];

        assert_eq!(scorer.signal_for(&[0, 1], &blocks), 15);
        assert_eq!(scorer.signal_for(&[0, 1, 2], &blocks), 20);
        assert_eq!(scorer.signal_for(&[7], &blocks), 0);
    }
}
