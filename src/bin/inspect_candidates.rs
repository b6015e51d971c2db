use anyhow::{Context, Result, anyhow};
use product_detection::config::PipelineConfig;
use product_detection::processor::{
    ConfidenceCalibrator, LexicalExtractor, Segmenter, StructuralExtractor, merge_candidates,
};
use std::env;
use std::fs;
use tracing_subscriber::EnvFilter;

/// Offline view of what the pattern stages find in an article, with the
/// calibration breakdown for every candidate.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let path = env::args()
        .nth(1)
        .ok_or_else(|| anyhow!("Usage: inspect_candidates <article.html> [pipeline.toml]"))?;
    let config = PipelineConfig::load(env::args().nth(2).as_deref())?;

    let html = fs::read_to_string(&path).with_context(|| format!("Failed to read article: {}", path))?;

    let blocks = Segmenter::new(config.min_block_text_len).segment(&html);
    println!("=== {} paragraphs ===", blocks.len());
    for block in &blocks {
        let marker = block.heading_level.map(|l| format!("h{}", l)).unwrap_or_else(|| "p ".to_string());
        let preview: String = block.text.chars().take(70).collect();
        println!("[{:>3}] {} {}", block.index, marker, preview);
    }

    let mut candidates = StructuralExtractor::new().extract(&html, &blocks);
    candidates.extend(LexicalExtractor::new()?.extract(&blocks));
    let mut candidates = merge_candidates(candidates);

    let calibrator = ConfidenceCalibrator::new();
    calibrator.calibrate_all(&mut candidates, &blocks);
    candidates.sort_by(|a, b| b.score().cmp(&a.score()));

    println!("\n=== {} candidates ===", candidates.len());
    println!(
        "{:>4} {:>3} {:>3} {:>3} {:>3} {:>3} {:>3}  {:<40} {:<12} {}",
        "conf", "src", "brd", "nam", "ctx", "frq", "mul", "name", "identifier", "sources"
    );

    for candidate in &candidates {
        let b = calibrator.breakdown(candidate, &blocks);
        let kinds: Vec<&str> = candidate.distinct_kinds().iter().map(|k| k.label()).collect();
        let marker = if candidate.score() >= config.min_confidence { ' ' } else { '-' };

        println!(
            "{}{:>3} {:>3} {:>3} {:>3} {:>3} {:>3} {:>3}  {:<40} {:<12} {}",
            marker,
            candidate.score(),
            b.source_quality,
            b.brand_recognition,
            b.name_quality,
            b.contextual,
            b.mention_frequency,
            b.multi_source,
            candidate.canonical_name,
            candidate.identifier.as_deref().unwrap_or("-"),
            kinds.join(",")
        );
        println!(
            "      query: {:?}  placement: {}  paragraphs: {:?}",
            candidate.search_query, candidate.placement_index, candidate.paragraph_indices
        );
    }

    Ok(())
}
