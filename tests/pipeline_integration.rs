use anyhow::{Result, anyhow};
use async_trait::async_trait;
use product_detection::config::PipelineConfig;
use product_detection::fetcher::{
    DeepExtractionRequest, DeepExtractionResult, DeepExtractor, ExtractedMention, LookupError, ProductLookup,
};
use product_detection::models::{ContentType, ProductData};
use product_detection::pipeline::{DetectionPipeline, ProgressCallback, ProgressEvent, RunOptions};
use product_detection::processor::Segmenter;
use product_detection::PipelineError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const WIDGET_ARTICLE: &str = r#"<h2><a href="https://www.amazon.com/dp/WIDGET123">Widget Pro 3000</a></h2>
<p>The Widget Pro 3000 costs $199 and we rated it 4.5/5 after a month of testing.</p>"#;

const PLAIN_ARTICLE: &str = "<p>it was a lovely afternoon and we walked along the river.</p>\
<p>nothing much happened after that, honestly.</p>";

const HEADPHONES_ARTICLE: &str = r#"<h1>The best noise cancelling headphones of 2024</h1>
<p>We spent a month with every major pair.</p>
<h2>1. Sony WH-1000XM5</h2>
<p>The <strong>Sony WH-1000XM5</strong> costs $399 and earns 4.7/5 from us.</p>
<h2>2. Bose QuietComfort Ultra</h2>
<p>Grab the <a href="https://www.amazon.com/dp/B0CCZ1L489">Bose QuietComfort Ultra</a> if comfort matters most.</p>
<ul><li>Apple AirPods Max are the premium pick.</li></ul>"#;

fn five_link_article() -> String {
    ["Acme Blender 100", "Acme Toaster 200", "Acme Kettle 300", "Acme Mixer 400", "Acme Grill 500"]
        .iter()
        .enumerate()
        .map(|(i, name)| {
            format!(
                r#"<p>Grab the <a href="https://www.amazon.com/dp/B0AAAAAAA{}">{}</a> today.</p>"#,
                i + 1,
                name
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn test_config() -> PipelineConfig {
    PipelineConfig {
        verification_delay_ms: 0,
        ..PipelineConfig::default()
    }
}

fn listing(identifier: &str, title: &str) -> ProductData {
    ProductData {
        identifier: Some(identifier.to_string()),
        title: title.to_string(),
        price: Some("$10.00".to_string()),
        rating: Some(4.2),
        review_count: Some(10),
        ..Default::default()
    }
}

/// Resolves every identifier and every search
struct EchoLookup;

#[async_trait]
impl ProductLookup for EchoLookup {
    async fn lookup_by_identifier(&self, identifier: &str) -> Result<Option<ProductData>, LookupError> {
        Ok(Some(listing(identifier, &format!("Listing {}", identifier))))
    }

    async fn search(&self, query: &str) -> Result<Option<ProductData>, LookupError> {
        let identifier: String = query
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(10)
            .collect::<String>()
            .to_uppercase();
        Ok(Some(listing(&identifier, query)))
    }
}

/// Fails with an authentication error on the n-th lookup call (1-based)
struct ExpiringLookup {
    fail_on_call: usize,
    calls: AtomicUsize,
}

impl ExpiringLookup {
    fn new(fail_on_call: usize) -> Self {
        Self {
            fail_on_call,
            calls: AtomicUsize::new(0),
        }
    }

    fn next_call(&self) -> Result<(), LookupError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on_call {
            return Err(LookupError::Auth("credential expired".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProductLookup for ExpiringLookup {
    async fn lookup_by_identifier(&self, identifier: &str) -> Result<Option<ProductData>, LookupError> {
        self.next_call()?;
        Ok(Some(listing(identifier, identifier)))
    }

    async fn search(&self, query: &str) -> Result<Option<ProductData>, LookupError> {
        self.next_call()?;
        Ok(Some(listing("B0SEARCH01", query)))
    }
}

/// Deep extractor returning a fixed result and counting its calls
struct FixedExtractor {
    result: DeepExtractionResult,
    calls: AtomicUsize,
}

#[async_trait]
impl DeepExtractor for FixedExtractor {
    async fn extract(&self, request: &DeepExtractionRequest) -> Result<DeepExtractionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(request.numbered_paragraphs.starts_with("[0] "));
        Ok(self.result.clone())
    }
}

struct BrokenExtractor;

#[async_trait]
impl DeepExtractor for BrokenExtractor {
    async fn extract(&self, _request: &DeepExtractionRequest) -> Result<DeepExtractionResult> {
        Err(anyhow!("completion service unavailable"))
    }
}

fn pipeline(lookup: Arc<dyn ProductLookup>) -> DetectionPipeline {
    DetectionPipeline::new(test_config(), lookup).unwrap()
}

fn skip_external() -> RunOptions {
    RunOptions {
        skip_external_extraction: true,
        on_progress: None,
    }
}

#[tokio::test]
async fn test_identifier_link_round_trip() {
    let pipeline = pipeline(Arc::new(EchoLookup));

    let detection = pipeline.detect_candidates("Widget review", WIDGET_ARTICLE, false).await;
    assert_eq!(detection.candidates.len(), 1);

    let widget = &detection.candidates[0];
    assert_eq!(widget.canonical_name, "Widget Pro 3000");
    assert_eq!(widget.identifier.as_deref(), Some("WIDGET123"));
    assert!(widget.score() >= 90, "confidence {}", widget.score());

    let output = pipeline.run("Widget review", WIDGET_ARTICLE, skip_external()).await.unwrap();
    assert_eq!(output.candidate_count, 1);
    assert_eq!(output.products.len(), 1);
    assert_eq!(output.products[0].identifier, "WIDGET123");
    assert_eq!(output.products[0].id, "product-widget123");
    assert_eq!(output.products[0].placement_index, 0);
    assert!(output.comparison.is_none());
}

#[tokio::test]
async fn test_lone_link_scores_from_its_own_signals() {
    let pipeline = pipeline(Arc::new(EchoLookup));
    let html = r#"<p>Our pick is the <a href="https://www.amazon.com/dp/WIDGET123">Widget Pro 3000</a> for most people.</p>"#;

    let detection = pipeline.detect_candidates("", html, false).await;
    assert_eq!(detection.candidates.len(), 1);
    assert_eq!(detection.candidates[0].identifier.as_deref(), Some("WIDGET123"));
    assert_eq!(detection.candidates[0].score(), 82);
}

#[tokio::test]
async fn test_ordinary_url_words_are_not_identifiers() {
    let pipeline = pipeline(Arc::new(EchoLookup));
    let html = r#"<p>Read the <a href="https://example.com/gp/product/overview">setup guide</a> before you start.</p>
<p>Also see https://docs.example.org/dp/settings/ for the advanced options.</p>"#;

    let detection = pipeline.detect_candidates("", html, false).await;
    assert!(detection.candidates.iter().all(|c| c.identifier.is_none()));

    let output = pipeline.run("", html, skip_external()).await.unwrap();
    assert!(output.products.is_empty());
}

#[tokio::test]
async fn test_document_without_products() {
    let lookup = Arc::new(ExpiringLookup::new(1));
    let pipeline = pipeline(lookup.clone());

    let output = pipeline.run("A walk", PLAIN_ARTICLE, skip_external()).await.unwrap();
    assert_eq!(output.candidate_count, 0);
    assert!(output.products.is_empty());
    assert!(output.comparison.is_none());
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);

    let empty = pipeline.run("Nothing", "", skip_external()).await.unwrap();
    assert_eq!(empty.candidate_count, 0);
    assert!(empty.products.is_empty());
}

#[tokio::test]
async fn test_auth_failure_after_first_product_returns_partial_result() {
    let lookup = Arc::new(ExpiringLookup::new(2));
    let pipeline = pipeline(lookup.clone());

    let output = pipeline.run("Kitchen gear", &five_link_article(), skip_external()).await.unwrap();

    assert_eq!(output.candidate_count, 5);
    assert_eq!(output.products.len(), 1);
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_auth_failure_on_first_candidate_is_an_error() {
    let pipeline = pipeline(Arc::new(ExpiringLookup::new(1)));

    match pipeline.run("Kitchen gear", &five_link_article(), skip_external()).await {
        Err(PipelineError::MarketplaceAuth(message)) => assert_eq!(message, "credential expired"),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(output) => panic!("expected auth error, got {} products", output.products.len()),
    }
}

#[tokio::test]
async fn test_comparison_group_for_three_or_more_products() {
    let pipeline = pipeline(Arc::new(EchoLookup));

    let output = pipeline.run("Kitchen gear", &five_link_article(), skip_external()).await.unwrap();
    assert_eq!(output.products.len(), 5);

    let comparison = output.comparison.expect("comparison group");
    assert_eq!(comparison.product_ids.len(), 5);
    assert_eq!(comparison.product_ids[0], output.products[0].id);
    assert!(!comparison.criteria.is_empty());
}

#[tokio::test]
async fn test_placements_index_into_segmented_paragraphs() {
    let pipeline = pipeline(Arc::new(EchoLookup));
    let paragraph_count = Segmenter::default().segment(HEADPHONES_ARTICLE).len();

    let output = pipeline
        .run("Best headphones", HEADPHONES_ARTICLE, skip_external())
        .await
        .unwrap();

    assert!(!output.products.is_empty());
    for product in &output.products {
        assert!(
            product.placement_index < paragraph_count,
            "{} placed at {} of {}",
            product.title,
            product.placement_index,
            paragraph_count
        );
    }
}

#[tokio::test]
async fn test_confidence_always_within_bounds() {
    let pipeline = pipeline(Arc::new(EchoLookup));
    let five_links = five_link_article();

    for html in [WIDGET_ARTICLE, PLAIN_ARTICLE, HEADPHONES_ARTICLE, five_links.as_str()] {
        let detection = pipeline.detect_candidates("", html, false).await;
        for candidate in &detection.candidates {
            let score = candidate.score();
            assert!((5..=100).contains(&score), "{} scored {}", candidate.canonical_name, score);
        }
    }
}

#[tokio::test]
async fn test_external_candidates_are_filtered_and_merged() {
    let html = "<p>We tested plenty of headphones this spring.</p>\
<p>The bose quietcomfort ultra surprised us.</p>";

    let extractor = Arc::new(FixedExtractor {
        result: DeepExtractionResult {
            candidates: vec![
                ExtractedMention {
                    name: "Bose QuietComfort Ultra".to_string(),
                    brand: Some("Bose".to_string()),
                    model: Some("QuietComfort Ultra".to_string()),
                    search_query: None,
                    paragraph: Some(99),
                    confidence: 85,
                },
                ExtractedMention {
                    name: "Quiet Widget X1".to_string(),
                    brand: None,
                    model: None,
                    search_query: None,
                    paragraph: Some(0),
                    confidence: 40,
                },
            ],
            content_type: ContentType::Review,
            comparison_detected: false,
        },
        calls: AtomicUsize::new(0),
    });

    let pipeline = pipeline(Arc::new(EchoLookup)).with_deep_extractor(extractor.clone());

    let detection = pipeline.detect_candidates("Headphones", html, true).await;
    assert_eq!(detection.content_type, ContentType::Review);
    assert_eq!(detection.candidates.len(), 1);
    assert_eq!(detection.candidates[0].canonical_name, "Bose QuietComfort Ultra");
    assert_eq!(detection.candidates[0].first_paragraph(), 1);

    let skipped = pipeline.run("Headphones", html, skip_external()).await.unwrap();
    assert_eq!(skipped.content_type, ContentType::General);
    assert_eq!(skipped.candidate_count, 0);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_extractor_failure_degrades_to_pattern_results() {
    let pipeline = pipeline(Arc::new(EchoLookup)).with_deep_extractor(Arc::new(BrokenExtractor));

    let output = pipeline
        .run("Widget review", WIDGET_ARTICLE, RunOptions::default())
        .await
        .unwrap();

    assert_eq!(output.content_type, ContentType::General);
    assert_eq!(output.products.len(), 1);
    assert_eq!(output.products[0].identifier, "WIDGET123");
}

#[tokio::test]
async fn test_progress_events() {
    let pipeline = pipeline(Arc::new(EchoLookup));

    let events = Arc::new(Mutex::new(Vec::<ProgressEvent>::new()));
    let sink = events.clone();
    let callback: ProgressCallback = Arc::new(move |event: ProgressEvent| sink.lock().unwrap().push(event));

    pipeline
        .run(
            "Widget review",
            WIDGET_ARTICLE,
            RunOptions {
                skip_external_extraction: true,
                on_progress: Some(callback),
            },
        )
        .await
        .unwrap();

    let events = events.lock().unwrap();
    let steps: Vec<usize> = events
        .iter()
        .filter_map(|event| match event {
            ProgressEvent::Stage { step, total, .. } => {
                assert_eq!(*total, 6);
                Some(*step)
            }
            ProgressEvent::Verifying { .. } => None,
        })
        .collect();
    assert_eq!(steps, vec![1, 2, 3, 4, 5, 6]);

    assert!(events.contains(&ProgressEvent::Verifying {
        current: 1,
        total: 1,
        name: "Widget Pro 3000".to_string(),
    }));
}
