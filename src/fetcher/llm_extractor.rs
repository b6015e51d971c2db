use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};
use wreq::Client;
use wreq_util::Emulation;

use crate::config::ExtractorConfig;
use crate::fetcher::{DeepExtractionRequest, DeepExtractionResult, DeepExtractor, ExtractedMention};
use crate::models::ContentType;

const SYSTEM_PROMPT: &str = "You find purchasable products mentioned in articles. \
Reply with a single JSON object: {\"candidates\": [{\"name\", \"brand\", \"model\", \"search_query\", \
\"paragraph\", \"confidence\"}], \"content_type\", \"comparison_detected\"}. \
`paragraph` is the bracketed number of the paragraph the product is discussed in, \
`confidence` is 0-100, and `content_type` is one of review, comparison, buying_guide, \
listicle, how_to, news, general. Only report specific products a reader could buy.";

/// Deep extraction through an OpenAI-compatible chat completion endpoint
pub struct LlmDeepExtractor {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl LlmDeepExtractor {
    pub fn new(config: &ExtractorConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| anyhow!("Extractor API key not loaded"))?;

        let client = Client::builder()
            .emulation(Emulation::Firefox139)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to build extractor HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.endpoint.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl DeepExtractor for LlmDeepExtractor {
    async fn extract(&self, request: &DeepExtractionRequest) -> Result<DeepExtractionResult> {
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_prompt(request)},
            ],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Extractor request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("Extractor HTTP error: {}", response.status()));
        }

        let data: Value = response.json().await.context("Extractor returned invalid JSON")?;
        let content = data
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Extractor reply has no message content"))?;

        let result = parse_extraction_reply(content)?;
        info!(
            "Deep extraction returned {} candidates (content type {:?})",
            result.candidates.len(),
            result.content_type
        );

        Ok(result)
    }
}

pub fn build_prompt(request: &DeepExtractionRequest) -> String {
    let mut prompt = format!("Article title: {}\n\nParagraphs:\n{}\n", request.title, request.numbered_paragraphs);

    if !request.pre_detected_summary.is_empty() {
        prompt.push_str("\nAlready detected (confirm or correct, then add anything missed):\n");
        prompt.push_str(&request.pre_detected_summary);
        prompt.push('\n');
    }

    prompt
}

/// Parses a completion reply into an extraction result.
///
/// The reply may wrap its JSON in a code fence or surround it with prose; the
/// outermost `{...}` span is used. Entries without a name are dropped.
/// Fractional confidences (0.0-1.0) are scaled to 0-100.
pub fn parse_extraction_reply(reply: &str) -> Result<DeepExtractionResult> {
    let start = reply.find('{').ok_or_else(|| anyhow!("No JSON object in extractor reply"))?;
    let end = reply.rfind('}').ok_or_else(|| anyhow!("No JSON object in extractor reply"))?;
    if end < start {
        return Err(anyhow!("Malformed JSON object in extractor reply"));
    }

    let value: Value =
        serde_json::from_str(&reply[start..=end]).context("Failed to parse extractor reply as JSON")?;

    let entries = value
        .get("candidates")
        .or_else(|| value.get("products"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let candidates: Vec<ExtractedMention> = entries.iter().filter_map(mention_from_value).collect();
    debug!("Parsed {} of {} extractor entries", candidates.len(), entries.len());

    Ok(DeepExtractionResult {
        candidates,
        content_type: value
            .get("content_type")
            .and_then(Value::as_str)
            .map(ContentType::from_label)
            .unwrap_or_default(),
        comparison_detected: value
            .get("comparison_detected")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

fn mention_from_value(entry: &Value) -> Option<ExtractedMention> {
    let text = |key: &str| {
        entry
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let name = text("name")?;

    let paragraph = match entry.get("paragraph") {
        Some(Value::Number(n)) => n.as_u64().map(|n| n as usize),
        Some(Value::String(s)) => s.trim().trim_matches(['[', ']']).parse::<usize>().ok(),
        _ => None,
    };

    let confidence = match entry.get("confidence") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    }
    .map(|c| if c > 0.0 && c <= 1.0 && c.fract() != 0.0 { c * 100.0 } else { c })
    .map(|c| c.round().clamp(0.0, 100.0) as u8)
    .unwrap_or(0);

    Some(ExtractedMention {
        name,
        brand: text("brand"),
        model: text("model"),
        search_query: text("search_query"),
        paragraph,
        confidence,
    })
}
