use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use wreq::{Client, Url};
use wreq_util::Emulation;

use crate::config::MarketplaceConfig;
use crate::fetcher::{LookupError, ProductLookup};
use crate::models::ProductData;

/// Marketplace lookup over a JSON HTTP API
pub struct HttpProductLookup {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpProductLookup {
    pub fn new(config: &MarketplaceConfig) -> Result<Self> {
        let api_key = config.get_api_key()?.to_string();

        let client = Client::builder()
            .emulation(Emulation::Firefox139)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to build marketplace HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn get_json(&self, url: Url) -> Result<Option<Value>, LookupError> {
        debug!("Marketplace request: {}", url);

        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        if !check_status(response.status().as_u16())? {
            return Ok(None);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| LookupError::Upstream(format!("Invalid JSON body: {}", e)))?;

        Ok(Some(body))
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, LookupError> {
        Url::parse_with_params(&format!("{}{}", self.base_url, path), params)
            .map_err(|e| LookupError::Upstream(format!("Invalid marketplace URL: {}", e)))
    }
}

#[async_trait]
impl ProductLookup for HttpProductLookup {
    async fn lookup_by_identifier(&self, identifier: &str) -> Result<Option<ProductData>, LookupError> {
        let url = self.endpoint(&format!("/items/{}", identifier), &[])?;

        Ok(self
            .get_json(url)
            .await?
            .and_then(|body| product_from_body(body, Some(identifier))))
    }

    async fn search(&self, query: &str) -> Result<Option<ProductData>, LookupError> {
        let url = self.endpoint("/search", &[("q", query), ("limit", "1")])?;

        Ok(self.get_json(url).await?.and_then(|body| product_from_body(body, None)))
    }
}

fn transport_error(error: wreq::Error) -> LookupError {
    if error.is_timeout() {
        LookupError::Timeout
    } else {
        LookupError::Upstream(error.to_string())
    }
}

/// `Ok(true)` when the response carries a body worth parsing, `Ok(false)` on 404
pub fn check_status(status: u16) -> Result<bool, LookupError> {
    match status {
        200..=299 => Ok(true),
        401 | 403 => Err(LookupError::Auth(format!("HTTP {}", status))),
        404 => Ok(false),
        408 | 504 => Err(LookupError::Timeout),
        _ => Err(LookupError::Upstream(format!("HTTP {}", status))),
    }
}

/// Accepts a bare product object, an array of products, or an
/// `items`/`results`/`data` envelope; takes the first usable record
pub fn product_from_body(body: Value, identifier: Option<&str>) -> Option<ProductData> {
    let record = match body {
        Value::Array(items) => items.into_iter().next()?,
        Value::Object(mut map) => {
            let envelope = ["items", "results", "data"]
                .into_iter()
                .find(|key| map.get(*key).is_some_and(Value::is_array));
            match envelope.and_then(|key| map.remove(key)) {
                Some(Value::Array(items)) => items.into_iter().next()?,
                _ => Value::Object(map),
            }
        }
        _ => return None,
    };

    let mut product: ProductData = match serde_json::from_value(record) {
        Ok(product) => product,
        Err(e) => {
            warn!("Skipping malformed marketplace record: {}", e);
            return None;
        }
    };

    if product.title.trim().is_empty() {
        return None;
    }

    if product.identifier.is_none() {
        product.identifier = identifier.map(str::to_string);
    }

    Some(product)
}
