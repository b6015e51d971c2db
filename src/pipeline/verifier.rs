use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::PipelineError;
use crate::fetcher::{LookupError, ProductLookup};
use crate::models::{DetectedCandidate, FaqEntry, ProductData, VerifiedProduct};
use crate::pipeline::{ProgressCallback, ProgressEvent, report};

const MAX_CLAIMS: usize = 5;
const DEFAULT_CATEGORY: &str = "General";

/// Resolves calibrated candidates into marketplace records, one at a time
pub struct MarketplaceVerifier {
    lookup: Arc<dyn ProductLookup>,
    max_candidates: usize,
    delay: Duration,
}

impl MarketplaceVerifier {
    pub fn new(lookup: Arc<dyn ProductLookup>, max_candidates: usize, delay: Duration) -> Self {
        Self {
            lookup,
            max_candidates,
            delay,
        }
    }

    /// Verifies `candidates` in order, which must already be sorted and filtered.
    ///
    /// An authentication failure stops the loop. It becomes an error only when
    /// nothing was verified before it; otherwise the partial list is returned.
    pub async fn verify(
        &self,
        candidates: &[DetectedCandidate],
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<VerifiedProduct>, PipelineError> {
        let viable = &candidates[..candidates.len().min(self.max_candidates)];
        let total = viable.len();
        let mut products = Vec::new();
        let mut fatal: Option<String> = None;
        let mut skipped = 0;

        for (i, candidate) in viable.iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                sleep(self.delay).await;
            }

            report(
                on_progress,
                ProgressEvent::Verifying {
                    current: i + 1,
                    total,
                    name: candidate.canonical_name.clone(),
                },
            );

            match self.resolve(candidate).await {
                Ok(Some(data)) => match build_verified_product(candidate, data) {
                    Some(product) => {
                        info!(
                            "Verified '{}' as {} ({})",
                            candidate.canonical_name, product.identifier, product.title
                        );
                        products.push(product);
                    }
                    None => {
                        debug!("No resolvable identifier for '{}'", candidate.canonical_name);
                        skipped += 1;
                    }
                },
                Ok(None) => {
                    debug!("No marketplace match for '{}'", candidate.canonical_name);
                    skipped += 1;
                }
                Err(LookupError::Auth(message)) => {
                    error!(
                        "Marketplace authentication failed while verifying '{}': {}",
                        candidate.canonical_name, message
                    );
                    fatal = Some(message);
                    break;
                }
                Err(e) => {
                    warn!("Skipping '{}': {}", candidate.canonical_name, e);
                    skipped += 1;
                }
            }
        }

        if let Some(message) = fatal {
            if products.is_empty() {
                return Err(PipelineError::MarketplaceAuth(message));
            }
            warn!(
                "Verification stopped early by an authentication failure; returning {} products",
                products.len()
            );
        }

        info!(
            "Verification completed: {} verified, {} skipped of {} candidates",
            products.len(),
            skipped,
            total
        );

        Ok(products)
    }

    /// Identifier lookup first, free-text search when that yields nothing
    async fn resolve(&self, candidate: &DetectedCandidate) -> Result<Option<ProductData>, LookupError> {
        if let Some(identifier) = candidate.identifier.as_deref() {
            match self.lookup.lookup_by_identifier(identifier).await {
                Ok(Some(data)) => return Ok(Some(data)),
                Ok(None) | Err(LookupError::NotFound) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("Identifier lookup for {} failed, trying search: {}", identifier, e),
            }
        }

        let query = if candidate.search_query.trim().is_empty() {
            candidate.canonical_name.as_str()
        } else {
            candidate.search_query.as_str()
        };

        match self.lookup.search(query).await {
            Err(LookupError::NotFound) => Ok(None),
            other => other,
        }
    }
}

/// Combines a candidate with its lookup record. `None` when neither carries an identifier.
pub fn build_verified_product(candidate: &DetectedCandidate, data: ProductData) -> Option<VerifiedProduct> {
    let identifier = data
        .identifier
        .filter(|id| !id.trim().is_empty())
        .or_else(|| candidate.identifier.clone())?;

    let title = if data.title.trim().is_empty() {
        candidate.canonical_name.clone()
    } else {
        data.title.trim().to_string()
    };

    let price = data.price.unwrap_or_default();
    let rating = data.rating.unwrap_or(0.0);
    let review_count = data.review_count.unwrap_or(0);

    let description = data
        .description
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| default_description(&title, &candidate.first_mention));

    let claims = if data.features.is_empty() {
        default_claims(rating, review_count, &candidate.first_mention)
    } else {
        data.features.into_iter().take(MAX_CLAIMS).collect()
    };

    let faqs = default_faqs(&title, &price, rating, review_count);

    Some(VerifiedProduct {
        id: format!("product-{}", identifier.to_lowercase()),
        title,
        identifier,
        price,
        image_url: data.image_url.unwrap_or_default(),
        rating,
        review_count,
        brand: data.brand.or_else(|| candidate.brand.clone()).unwrap_or_default(),
        category: data
            .category
            .or_else(|| candidate.category.clone())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        description,
        claims,
        faqs,
        confidence: candidate.score(),
        first_mention: candidate.first_mention.clone(),
        placement_index: candidate.placement_index,
        verified_at: Utc::now(),
    })
}

fn default_description(title: &str, first_mention: &str) -> String {
    if first_mention.is_empty() {
        format!("{} as featured in this article.", title)
    } else {
        format!("{} as featured in this article: \"{}\"", title, first_mention)
    }
}

fn default_claims(rating: f32, review_count: u32, first_mention: &str) -> Vec<String> {
    let mut claims = Vec::new();

    if rating > 0.0 {
        if review_count > 0 {
            claims.push(format!("Rated {:.1} out of 5 by {} reviewers", rating, review_count));
        } else {
            claims.push(format!("Rated {:.1} out of 5", rating));
        }
    }

    if !first_mention.is_empty() {
        claims.push(first_mention.to_string());
    }

    claims
}

fn default_faqs(title: &str, price: &str, rating: f32, review_count: u32) -> Vec<FaqEntry> {
    let mut faqs = Vec::new();

    if !price.is_empty() {
        faqs.push(FaqEntry {
            question: format!("How much does the {} cost?", title),
            answer: format!("The {} is listed at {} at the time of writing.", title, price),
        });
    }

    if rating > 0.0 {
        faqs.push(FaqEntry {
            question: format!("How do buyers rate the {}?", title),
            answer: format!(
                "It holds an average rating of {:.1} out of 5 across {} reviews.",
                rating, review_count
            ),
        });
    }

    faqs
}
