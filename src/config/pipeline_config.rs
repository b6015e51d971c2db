use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment prefix for overrides, e.g. `PRODUCT_DETECTION__MIN_CONFIDENCE=40`
pub const ENV_PREFIX: &str = "PRODUCT_DETECTION";

/// Thresholds and pacing for a detection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_min_confidence")]
    pub min_confidence: u8,
    #[serde(default = "default_max_verified_candidates")]
    pub max_verified_candidates: usize,
    #[serde(default = "default_external_min_confidence")]
    pub external_min_confidence: u8,
    #[serde(default = "default_verification_delay_ms")]
    pub verification_delay_ms: u64,
    #[serde(default = "default_comparison_min_products")]
    pub comparison_min_products: usize,
    #[serde(default = "default_comparison_max_products")]
    pub comparison_max_products: usize,
    #[serde(default = "default_min_block_text_len")]
    pub min_block_text_len: usize,
}

fn default_min_confidence() -> u8 {
    35
}

fn default_max_verified_candidates() -> usize {
    15
}

fn default_external_min_confidence() -> u8 {
    50
}

fn default_verification_delay_ms() -> u64 {
    500
}

fn default_comparison_min_products() -> usize {
    3
}

fn default_comparison_max_products() -> usize {
    10
}

fn default_min_block_text_len() -> usize {
    5
}

impl PipelineConfig {
    /// Layer an optional TOML file and `PRODUCT_DETECTION__*` variables over the defaults
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build pipeline configuration")?;

        let config: PipelineConfig = settings
            .try_deserialize()
            .context("Failed to parse pipeline configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document directly, without environment overrides
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig =
            toml::from_str(content).context("Failed to parse pipeline configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_confidence > 100 {
            return Err(anyhow::anyhow!("min_confidence must be within 0..=100"));
        }

        if self.external_min_confidence > 100 {
            return Err(anyhow::anyhow!("external_min_confidence must be within 0..=100"));
        }

        if self.max_verified_candidates == 0 {
            return Err(anyhow::anyhow!("max_verified_candidates must be at least 1"));
        }

        if self.comparison_max_products < self.comparison_min_products {
            return Err(anyhow::anyhow!(
                "comparison_max_products ({}) is below comparison_min_products ({})",
                self.comparison_max_products,
                self.comparison_min_products
            ));
        }

        Ok(())
    }

    pub fn verification_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.verification_delay_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            max_verified_candidates: default_max_verified_candidates(),
            external_min_confidence: default_external_min_confidence(),
            verification_delay_ms: default_verification_delay_ms(),
            comparison_min_products: default_comparison_min_products(),
            comparison_max_products: default_comparison_max_products(),
            min_block_text_len: default_min_block_text_len(),
        }
    }
}
