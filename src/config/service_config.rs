use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// On-disk layout of `services.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfigFile {
    pub marketplace: MarketplaceSection,
    pub extractor: Option<ExtractorSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceSection {
    pub base_url: String,
    pub timeout_seconds: Option<u64>,
    // Optional environment variable name for customization
    pub env_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorSection {
    pub endpoint: String,
    pub model: String,
    pub timeout_seconds: Option<u64>,
    pub env_api_key: Option<String>,
}

/// Marketplace lookup service settings with the credential resolved from the environment
#[derive(Debug, Clone)]
pub struct MarketplaceConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub api_key: Option<String>,
    pub env_api_key: Option<String>,
}

/// Text-completion service used for deep extraction
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub api_key: Option<String>,
    pub env_api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub marketplace: MarketplaceConfig,
    pub extractor: Option<ExtractorConfig>,
}

impl ServiceConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read service config file: {}", path))?;

        let mut config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse service config file: {}", path))?;

        config.load_credentials()?;

        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ServiceConfigFile = toml::from_str(content)?;

        Ok(Self {
            marketplace: MarketplaceConfig {
                base_url: file.marketplace.base_url.trim_end_matches('/').to_string(),
                timeout_seconds: file.marketplace.timeout_seconds.unwrap_or(15),
                api_key: None,
                env_api_key: file.marketplace.env_api_key,
            },
            extractor: file.extractor.map(|section| ExtractorConfig {
                endpoint: section.endpoint.trim_end_matches('/').to_string(),
                model: section.model,
                timeout_seconds: section.timeout_seconds.unwrap_or(60),
                api_key: None,
                env_api_key: section.env_api_key,
            }),
        })
    }

    /// Marketplace key is mandatory; a missing extractor key disables deep extraction
    pub fn load_credentials(&mut self) -> Result<()> {
        let marketplace_var = self
            .marketplace
            .env_api_key
            .as_deref()
            .unwrap_or("MARKETPLACE_API_KEY");

        self.marketplace.api_key = env::var(marketplace_var)
            .with_context(|| format!("Missing environment variable: {}", marketplace_var))?
            .into();

        if let Some(extractor) = self.extractor.as_mut() {
            let extractor_var = extractor.env_api_key.as_deref().unwrap_or("EXTRACTOR_API_KEY");
            extractor.api_key = env::var(extractor_var).ok();
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.marketplace.base_url.is_empty() {
            return Err(anyhow::anyhow!("Marketplace base_url cannot be empty"));
        }

        if self.marketplace.api_key.is_none() {
            return Err(anyhow::anyhow!("Marketplace API key not loaded"));
        }

        if let Some(extractor) = &self.extractor {
            if extractor.endpoint.is_empty() {
                return Err(anyhow::anyhow!("Extractor endpoint cannot be empty"));
            }
        }

        Ok(())
    }
}

impl MarketplaceConfig {
    pub fn get_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Marketplace API key not loaded"))
    }
}
