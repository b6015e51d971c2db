use anyhow::{Context, Result, anyhow};
use product_detection::config::{PipelineConfig, ServiceConfig};
use product_detection::fetcher::{HttpProductLookup, LlmDeepExtractor};
use product_detection::pipeline::{DetectionPipeline, ProgressCallback, ProgressEvent, RunOptions};
use std::env;
use std::fs;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_SERVICES_PATH: &str = "src/configs/services.toml";
const USAGE: &str = "Usage: product-detection <article.html> [--title T] [--skip-external] [--config pipeline.toml] [--services services.toml]";

struct CliArgs {
    article_path: String,
    title: Option<String>,
    skip_external: bool,
    config_path: Option<String>,
    services_path: String,
}

fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut article_path = None;
    let mut title = None;
    let mut skip_external = false;
    let mut config_path = None;
    let mut services_path = DEFAULT_SERVICES_PATH.to_string();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--title" | "-t" => title = Some(iter.next().ok_or_else(|| anyhow!("--title needs a value"))?.clone()),
            "--skip-external" => skip_external = true,
            "--config" | "-c" => {
                config_path = Some(iter.next().ok_or_else(|| anyhow!("--config needs a value"))?.clone())
            }
            "--services" => {
                services_path = iter.next().ok_or_else(|| anyhow!("--services needs a value"))?.clone()
            }
            other if other.starts_with('-') => return Err(anyhow!("Unknown option: {}\n{}", other, USAGE)),
            other => article_path = Some(other.to_string()),
        }
    }

    Ok(CliArgs {
        article_path: article_path.ok_or_else(|| anyhow!(USAGE))?,
        title,
        skip_external,
        config_path,
        services_path,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let cli = parse_args(&args)?;

    info!("🚀 Starting product detection for {}", cli.article_path);

    let html = fs::read_to_string(&cli.article_path)
        .with_context(|| format!("Failed to read article: {}", cli.article_path))?;
    let title = cli.title.clone().unwrap_or_else(|| {
        std::path::Path::new(&cli.article_path)
            .file_stem()
            .map(|s| s.to_string_lossy().replace(['-', '_'], " "))
            .unwrap_or_default()
    });

    let pipeline_config =
        PipelineConfig::load(cli.config_path.as_deref()).context("Failed to load pipeline configuration")?;

    let services = ServiceConfig::from_file(&cli.services_path)
        .context("Failed to load service configuration")
        .with_context(|| format!("Set MARKETPLACE_API_KEY and check {}", cli.services_path))?;
    services.validate()?;

    info!(
        "Loaded service configuration: marketplace at {}",
        services.marketplace.base_url
    );

    let lookup = Arc::new(HttpProductLookup::new(&services.marketplace)?);
    let mut pipeline = DetectionPipeline::new(pipeline_config, lookup)?;

    match services.extractor.as_ref() {
        Some(extractor) if extractor.api_key.is_some() => {
            pipeline = pipeline.with_deep_extractor(Arc::new(LlmDeepExtractor::new(extractor)?));
        }
        Some(_) => warn!("Extractor configured without an API key; running pattern stages only"),
        None => info!("No extractor configured; running pattern stages only"),
    }

    let on_progress: ProgressCallback = Arc::new(|event: ProgressEvent| match event {
        ProgressEvent::Stage { label, step, total } => info!("📊 Stage {}/{}: {}", step, total, label),
        ProgressEvent::Verifying { current, total, name } => {
            info!("🔍 Verifying {}/{}: {}", current, total, name)
        }
    });

    let output = pipeline
        .run(
            &title,
            &html,
            RunOptions {
                skip_external_extraction: cli.skip_external,
                on_progress: Some(on_progress),
            },
        )
        .await?;

    info!(
        "✅ {} products verified from {} candidates",
        output.products.len(),
        output.candidate_count
    );

    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
