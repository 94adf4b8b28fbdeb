//! # News Extract
//!
//! Fetches news pages and extracts a structured record (title, content,
//! publish time, author) from each one with an OpenAI-compatible model.
//!
//! ## Usage
//!
//! ```sh
//! LLM_API_KEY=sk-... news_extract https://example.com/a --urls-file more.txt
//! ```
//!
//! ## Architecture
//!
//! 1. **Startup**: parse CLI, load config, apply overrides
//! 2. **Batch**: fetch and extract every URL concurrently (bounded)
//! 3. **Report**: print one JSON report with an outcome per URL to stdout
//!
//! Per-URL failures are data in the report, not process failures; only
//! startup problems produce a non-zero exit status.

use chrono::Utc;
use clap::Parser;
use news_extract::api::OpenAiChatClient;
use news_extract::config::AppConfig;
use news_extract::extractor::LlmExtractor;
use news_extract::fetcher::HttpFetcher;
use news_extract::models::BatchReport;
use news_extract::pipeline::Pipeline;
use std::error::Error;
use tracing::{debug, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;

use cli::Cli;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init (stderr, stdout carries the report) ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let start_time = std::time::Instant::now();
    info!("news_extract starting up");

    let args = Cli::parse();
    debug!(urls = args.urls.len(), ?args.urls_file, ?args.config, "Parsed CLI arguments");

    // --- Configuration ---
    let mut config = AppConfig::load(args.config.as_deref()).await?;
    if let Some(base_url) = &args.base_url {
        config.extraction.base_url = base_url.clone();
    }
    if let Some(model) = &args.model {
        config.extraction.model = model.clone();
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    config.validate()?;

    let api_key = args
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or("missing API key: pass --api-key or set LLM_API_KEY")?;

    let urls = args.collect_urls().await?;
    if urls.is_empty() {
        return Err("no URLs given: pass them as arguments or with --urls-file".into());
    }
    info!(
        count = urls.len(),
        concurrency = config.concurrency,
        model = %config.extraction.model,
        base_url = %config.extraction.base_url,
        "Starting batch"
    );

    // --- Batch ---
    let outcomes = {
        let fetcher = HttpFetcher::from_config(&config.fetch)?;
        let service = OpenAiChatClient::new(
            &config.extraction.base_url,
            api_key,
            config.extraction.timeout()?,
        )?;
        let extractor = LlmExtractor::from_config(service, &config.extraction);
        let pipeline = Pipeline::new(fetcher, extractor);
        pipeline.run_batch(&urls, config.concurrency).await
        // pipeline dropped here: both HTTP clients release their connections
    };

    // --- Report ---
    let report = BatchReport::new(Utc::now().to_rfc3339(), outcomes);
    println!("{}", serde_json::to_string_pretty(&report)?);

    let elapsed = start_time.elapsed();
    info!(
        total = report.total,
        succeeded = report.succeeded,
        failed = report.failed,
        elapsed_secs = elapsed.as_secs_f64(),
        "news_extract finished"
    );

    Ok(())
}
