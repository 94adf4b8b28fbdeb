//! Orchestration: fetch then extract, one URL at a time or many concurrently.
//!
//! A [`Pipeline`] owns the two long-lived clients. Dropping it releases the
//! pooled connections, so callers scope it around the batch and let it go
//! once every outcome is collected.
//!
//! Batches run with `futures::stream::buffer_unordered`. Each URL is an
//! independent future; a failure or even a panic in one becomes that URL's
//! outcome and never cancels its siblings.

use crate::error::PipelineError;
use crate::extractor::Extractor;
use crate::fetcher::Fetcher;
use crate::models::{NewsRecord, UrlOutcome};
use crate::utils::{bounded_reason, host_of, panic_message};
use futures::FutureExt;
use futures::stream::{self, StreamExt};
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

/// Fetcher and extractor composed into one `process(url)` operation.
#[derive(Debug)]
pub struct Pipeline<F, E> {
    fetcher: F,
    extractor: E,
}

impl<F, E> Pipeline<F, E> {
    pub fn new(fetcher: F, extractor: E) -> Self {
        Self { fetcher, extractor }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }
}

impl<F: Fetcher, E: Extractor> Pipeline<F, E> {
    /// Fetch `url`, decode the bytes as (lossy) UTF-8, and extract a record.
    ///
    /// # Arguments
    ///
    /// * `url` - News page to process
    ///
    /// # Returns
    ///
    /// The extracted record, or a [`PipelineError`] whose `stage()` names the
    /// fetch kind or parse stage that failed.
    #[instrument(level = "info", skip_all, fields(%url, host = ?host_of(url)))]
    pub async fn process(&self, url: &str) -> Result<NewsRecord, PipelineError> {
        info!("Processing URL");
        let raw = self.fetcher.fetch(url).await?;
        info!(bytes = raw.len(), "Fetched page");

        let text = String::from_utf8_lossy(&raw);
        let record = self.extractor.extract(&text).await?;
        Ok(record)
    }

    /// Run every URL through [`Pipeline::process`] concurrently.
    ///
    /// # Arguments
    ///
    /// * `urls` - Pages to process; duplicates are processed twice
    /// * `concurrency` - Maximum pipelines in flight (0 is treated as 1)
    ///
    /// # Returns
    ///
    /// One [`UrlOutcome`] per input URL, in input order. A failure or panic
    /// in one URL becomes that URL's outcome and never cancels the others.
    #[instrument(level = "info", skip_all, fields(total = urls.len(), concurrency = concurrency))]
    pub async fn run_batch(&self, urls: &[String], concurrency: usize) -> Vec<UrlOutcome> {
        let t0 = Instant::now();

        let mut indexed: Vec<(usize, UrlOutcome)> = stream::iter(urls.iter().enumerate())
            .map(|(index, url)| async move {
                let result = AssertUnwindSafe(self.process(url))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        Err(PipelineError::Unknown(bounded_reason(panic_message(
                            panic.as_ref(),
                        ))))
                    });

                match &result {
                    Ok(record) => info!(index, %url, title = ?record.title, "URL processed"),
                    Err(e) => error!(
                        index,
                        %url,
                        stage = e.stage(),
                        reason = %e.reason(),
                        "URL failed; continuing with the rest of the batch"
                    ),
                }
                debug!(index, %url, "URL finished (success or failure)");

                (
                    index,
                    UrlOutcome {
                        url: url.clone(),
                        result,
                    },
                )
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        let outcomes: Vec<UrlOutcome> = indexed.into_iter().map(|(_, o)| o).collect();

        let succeeded = outcomes.iter().filter(|o| o.is_ok()).count();
        let elapsed = t0.elapsed();
        info!(
            total = outcomes.len(),
            succeeded,
            failed = outcomes.len() - succeeded,
            ?elapsed,
            "Batch complete"
        );
        outcomes
    }
}
