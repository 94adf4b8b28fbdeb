//! Command-line interface definitions for News Extract.
//!
//! Service settings can come from flags, environment variables, or the YAML
//! config file; flags and environment win over the file.

use clap::Parser;
use itertools::Itertools;
use std::error::Error;
use tokio::fs;

/// Command-line arguments for the News Extract application.
///
/// # Examples
///
/// ```sh
/// # Two URLs, key from the environment
/// LLM_API_KEY=sk-... news_extract https://example.com/a https://example.com/b
///
/// # URLs from a file, custom endpoint and model
/// news_extract --urls-file urls.txt --base-url https://open.bigmodel.cn/api/paas/v4 --model glm-4
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// News page URLs to process
    pub urls: Vec<String>,

    /// File with one URL per line (blank lines and `#` comments ignored)
    #[arg(short, long)]
    pub urls_file: Option<String>,

    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<String>,

    /// API key for the extraction service
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API (overrides config)
    #[arg(long, env = "LLM_BASE_URL")]
    pub base_url: Option<String>,

    /// Model identifier (overrides config)
    #[arg(long, env = "LLM_MODEL")]
    pub model: Option<String>,

    /// Maximum URLs processed at once (overrides config)
    #[arg(long)]
    pub concurrency: Option<usize>,
}

/// URLs listed in a file: one per line, trimmed, comments and blanks skipped.
pub fn parse_url_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

impl Cli {
    /// Positional URLs followed by file URLs, de-duplicated, first occurrence kept.
    pub async fn collect_urls(&self) -> Result<Vec<String>, Box<dyn Error>> {
        let mut urls = self.urls.clone();
        if let Some(path) = &self.urls_file {
            let contents = fs::read_to_string(path)
                .await
                .map_err(|e| format!("failed to read URL file {path}: {e}"))?;
            urls.extend(parse_url_list(&contents));
        }
        Ok(urls
            .into_iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unique()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "news_extract",
            "https://a.example/1",
            "https://a.example/2",
            "--model",
            "glm-4",
            "--concurrency",
            "4",
        ]);

        assert_eq!(cli.urls, vec!["https://a.example/1", "https://a.example/2"]);
        assert_eq!(cli.model.as_deref(), Some("glm-4"));
        assert_eq!(cli.concurrency, Some(4));
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["news_extract", "-u", "/tmp/urls.txt", "-c", "/tmp/config.yaml"]);

        assert!(cli.urls.is_empty());
        assert_eq!(cli.urls_file.as_deref(), Some("/tmp/urls.txt"));
        assert_eq!(cli.config.as_deref(), Some("/tmp/config.yaml"));
    }

    #[test]
    fn test_parse_url_list() {
        let contents = "# morning sources\nhttps://a.example/1\n\n   https://a.example/2  \n#https://skipped\n";
        assert_eq!(
            parse_url_list(contents),
            vec!["https://a.example/1", "https://a.example/2"]
        );
    }

    #[tokio::test]
    async fn test_collect_urls_dedupes_preserving_order() {
        let cli = Cli::parse_from([
            "news_extract",
            "https://a.example/2",
            "https://a.example/1",
            "https://a.example/2",
        ]);
        assert_eq!(
            cli.collect_urls().await.unwrap(),
            vec!["https://a.example/2", "https://a.example/1"]
        );
    }

    #[tokio::test]
    async fn test_collect_urls_missing_file() {
        let cli = Cli::parse_from(["news_extract", "--urls-file", "/no/such/urls.txt"]);
        assert!(cli.collect_urls().await.is_err());
    }
}
