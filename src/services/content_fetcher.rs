use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use url::Url;

use crate::config::ExtractorConfig;
use crate::error::Result;

const USER_AGENT_STRING: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Best-effort full-text extraction for an article page.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// `Ok(None)` when nothing usable could be extracted.
    async fn extract(&self, article_url: &str) -> Result<Option<String>>;
}

pub struct ContentFetcher {
    client: Client,
    min_chars: usize,
}

impl ContentFetcher {
    pub fn new(config: &ExtractorConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
        headers.insert(ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            min_chars: config.min_chars,
        })
    }
}

#[async_trait]
impl ContentExtractor for ContentFetcher {
    async fn extract(&self, article_url: &str) -> Result<Option<String>> {
        if Url::parse(article_url).is_err() {
            return Ok(None);
        }

        let response = self.client.get(article_url).send().await?;

        if !response.status().is_success() {
            tracing::debug!("Failed to fetch {}: {}", article_url, response.status());
            return Ok(None);
        }

        let html = response.text().await?;
        Ok(readable_text(&html, self.min_chars))
    }
}

/// Convert HTML to plain text and drop blank lines. Results shorter than
/// `min_chars` are treated as boilerplate.
pub fn readable_text(html: &str, min_chars: usize) -> Option<String> {
    let text = match html2text::from_read(html.as_bytes(), 100) {
        Ok(t) => t,
        Err(e) => {
            tracing::debug!("Failed to convert HTML to text: {}", e);
            return None;
        }
    };

    let cleaned: String = text
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if cleaned.chars().count() >= min_chars {
        Some(cleaned)
    } else {
        tracing::debug!("Extracted content too short ({} chars)", cleaned.len());
        None
    }
}
