use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::config::GNewsConfig;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSource {
    pub name: Option<String>,
    #[allow(dead_code)]
    pub url: Option<String>,
}

/// One search hit as returned by the provider.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawArticle {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub url: String,
    pub image: Option<String>,
    pub published_at: String,
    #[serde(default)]
    pub source: RawSource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[allow(dead_code)]
    #[serde(default)]
    total_articles: u64,
    #[serde(default)]
    articles: Vec<RawArticle>,
}

/// Source of raw articles for a search query.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    /// One page of results, newest first. `from` bounds results to items
    /// published at or after it.
    async fn fetch_page(
        &self,
        query: &str,
        page: u32,
        from: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawArticle>>;
}

pub struct GNewsClient {
    client: Client,
    api_key: Option<String>,
    config: GNewsConfig,
}

impl GNewsClient {
    pub fn new(api_key: Option<String>, config: GNewsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("quick-brew/1.0")
            .build()?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    fn query_params(
        &self,
        api_key: &str,
        query: &str,
        page: u32,
        from: Option<DateTime<Utc>>,
    ) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("q", query.to_string()),
            ("apikey", api_key.to_string()),
            ("max", self.config.max_per_page.to_string()),
            ("sortby", "publishedAt".to_string()),
            ("page", page.to_string()),
        ];
        if !self.config.lang.is_empty() {
            params.push(("lang", self.config.lang.clone()));
        }
        if !self.config.country.is_empty() {
            params.push(("country", self.config.country.clone()));
        }
        if let Some(from) = from {
            params.push(("from", from.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        params
    }
}

#[async_trait]
impl NewsProvider for GNewsClient {
    async fn fetch_page(
        &self,
        query: &str,
        page: u32,
        from: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawArticle>> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::Config("GNEWS_API_KEY missing".to_string()))?;

        let params = self.query_params(api_key, query, page, from);
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("request failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Provider(format!("HTTP {}: {}", status, body)));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("malformed response: {}", e.without_url())))?;

        Ok(parsed.articles)
    }
}
