use std::sync::Arc;

use crate::db::Repository;
use crate::error::Result;
use crate::models::{Article, NewSummary};
use crate::services::{fan_out, with_retries, BatchOutcome, ContentExtractor, RetryPolicy};
use crate::text::truncate_chars;

use super::prompt::{build_prompt, PromptInput};
use super::schema::parse_summary;
use super::SummaryGenerator;

/// A lede at least this long is used as-is, without fetching the page.
const MIN_LEDE_CHARS: usize = 100;
const MAX_FALLBACK_LEDE_CHARS: usize = 1000;

/// Turns stored articles into validated, persisted summaries.
pub struct Summarizer {
    repository: Repository,
    generator: Arc<dyn SummaryGenerator>,
    extractor: Arc<dyn ContentExtractor>,
    retry: RetryPolicy,
    max_context_chars: usize,
}

impl Summarizer {
    pub fn new(
        repository: Repository,
        generator: Arc<dyn SummaryGenerator>,
        extractor: Arc<dyn ContentExtractor>,
        retry: RetryPolicy,
        max_context_chars: usize,
    ) -> Self {
        Self {
            repository,
            generator,
            extractor,
            retry,
            max_context_chars,
        }
    }

    /// Text handed to the model for `article`. Never empty unless the title is.
    pub async fn context_text(&self, article: &Article) -> String {
        let lede = article.lede.as_deref().map(str::trim).unwrap_or_default();
        if lede.chars().count() >= MIN_LEDE_CHARS {
            return truncate_chars(lede, self.max_context_chars).to_string();
        }

        match self.extractor.extract(&article.url).await {
            Ok(Some(text)) if !text.trim().is_empty() => {
                return truncate_chars(text.trim(), self.max_context_chars).to_string();
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(article_id = article.id, "extraction failed: {}", e);
            }
        }

        if !lede.is_empty() {
            truncate_chars(lede, MAX_FALLBACK_LEDE_CHARS).to_string()
        } else {
            article.title.clone()
        }
    }

    /// Summarize one article and persist the result.
    ///
    /// Only the generation call is retried. Invalid output is terminal for the
    /// article, as is any store failure.
    pub async fn summarize_article(&self, article: &Article) -> Result<NewSummary> {
        let text = self.context_text(article).await;
        let prompt = build_prompt(&PromptInput {
            title: &article.title,
            source: &article.source_name,
            published_at: article.published_at,
            text: &text,
        });

        let label = format!("summarize:{}", article.id);
        let raw = with_retries(&self.retry, &label, || self.generator.generate(&prompt)).await?;
        let payload = parse_summary(&raw)?;

        let summary = NewSummary {
            article_id: article.id,
            bullets: payload.bullets,
            why_it_matters: payload.why_it_matters,
            model_version: self.generator.model_version().to_string(),
            quality_score: 0.0,
        };

        if !self.repository.insert_summary(summary.clone()).await? {
            tracing::info!(article_id = article.id, "summary already present, keeping existing row");
        }
        Ok(summary)
    }

    /// Summarize `articles` with at most `parallel` generations in flight.
    pub async fn summarize_batch(
        &self,
        articles: Vec<Article>,
        parallel: usize,
    ) -> BatchOutcome<NewSummary> {
        fan_out(articles, parallel, |article| async move {
            let result = self.summarize_article(&article).await;
            if let Err(e) = &result {
                tracing::warn!(article_id = article.id, url = %article.url, "summarize failed: {}", e);
            }
            result
        })
        .await
    }
}
