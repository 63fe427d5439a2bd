use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::ai::{GroqClient, Summarizer};
use crate::config::Config;
use crate::db::Repository;
use crate::error::Result;
use crate::feed::{GNewsClient, NewsProvider};
use crate::jobs;
use crate::models::{FeedPage, IngestReport, KeeperReport, StoreStats, Story, SummarizeReport};
use crate::services::ContentFetcher;

/// Composition root: owns the store and every upstream client.
pub struct App {
    config: Config,
    repository: Repository,
    provider: Arc<dyn NewsProvider>,
    summarizer: Option<Arc<Summarizer>>,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let repository = Repository::new(&config.db_path).await?;
        let provider = Arc::new(GNewsClient::new(
            config.gnews_api_key.clone(),
            config.gnews.clone(),
        )?);

        let summarizer = match config.groq_api_key.as_ref() {
            Some(key) => {
                let generator = Arc::new(GroqClient::new(key.clone(), &config.summarizer)?);
                let extractor = Arc::new(ContentFetcher::new(&config.extractor)?);
                Some(Arc::new(Summarizer::new(
                    repository.clone(),
                    generator,
                    extractor,
                    config.summarizer.retry.policy(),
                    config.summarizer.max_context_chars,
                )))
            }
            None => None,
        };

        Ok(Self {
            config,
            repository,
            provider,
            summarizer,
        })
    }

    /// Seed the configured category slugs. Returns how many were new.
    pub async fn init(&self) -> Result<usize> {
        let inserted = self
            .repository
            .seed_categories(self.config.ingest.categories.clone())
            .await?;
        tracing::info!(inserted, "categories seeded");
        Ok(inserted)
    }

    pub async fn ingest(&self) -> Result<IngestReport> {
        jobs::ingest::run(&self.repository, self.provider.as_ref(), &self.config).await
    }

    /// `None` when no generation key is configured; nothing is attempted.
    pub async fn summarize(&self) -> Result<Option<SummarizeReport>> {
        let Some(summarizer) = &self.summarizer else {
            tracing::warn!("GROQ_API_KEY missing, skipping summarize run");
            return Ok(None);
        };

        jobs::summarize::run(&self.repository, summarizer, &self.config.summarizer)
            .await
            .map(Some)
    }

    pub async fn keeper(&self) -> Result<KeeperReport> {
        jobs::keeper::run(
            &self.repository,
            self.summarizer.as_deref(),
            &self.config.keeper,
            Utc::now(),
        )
        .await
    }

    /// `None` when the slug is unknown.
    pub async fn feed(
        &self,
        slug: &str,
        cursor: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Option<FeedPage>> {
        let Some(category_id) = self.repository.category_id_by_slug(slug).await? else {
            return Ok(None);
        };
        self.repository
            .feed_page(category_id, cursor, limit)
            .await
            .map(Some)
    }

    pub async fn story(&self, article_id: i64) -> Result<Option<Story>> {
        self.repository.story(article_id).await
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let since = Utc::now() - Duration::days(self.config.keeper.window_days_primary);
        self.repository.stats(since).await
    }
}
