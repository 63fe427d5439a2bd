use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;

use crate::ai::{Prompt, SummaryGenerator};
use crate::config::Config;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::feed::gnews::{RawArticle, RawSource};
use crate::feed::NewsProvider;
use crate::models::{Article, NewArticle, NewSummary};
use crate::services::ContentExtractor;

pub async fn seeded_repository(slug: &str) -> (Repository, i64) {
    let repo = Repository::open_in_memory().await.unwrap();
    repo.seed_categories(vec![slug.to_string()]).await.unwrap();
    let id = repo.category_id_by_slug(slug).await.unwrap().unwrap();
    (repo, id)
}

/// An article whose title is its url, so scripted generators can key on it.
pub fn new_article(category_id: i64, url: &str, published_at: DateTime<Utc>) -> NewArticle {
    NewArticle {
        url: url.to_string(),
        title: url.to_string(),
        lede: format!("Short lede for {url}"),
        source_name: "Example News".to_string(),
        source_domain: "example.com".to_string(),
        image_url: None,
        published_at,
        category_id,
    }
}

pub async fn stored_article(repo: &Repository, article: NewArticle) -> Article {
    let url = article.url.clone();
    repo.insert_articles(vec![article]).await.unwrap();
    repo.article_by_url(&url).await.unwrap().unwrap()
}

pub fn new_summary(article_id: i64) -> NewSummary {
    NewSummary {
        article_id,
        bullets: (1..=5).map(|i| format!("Key fact number {i}.")).collect(),
        why_it_matters: "It changes the outlook for the sector.".to_string(),
        model_version: "test-model".to_string(),
        quality_score: 0.0,
    }
}

pub fn valid_summary_json() -> String {
    json!({
        "bullets": [
            "Revenue rose 12% year over year.",
            "Operating margin widened to 31%.",
            "Full-year guidance was raised.",
            "Shares gained 8% after hours.",
            "Management cited strong AI demand."
        ],
        "why_it_matters": "Signals that enterprise AI spending is still accelerating."
    })
    .to_string()
}

pub fn raw_article(url: &str, published_at: DateTime<Utc>) -> RawArticle {
    RawArticle {
        title: Some(format!("Story at {url}")),
        description: Some("A short description of the story.".to_string()),
        content: None,
        url: url.to_string(),
        image: None,
        published_at: published_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        source: RawSource {
            name: Some("Example News".to_string()),
            url: None,
        },
    }
}

/// Config whose categories are `slugs`, each searched with `"<slug>-query"`.
pub fn test_config(slugs: &[&str]) -> Config {
    let mut config = Config::with_db_path(":memory:");
    config.ingest.categories = slugs.iter().map(|s| s.to_string()).collect();
    config.ingest.queries = slugs
        .iter()
        .map(|s| (s.to_string(), format!("{s}-query")))
        .collect();
    config
}

#[derive(Debug, Clone)]
struct PageRequest {
    query: String,
    page: u32,
    from: Option<DateTime<Utc>>,
}

/// Serves fixed pages per query and records every request.
#[derive(Default)]
pub struct FakeProvider {
    pages: Mutex<HashMap<String, Vec<Vec<RawArticle>>>>,
    failures: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<PageRequest>>,
}

impl FakeProvider {
    pub fn set_pages(&self, query: &str, pages: Vec<Vec<RawArticle>>) {
        self.pages.lock().unwrap().insert(query.to_string(), pages);
    }

    pub fn fail(&self, query: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(query.to_string(), message.to_string());
    }

    pub fn requested_pages(&self, query: &str) -> Vec<u32> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.query == query)
            .map(|r| r.page)
            .collect()
    }

    pub fn last_from(&self, query: &str) -> Option<DateTime<Utc>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.query == query)
            .and_then(|r| r.from)
    }
}

#[async_trait]
impl NewsProvider for FakeProvider {
    async fn fetch_page(
        &self,
        query: &str,
        page: u32,
        from: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawArticle>> {
        self.requests.lock().unwrap().push(PageRequest {
            query: query.to_string(),
            page,
            from,
        });

        if let Some(message) = self.failures.lock().unwrap().get(query) {
            return Err(AppError::Provider(message.clone()));
        }

        Ok(self
            .pages
            .lock()
            .unwrap()
            .get(query)
            .and_then(|pages| pages.get(page as usize - 1))
            .cloned()
            .unwrap_or_default())
    }
}

/// Replies per article title from a queue of scripted results. Once a queue
/// is drained (or was never scripted) it answers with a valid summary.
#[derive(Default)]
pub struct ScriptedGenerator {
    scripts: Mutex<HashMap<String, VecDeque<Result<String>>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedGenerator {
    pub fn script(&self, title: &str, replies: Vec<Result<String>>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(title.to_string(), replies.into());
    }

    pub fn calls(&self, title: &str) -> usize {
        self.calls.lock().unwrap().get(title).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl SummaryGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let title = prompt
            .user
            .lines()
            .next()
            .and_then(|line| line.strip_prefix("Title: "))
            .unwrap_or_default()
            .to_string();

        *self.calls.lock().unwrap().entry(title.clone()).or_default() += 1;

        self.scripts
            .lock()
            .unwrap()
            .get_mut(&title)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(valid_summary_json()))
    }

    fn model_version(&self) -> &str {
        "test-model"
    }
}

#[derive(Clone)]
enum Extraction {
    Text(String),
    Empty,
    Failing,
}

/// Returns the same extraction for every url and counts calls.
#[derive(Clone)]
pub struct StaticExtractor {
    extraction: Extraction,
    calls: Arc<AtomicUsize>,
}

impl StaticExtractor {
    fn with(extraction: Extraction) -> Self {
        Self {
            extraction,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::with(Extraction::Text(text.to_string()))
    }

    pub fn empty() -> Self {
        Self::with(Extraction::Empty)
    }

    pub fn failing() -> Self {
        Self::with(Extraction::Failing)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentExtractor for StaticExtractor {
    async fn extract(&self, _article_url: &str) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.extraction {
            Extraction::Text(text) => Ok(Some(text.clone())),
            Extraction::Empty => Ok(None),
            Extraction::Failing => Err(AppError::Upstream("connection reset".to_string())),
        }
    }
}
