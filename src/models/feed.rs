use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ranked slot in a category's cache. Ranks are dense and start at 1.
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub category_id: i64,
    pub article_id: i64,
    pub rank: i64,
}

/// Article joined with its summary, as served to readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: i64,
    pub title: String,
    pub source: String,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub bullets: Vec<String>,
    pub why_it_matters: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    /// Rank to pass as the next cursor, absent on the last page.
    pub next_cursor: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    #[serde(flatten)]
    pub item: FeedItem,
    pub like_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub category: String,
    pub cache_count: i64,
    pub backlog_unsummarized_recent: i64,
    pub newest_published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub articles: i64,
    pub summaries: i64,
    pub cached_items: i64,
    pub categories: Vec<CategoryStats>,
}
