use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored article. Rows are written once by ingestion and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub lede: Option<String>,
    pub source_name: String,
    pub source_domain: String,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub category_id: i64,
}

/// A normalized provider item ready for idempotent insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewArticle {
    pub url: String,
    pub title: String,
    pub lede: String,
    pub source_name: String,
    pub source_domain: String,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub category_id: i64,
}
