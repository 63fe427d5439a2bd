#[cfg(test)]
use chrono::{DateTime, Utc};
#[cfg(test)]
use serde::{Deserialize, Serialize};

/// A stored summary row. Readers get summaries through `FeedItem` and `Story`.
#[cfg(test)]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: i64,
    pub article_id: i64,
    pub bullets: Vec<String>,
    pub why_it_matters: String,
    pub model_version: String,
    pub quality_score: f64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSummary {
    pub article_id: i64,
    pub bullets: Vec<String>,
    pub why_it_matters: String,
    pub model_version: String,
    pub quality_score: f64,
}
