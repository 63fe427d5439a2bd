use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use tokio::sync::RwLock;
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{
    Article, Category, CategoryStats, FeedItem, FeedPage, NewArticle, NewSummary, StoreStats,
    Story,
};
#[cfg(test)]
use crate::models::{CacheEntry, Summary};

use super::schema::SCHEMA;

pub const DEFAULT_FEED_LIMIT: i64 = 20;
pub const MAX_FEED_LIMIT: i64 = 50;

const ARTICLE_COLUMNS: &str = "a.id, a.url, a.title, a.lede, a.source_name, a.source_domain, \
                               a.image_url, a.published_at, a.category_id";

/// Store access layer. Cheap to clone; every clone shares one connection.
#[derive(Clone)]
pub struct Repository {
    conn: Connection,
    category_ids: Arc<RwLock<HashMap<String, i64>>>,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::with_connection(conn).await
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self {
            conn,
            category_ids: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    // Category operations

    pub async fn seed_categories(&self, slugs: Vec<String>) -> Result<usize> {
        let inserted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut inserted = 0;
                {
                    let mut stmt =
                        tx.prepare("INSERT OR IGNORE INTO categories (slug) VALUES (?1)")?;
                    for slug in &slugs {
                        inserted += stmt.execute(params![slug])?;
                    }
                }
                tx.commit()?;
                Ok(inserted)
            })
            .await?;
        Ok(inserted)
    }

    pub async fn load_categories(&self) -> Result<Vec<Category>> {
        let categories = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT id, slug FROM categories ORDER BY id")?;
                let categories = stmt
                    .query_map([], |row| {
                        Ok(Category {
                            id: row.get(0)?,
                            slug: row.get(1)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(categories)
            })
            .await?;
        Ok(categories)
    }

    pub async fn category_id_by_slug(&self, slug: &str) -> Result<Option<i64>> {
        if let Some(id) = self.category_ids.read().await.get(slug) {
            return Ok(Some(*id));
        }

        let key = slug.to_string();
        let id = self
            .conn
            .call(move |conn| {
                let id = conn
                    .query_row(
                        "SELECT id FROM categories WHERE slug = ?1",
                        params![key],
                        |row| row.get::<_, i64>(0),
                    )
                    .optional()?;
                Ok(id)
            })
            .await?;

        if let Some(id) = id {
            self.category_ids.write().await.insert(slug.to_string(), id);
        }
        Ok(id)
    }

    // Article operations

    /// Newest `published_at` stored for the category.
    pub async fn latest_published_at(&self, category_id: i64) -> Result<Option<DateTime<Utc>>> {
        let latest = self
            .conn
            .call(move |conn| {
                let latest = conn
                    .query_row(
                        "SELECT published_at FROM articles WHERE category_id = ?1
                         ORDER BY published_at DESC LIMIT 1",
                        params![category_id],
                        |row| timestamp_at(row, 0),
                    )
                    .optional()?;
                Ok(latest)
            })
            .await?;
        Ok(latest)
    }

    /// Insert articles, silently skipping any whose url already exists.
    /// Returns the number of genuinely new rows.
    pub async fn insert_articles(&self, articles: Vec<NewArticle>) -> Result<usize> {
        if articles.is_empty() {
            return Ok(0);
        }

        let inserted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut inserted = 0;
                {
                    let mut stmt = tx.prepare(
                        r#"INSERT INTO articles (url, title, lede, source_name, source_domain,
                                                 image_url, published_at, category_id)
                           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                           ON CONFLICT(url) DO NOTHING"#,
                    )?;
                    for article in &articles {
                        inserted += stmt.execute(params![
                            article.url,
                            article.title,
                            article.lede,
                            article.source_name,
                            article.source_domain,
                            article.image_url,
                            format_timestamp(&article.published_at),
                            article.category_id,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(inserted)
            })
            .await?;
        Ok(inserted)
    }

    /// Most recently published articles without a summary, across all categories.
    pub async fn unsummarized_recent(&self, limit: usize) -> Result<Vec<Article>> {
        let articles = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles a
                     LEFT JOIN summaries s ON s.article_id = a.id
                     WHERE s.id IS NULL
                     ORDER BY a.published_at DESC, a.id DESC
                     LIMIT ?1"
                );
                let mut stmt = conn.prepare(&sql)?;
                let articles = stmt
                    .query_map(params![limit as i64], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    /// Unsummarized articles among the category's newest `scan_limit` rows.
    pub async fn unsummarized_in_category(
        &self,
        category_id: i64,
        scan_limit: usize,
        limit: usize,
    ) -> Result<Vec<Article>> {
        let articles = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {ARTICLE_COLUMNS} FROM (
                         SELECT * FROM articles WHERE category_id = ?1
                         ORDER BY published_at DESC, id DESC LIMIT ?2
                     ) a
                     LEFT JOIN summaries s ON s.article_id = a.id
                     WHERE s.id IS NULL
                     ORDER BY a.published_at DESC, a.id DESC
                     LIMIT ?3"
                );
                let mut stmt = conn.prepare(&sql)?;
                let articles = stmt
                    .query_map(
                        params![category_id, scan_limit as i64, limit as i64],
                        article_from_row,
                    )?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    /// Summarized articles published at or after `since`, newest first.
    pub async fn ready_articles(
        &self,
        category_id: i64,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Article>> {
        let since = format_timestamp(&since);
        let articles = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles a
                     JOIN summaries s ON s.article_id = a.id
                     WHERE a.category_id = ?1 AND a.published_at >= ?2
                     ORDER BY a.published_at DESC, a.id DESC
                     LIMIT ?3"
                );
                let mut stmt = conn.prepare(&sql)?;
                let articles = stmt
                    .query_map(params![category_id, since, limit as i64], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    // Summary operations

    /// Returns false when the article already had a summary.
    pub async fn insert_summary(&self, summary: NewSummary) -> Result<bool> {
        let bullets_json = serde_json::to_string(&summary.bullets)?;
        let inserted = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"INSERT INTO summaries (article_id, bullets, why_it_matters, model_version, quality_score)
                       VALUES (?1, ?2, ?3, ?4, ?5)
                       ON CONFLICT(article_id) DO NOTHING"#,
                    params![
                        summary.article_id,
                        bullets_json,
                        summary.why_it_matters,
                        summary.model_version,
                        summary.quality_score,
                    ],
                )?;
                Ok(changed > 0)
            })
            .await?;
        Ok(inserted)
    }

    #[cfg(test)]
    pub async fn execute_batch(&self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        self.conn
            .call(move |conn| {
                conn.execute_batch(&sql)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    #[cfg(test)]
    pub async fn article_by_url(&self, url: &str) -> Result<Option<Article>> {
        let url = url.to_string();
        let article = self
            .conn
            .call(move |conn| {
                let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles a WHERE a.url = ?1");
                let article = conn
                    .query_row(&sql, params![url], article_from_row)
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    #[cfg(test)]
    pub async fn get_summary(&self, article_id: i64) -> Result<Option<Summary>> {
        let summary = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, article_id, bullets, why_it_matters, model_version, quality_score, generated_at
                     FROM summaries WHERE article_id = ?1",
                )?;
                let summary = stmt
                    .query_row(params![article_id], summary_from_row)
                    .optional()?;
                Ok(summary)
            })
            .await?;
        Ok(summary)
    }

    // Feed cache operations

    /// Delete every cache row for the category, then insert `article_ids`
    /// with ranks 1..=len in order. The two steps are not atomic.
    pub async fn replace_cache(&self, category_id: i64, article_ids: Vec<i64>) -> Result<usize> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM feed_cache WHERE category_id = ?1",
                    params![category_id],
                )?;
                Ok(())
            })
            .await?;

        if article_ids.is_empty() {
            return Ok(0);
        }

        let written = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO feed_cache (category_id, article_id, rank) VALUES (?1, ?2, ?3)",
                    )?;
                    for (index, article_id) in article_ids.iter().enumerate() {
                        stmt.execute(params![category_id, article_id, index as i64 + 1])?;
                    }
                }
                tx.commit()?;
                Ok(article_ids.len())
            })
            .await?;
        Ok(written)
    }

    #[cfg(test)]
    pub async fn cache_entries(&self, category_id: i64) -> Result<Vec<CacheEntry>> {
        let entries = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT category_id, article_id, rank FROM feed_cache
                     WHERE category_id = ?1 ORDER BY rank",
                )?;
                let entries = stmt
                    .query_map(params![category_id], |row| {
                        Ok(CacheEntry {
                            category_id: row.get(0)?,
                            article_id: row.get(1)?,
                            rank: row.get(2)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await?;
        Ok(entries)
    }

    // Read layer

    /// Rank-ordered window of the category's cache starting at `cursor`.
    pub async fn feed_page(
        &self,
        category_id: i64,
        cursor: Option<i64>,
        limit: Option<i64>,
    ) -> Result<FeedPage> {
        let limit = limit.unwrap_or(DEFAULT_FEED_LIMIT).clamp(1, MAX_FEED_LIMIT);
        let start_rank = cursor.unwrap_or(1).max(1);
        let end_rank = start_rank.saturating_add(limit - 1);

        let items = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT a.id, a.title, a.source_name, a.image_url, a.published_at,
                              s.bullets, s.why_it_matters, a.url
                       FROM feed_cache c
                       JOIN articles a ON a.id = c.article_id
                       JOIN summaries s ON s.article_id = a.id
                       WHERE c.category_id = ?1 AND c.rank BETWEEN ?2 AND ?3
                       ORDER BY c.rank"#,
                )?;
                let items = stmt
                    .query_map(params![category_id, start_rank, end_rank], feed_item_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await?;

        let next_cursor = if items.len() as i64 == limit && end_rank < i64::MAX {
            Some(end_rank + 1)
        } else {
            None
        };

        Ok(FeedPage { items, next_cursor })
    }

    pub async fn story(&self, article_id: i64) -> Result<Option<Story>> {
        let story = self
            .conn
            .call(move |conn| {
                let item = conn
                    .query_row(
                        r#"SELECT a.id, a.title, a.source_name, a.image_url, a.published_at,
                                  s.bullets, s.why_it_matters, a.url
                           FROM articles a
                           JOIN summaries s ON s.article_id = a.id
                           WHERE a.id = ?1"#,
                        params![article_id],
                        feed_item_from_row,
                    )
                    .optional()?;

                let Some(item) = item else {
                    return Ok(None);
                };

                let like_count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM likes WHERE article_id = ?1",
                    params![article_id],
                    |row| row.get(0),
                )?;

                Ok(Some(Story { item, like_count }))
            })
            .await?;
        Ok(story)
    }

    /// Store totals plus per-category cache size, recent backlog and freshness.
    pub async fn stats(&self, backlog_since: DateTime<Utc>) -> Result<StoreStats> {
        let since = format_timestamp(&backlog_since);
        let stats = self
            .conn
            .call(move |conn| {
                let count = |sql: &str| conn.query_row(sql, [], |row| row.get::<_, i64>(0));
                let articles = count("SELECT COUNT(*) FROM articles")?;
                let summaries = count("SELECT COUNT(*) FROM summaries")?;
                let cached_items = count("SELECT COUNT(*) FROM feed_cache")?;

                let mut stmt = conn.prepare(
                    r#"SELECT c.slug,
                              (SELECT COUNT(*) FROM feed_cache f WHERE f.category_id = c.id),
                              (SELECT COUNT(*) FROM articles a
                                 LEFT JOIN summaries s ON s.article_id = a.id
                                 WHERE a.category_id = c.id AND a.published_at >= ?1
                                   AND s.id IS NULL),
                              (SELECT MAX(a.published_at) FROM articles a WHERE a.category_id = c.id)
                       FROM categories c ORDER BY c.id"#,
                )?;
                let categories = stmt
                    .query_map(params![since], |row| {
                        let newest = row
                            .get::<_, Option<String>>(3)?
                            .and_then(|s| parse_datetime(&s));
                        Ok(CategoryStats {
                            category: row.get(0)?,
                            cache_count: row.get(1)?,
                            backlog_unsummarized_recent: row.get(2)?,
                            newest_published_at: newest,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                Ok(StoreStats {
                    articles,
                    summaries,
                    cached_items,
                    categories,
                })
            })
            .await?;
        Ok(stats)
    }
}

/// Fixed-width UTC form so lexical order matches chronological order.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime('now') format
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn timestamp_at(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("invalid timestamp: {}", raw).into(),
        )
    })
}

fn bullets_at(row: &Row, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn article_from_row(row: &Row) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        lede: row.get(3)?,
        source_name: row.get(4)?,
        source_domain: row.get(5)?,
        image_url: row.get(6)?,
        published_at: timestamp_at(row, 7)?,
        category_id: row.get(8)?,
    })
}

#[cfg(test)]
fn summary_from_row(row: &Row) -> rusqlite::Result<Summary> {
    Ok(Summary {
        id: row.get(0)?,
        article_id: row.get(1)?,
        bullets: bullets_at(row, 2)?,
        why_it_matters: row.get(3)?,
        model_version: row.get(4)?,
        quality_score: row.get(5)?,
        generated_at: timestamp_at(row, 6)?,
    })
}

fn feed_item_from_row(row: &Row) -> rusqlite::Result<FeedItem> {
    Ok(FeedItem {
        id: row.get(0)?,
        title: row.get(1)?,
        source: row.get(2)?,
        image_url: row.get(3)?,
        published_at: timestamp_at(row, 4)?,
        bullets: bullets_at(row, 5)?,
        why_it_matters: row.get(6)?,
        url: row.get(7)?,
    })
}
