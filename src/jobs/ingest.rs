use std::collections::HashMap;

use crate::config::Config;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::feed::{normalize, NewsProvider};
use crate::models::{CategoryIngest, IngestReport, NewArticle};
use crate::services::fan_out;

/// Fetch, normalize and store new articles for every configured category.
///
/// Fails only when the category table cannot be read. A provider or
/// persistence failure skips that category and is recorded in the report.
pub async fn run(
    repository: &Repository,
    provider: &dyn NewsProvider,
    config: &Config,
) -> Result<IngestReport> {
    let category_ids: HashMap<String, i64> = repository
        .load_categories()
        .await?
        .into_iter()
        .map(|c| (c.slug, c.id))
        .collect();

    let slugs = &config.ingest.categories;
    let outcome = fan_out(slugs.iter(), config.ingest.parallel, |slug| {
        let category_id = category_ids.get(slug).copied();
        async move {
            let category_id = category_id
                .ok_or_else(|| AppError::Config(format!("category not found: {}", slug)))?;
            ingest_category(repository, provider, config, slug, category_id).await
        }
    })
    .await;

    let mut report = IngestReport::default();
    for (slug, result) in slugs.iter().zip(outcome.results) {
        match result {
            Ok(category) => report.push(category),
            Err(e) => {
                tracing::warn!(category = %slug, "ingest skipped: {}", e);
                report.push(CategoryIngest {
                    category: slug.clone(),
                    error: Some(e.to_string()),
                    ..Default::default()
                });
            }
        }
    }

    tracing::info!(
        fetched = report.fetched,
        inserted = report.inserted,
        "ingest finished"
    );
    Ok(report)
}

async fn ingest_category(
    repository: &Repository,
    provider: &dyn NewsProvider,
    config: &Config,
    slug: &str,
    category_id: i64,
) -> Result<CategoryIngest> {
    let query = config.ingest.query_for(slug)?;
    let watermark = repository.latest_published_at(category_id).await?;
    let max_per_page = config.gnews.max_per_page as usize;

    let mut report = CategoryIngest {
        category: slug.to_string(),
        ..Default::default()
    };

    // Pages are fetched in order; each one depends on where the last stopped.
    for page in 1..=config.gnews.max_pages {
        let items = provider.fetch_page(query, page, watermark).await?;
        if items.is_empty() {
            break;
        }

        let articles: Vec<NewArticle> = items
            .iter()
            .filter_map(|raw| match normalize(raw, category_id) {
                Ok(article) => Some(article),
                Err(e) => {
                    tracing::warn!(category = slug, "dropping provider item: {}", e);
                    None
                }
            })
            .collect();

        let inserted = repository.insert_articles(articles).await?;
        report.fetched += items.len();
        report.inserted += inserted;
        tracing::debug!(category = slug, page, fetched = items.len(), inserted, "page stored");

        if items.len() < max_per_page {
            break;
        }
    }

    tracing::info!(
        category = slug,
        fetched = report.fetched,
        inserted = report.inserted,
        "category ingested"
    );
    Ok(report)
}
