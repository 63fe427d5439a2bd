use chrono::{DateTime, Duration, Utc};

use crate::ai::Summarizer;
use crate::config::KeeperConfig;
use crate::db::Repository;
use crate::error::Result;
use crate::models::{Article, Category, CategoryAbort, CategoryKeep, KeeperReport};
use crate::services::Tally;

/// Run the keeper over every stored category, one after another so no two
/// cache rewrites interleave.
///
/// Fails only when the category list cannot be read. A failure inside one
/// category aborts that category and is recorded in the report.
pub async fn run(
    repository: &Repository,
    summarizer: Option<&Summarizer>,
    config: &KeeperConfig,
    now: DateTime<Utc>,
) -> Result<KeeperReport> {
    let categories = repository.load_categories().await?;
    if summarizer.is_none() {
        tracing::warn!("GROQ_API_KEY missing, keeper will rebuild caches without top-up");
    }

    let mut report = KeeperReport::default();
    for category in &categories {
        match ensure_category(repository, summarizer, config, category, now).await {
            Ok(kept) => report.categories.push(kept),
            Err(e) => {
                let store_failure = e.is_persistence();
                tracing::error!(
                    category = %category.slug,
                    store_failure,
                    "keeper aborted category: {}",
                    e
                );
                report.aborted.push(CategoryAbort {
                    category: category.slug.clone(),
                    error: e.to_string(),
                    store_failure,
                });
            }
        }
    }

    tracing::info!(
        categories = report.categories.len(),
        aborted = report.aborted.len(),
        "keeper finished"
    );
    Ok(report)
}

/// Bring one category up to `min_ready` cached items where possible: count
/// ready articles in the primary window, top up when short, widen to the
/// fallback window if still short, then rewrite the ranked cache.
pub async fn ensure_category(
    repository: &Repository,
    summarizer: Option<&Summarizer>,
    config: &KeeperConfig,
    category: &Category,
    now: DateTime<Utc>,
) -> Result<CategoryKeep> {
    let slug = category.slug.as_str();
    let primary_since = now - Duration::days(config.window_days_primary);
    let ready_in = move |since: DateTime<Utc>| {
        repository.ready_articles(category.id, since, config.ready_scan_limit)
    };

    let mut ready = ready_in(primary_since).await?;
    let mut kept = CategoryKeep {
        category: slug.to_string(),
        ready_primary: ready.len(),
        ..Default::default()
    };

    if ready.len() < config.min_ready {
        if let Some(summarizer) = summarizer {
            kept.topup = top_up(repository, summarizer, config, category, ready.len()).await?;
            ready = ready_in(primary_since).await?;
        }
    }

    if ready.len() < config.min_ready {
        let fallback_since = now - Duration::days(config.window_days_fallback);
        ready = ready_in(fallback_since).await?;
        kept.used_fallback = true;
        tracing::info!(category = slug, ready = ready.len(), "using fallback window");
    }

    ready.truncate(config.min_ready);
    kept.cached = write_cache(repository, category.id, &ready).await?;

    tracing::info!(
        category = slug,
        ready_primary = kept.ready_primary,
        topup_ok = kept.topup.ok,
        topup_fail = kept.topup.fail,
        cached = kept.cached,
        "category cache rebuilt"
    );
    Ok(kept)
}

async fn top_up(
    repository: &Repository,
    summarizer: &Summarizer,
    config: &KeeperConfig,
    category: &Category,
    ready_count: usize,
) -> Result<Tally> {
    let deficit = config.min_ready - ready_count;
    let want = config
        .max_new_summaries
        .min(deficit.saturating_mul(config.buffer_factor));
    let candidates = repository
        .unsummarized_in_category(category.id, config.unsummarized_scan_limit, want)
        .await?;

    tracing::info!(
        category = %category.slug,
        deficit,
        candidates = candidates.len(),
        "topping up"
    );
    if candidates.is_empty() {
        return Ok(Tally::default());
    }

    Ok(summarizer.summarize_batch(candidates, config.parallel).await.tally())
}

async fn write_cache(repository: &Repository, category_id: i64, ready: &[Article]) -> Result<usize> {
    let ids = ready.iter().map(|a| a.id).collect();
    repository.replace_cache(category_id, ids).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::AppError;
    use crate::services::RetryPolicy;
    use crate::testing::{new_article, new_summary, seeded_repository, ScriptedGenerator, StaticExtractor};

    fn keeper_config(min_ready: usize) -> KeeperConfig {
        KeeperConfig {
            min_ready,
            ..Default::default()
        }
    }

    fn no_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 1,
            base_delay: std::time::Duration::ZERO,
            max_delay: std::time::Duration::ZERO,
            jitter: std::time::Duration::ZERO,
            retry_after_buffer: std::time::Duration::ZERO,
        }
    }

    fn summarizer_for(repo: &Repository, generator: Arc<ScriptedGenerator>) -> Summarizer {
        Summarizer::new(
            repo.clone(),
            generator,
            Arc::new(StaticExtractor::empty()),
            no_retry(),
            6000,
        )
    }

    /// Stores `count` articles in `tech`, one hour apart starting
    /// `start_hours` ago, and summarizes the first `summarized` of them.
    async fn stock(
        repo: &Repository,
        tech: i64,
        prefix: &str,
        count: i64,
        start_hours: i64,
        summarized: i64,
        now: DateTime<Utc>,
    ) -> Vec<i64> {
        let articles = (0..count)
            .map(|i| {
                new_article(
                    tech,
                    &format!("https://{prefix}.example/{i}"),
                    now - Duration::hours(start_hours + i),
                )
            })
            .collect();
        repo.insert_articles(articles).await.unwrap();

        let mut ids = Vec::new();
        for i in 0..count {
            let url = format!("https://{prefix}.example/{i}");
            let id = repo.article_by_url(&url).await.unwrap().unwrap().id;
            if i < summarized {
                repo.insert_summary(new_summary(id)).await.unwrap();
            }
            ids.push(id);
        }
        ids
    }

    async fn category(repo: &Repository, slug: &str) -> Category {
        repo.load_categories()
            .await
            .unwrap()
            .into_iter()
            .find(|c| c.slug == slug)
            .unwrap()
    }

    #[tokio::test]
    async fn top_up_fills_primary_window_without_fallback() {
        let (repo, tech) = seeded_repository("tech").await;
        let now = Utc::now();
        // 40 ready within the primary window, 30 more unsummarized behind them.
        let ready_ids = stock(&repo, tech, "ready", 40, 1, 40, now).await;
        let fresh_ids = stock(&repo, tech, "fresh", 30, 41, 0, now).await;

        let generator = Arc::new(ScriptedGenerator::default());
        // Two of the twenty candidates fail.
        generator.script("https://fresh.example/3", vec![Ok("[]".into())]);
        generator.script("https://fresh.example/7", vec![Err(AppError::Upstream("HTTP 500".into()))]);
        let summarizer = summarizer_for(&repo, generator.clone());

        let config = KeeperConfig {
            max_new_summaries: 20,
            ..keeper_config(50)
        };
        let kept = ensure_category(&repo, Some(&summarizer), &config, &category(&repo, "tech").await, now)
            .await
            .unwrap();

        assert_eq!(kept.ready_primary, 40);
        assert_eq!(kept.topup, Tally { ok: 18, fail: 2 });
        assert!(!kept.used_fallback);
        assert_eq!(kept.cached, 50);
        assert_eq!(generator.total_calls(), 20);

        let entries = repo.cache_entries(tech).await.unwrap();
        let ranks: Vec<i64> = entries.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, (1..=50).collect::<Vec<_>>());

        // Newest first: all original ready rows, then the ten newest fresh successes.
        let mut expected = ready_ids.clone();
        expected.extend(
            fresh_ids
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != 3 && *i != 7)
                .map(|(_, id)| *id)
                .take(10),
        );
        let cached: Vec<i64> = entries.iter().map(|e| e.article_id).collect();
        assert_eq!(cached, expected);
    }

    #[tokio::test]
    async fn falls_back_to_wider_window_when_still_short() {
        let (repo, tech) = seeded_repository("tech").await;
        let now = Utc::now();
        // Primary window is 3 days: 5 ready inside, 8 ready between 4 and 6 days old.
        stock(&repo, tech, "recent", 5, 1, 5, now).await;
        stock(&repo, tech, "older", 8, 4 * 24, 8, now).await;
        stock(&repo, tech, "ancient", 3, 10 * 24, 3, now).await;

        let kept = ensure_category(&repo, None, &keeper_config(20), &category(&repo, "tech").await, now)
            .await
            .unwrap();

        assert_eq!(kept.ready_primary, 5);
        assert!(kept.used_fallback);
        assert_eq!(kept.cached, 13);
        assert_eq!(kept.topup, Tally::default());

        let entries = repo.cache_entries(tech).await.unwrap();
        assert_eq!(entries.len(), 13);
        assert_eq!(entries.last().unwrap().rank, 13);
    }

    #[tokio::test]
    async fn full_category_is_capped_and_dense() {
        let (repo, tech) = seeded_repository("tech").await;
        let now = Utc::now();
        let ids = stock(&repo, tech, "ready", 60, 1, 60, now).await;

        let generator = Arc::new(ScriptedGenerator::default());
        let summarizer = summarizer_for(&repo, generator.clone());
        let kept = ensure_category(&repo, Some(&summarizer), &keeper_config(50), &category(&repo, "tech").await, now)
            .await
            .unwrap();

        assert_eq!(kept.cached, 50);
        assert_eq!(generator.total_calls(), 0);
        let entries = repo.cache_entries(tech).await.unwrap();
        let cached: Vec<i64> = entries.iter().map(|e| e.article_id).collect();
        assert_eq!(cached, ids[..50].to_vec());
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.rank, i as i64 + 1);
            assert!(repo.get_summary(entry.article_id).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn rerun_replaces_the_previous_cache() {
        let (repo, tech) = seeded_repository("tech").await;
        let now = Utc::now();
        stock(&repo, tech, "ready", 10, 1, 10, now).await;
        let tech_category = category(&repo, "tech").await;

        ensure_category(&repo, None, &keeper_config(8), &tech_category, now).await.unwrap();
        let kept = ensure_category(&repo, None, &keeper_config(4), &tech_category, now).await.unwrap();

        assert_eq!(kept.cached, 4);
        assert_eq!(repo.cache_entries(tech).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn run_covers_every_category() {
        let repo = Repository::open_in_memory().await.unwrap();
        repo.seed_categories(vec!["tech".into(), "politics".into()]).await.unwrap();
        let tech = repo.category_id_by_slug("tech").await.unwrap().unwrap();
        let now = Utc::now();
        stock(&repo, tech, "ready", 3, 1, 3, now).await;

        let report = run(&repo, None, &keeper_config(5), now).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.categories.len(), 2);
        let politics = report.categories.iter().find(|c| c.category == "politics").unwrap();
        assert_eq!(politics.cached, 0);
        let tech_report = report.categories.iter().find(|c| c.category == "tech").unwrap();
        assert_eq!(tech_report.cached, 3);
    }

    #[tokio::test]
    async fn store_failure_aborts_only_that_category() {
        let repo = Repository::open_in_memory().await.unwrap();
        repo.seed_categories(vec!["politics".into(), "tech".into()]).await.unwrap();
        let politics = repo.category_id_by_slug("politics").await.unwrap().unwrap();
        let tech = repo.category_id_by_slug("tech").await.unwrap().unwrap();
        let now = Utc::now();
        stock(&repo, politics, "vote", 2, 1, 2, now).await;
        stock(&repo, tech, "ready", 3, 1, 3, now).await;

        repo.execute_batch(&format!(
            "CREATE TRIGGER reject_cache BEFORE INSERT ON feed_cache
             WHEN NEW.category_id = {politics}
             BEGIN SELECT RAISE(ABORT, 'cache write rejected'); END;"
        ))
        .await
        .unwrap();

        let report = run(&repo, None, &keeper_config(5), now).await.unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.aborted.len(), 1);
        assert_eq!(report.aborted[0].category, "politics");
        assert!(report.aborted[0].store_failure);
        assert!(report.aborted[0].error.contains("cache write rejected"));

        assert_eq!(report.categories.len(), 1);
        assert_eq!(report.categories[0].category, "tech");
        assert_eq!(repo.cache_entries(tech).await.unwrap().len(), 3);
        assert!(repo.cache_entries(politics).await.unwrap().is_empty());
    }
}
