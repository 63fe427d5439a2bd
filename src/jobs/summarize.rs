use crate::ai::Summarizer;
use crate::config::SummarizerConfig;
use crate::db::Repository;
use crate::error::Result;
use crate::models::SummarizeReport;

/// Summarize the newest unsummarized articles across all categories.
pub async fn run(
    repository: &Repository,
    summarizer: &Summarizer,
    config: &SummarizerConfig,
) -> Result<SummarizeReport> {
    let batch = repository.unsummarized_recent(config.batch_size).await?;
    let picked = batch.len();
    if picked == 0 {
        tracing::info!("nothing to summarize");
        return Ok(SummarizeReport::default());
    }

    tracing::info!(picked, "summarizing batch");
    let tally = summarizer.summarize_batch(batch, config.parallel).await.tally();

    tracing::info!(picked, ok = tally.ok, fail = tally.fail, "summarize finished");
    Ok(SummarizeReport {
        picked,
        ok: tally.ok,
        fail: tally.fail,
    })
}
