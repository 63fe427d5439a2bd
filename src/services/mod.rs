pub mod batch;
mod content_fetcher;
pub mod retry;

pub use batch::{fan_out, BatchOutcome, Tally};
pub use content_fetcher::{ContentExtractor, ContentFetcher};
pub use retry::{with_retries, RetryPolicy};
