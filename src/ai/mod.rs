mod groq;
mod prompt;
mod schema;
mod summarizer;

use async_trait::async_trait;

use crate::error::Result;

pub use groq::GroqClient;
pub use prompt::Prompt;
pub use summarizer::Summarizer;

/// A text generator that answers a prompt with raw (unvalidated) model output.
#[async_trait]
pub trait SummaryGenerator: Send + Sync {
    /// Failures must be tagged rate-limit or timeout where the backend says so,
    /// since retry decisions are made from the tag alone.
    async fn generate(&self, prompt: &Prompt) -> Result<String>;

    fn model_version(&self) -> &str;
}
