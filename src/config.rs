use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::services::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    pub gnews_api_key: Option<String>,
    pub groq_api_key: Option<String>,

    #[serde(default)]
    pub gnews: GNewsConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub summarizer: SummarizerConfig,

    #[serde(default)]
    pub keeper: KeeperConfig,

    #[serde(default)]
    pub extractor: ExtractorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GNewsConfig {
    pub base_url: String,
    /// Empty string leaves the parameter off the request.
    pub lang: String,
    pub country: String,
    pub max_per_page: u32,
    pub max_pages: u32,
    pub timeout_secs: u64,
}

impl Default for GNewsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gnews.io/api/v4/search".to_string(),
            lang: "en".to_string(),
            country: "us".to_string(),
            max_per_page: 10,
            max_pages: 2,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub categories: Vec<String>,
    pub parallel: usize,
    pub queries: BTreeMap<String, String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let queries: BTreeMap<String, String> = [
            ("business", "(business OR corporate OR industry)"),
            (
                "finance",
                r#"(finance OR banking OR fintech OR "interest rates" OR "central bank")"#,
            ),
            (
                "markets",
                r#"(markets OR "stock market" OR stocks OR equities OR bonds OR commodities OR forex OR crypto)"#,
            ),
            (
                "startups",
                r#"(startup OR "seed funding" OR "Series A" OR "venture capital" OR VC)"#,
            ),
            (
                "tech",
                r#"(technology OR tech OR software OR AI OR "artificial intelligence" OR gadgets OR semiconductor)"#,
            ),
            (
                "politics",
                "(politics OR government OR election OR policy OR parliament OR congress)",
            ),
        ]
        .into_iter()
        .map(|(slug, query)| (slug.to_string(), query.to_string()))
        .collect();

        Self {
            categories: ["business", "finance", "markets", "startups", "tech", "politics"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            parallel: 2,
            queries,
        }
    }
}

impl IngestConfig {
    pub fn query_for(&self, slug: &str) -> Result<&str> {
        self.queries
            .get(slug)
            .map(String::as_str)
            .ok_or_else(|| AppError::Config(format!("No query configured for slug={}", slug)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub base_url: String,
    pub model: String,
    pub batch_size: usize,
    pub parallel: usize,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub max_context_chars: usize,
    pub timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            batch_size: 12,
            parallel: 3,
            temperature: 0.2,
            max_output_tokens: 450,
            max_context_chars: 6000,
            timeout_secs: 20,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
    pub retry_after_buffer_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 2500,
            max_delay_ms: 20_000,
            jitter_ms: 300,
            retry_after_buffer_ms: 500,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: Duration::from_millis(self.jitter_ms),
            retry_after_buffer: Duration::from_millis(self.retry_after_buffer_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeeperConfig {
    pub min_ready: usize,
    pub window_days_primary: i64,
    pub window_days_fallback: i64,
    pub max_new_summaries: usize,
    /// Concurrent top-up generations; 1 serializes calls upstream.
    pub parallel: usize,
    pub buffer_factor: usize,
    pub ready_scan_limit: usize,
    pub unsummarized_scan_limit: usize,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            min_ready: 50,
            window_days_primary: 3,
            window_days_fallback: 7,
            max_new_summaries: 24,
            parallel: 1,
            buffer_factor: 2,
            ready_scan_limit: 300,
            unsummarized_scan_limit: 400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub timeout_secs: u64,
    pub min_chars: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            min_chars: 200,
        }
    }
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quick-brew");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("news.db").to_string_lossy().to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self::with_db_path(default_db_path())
    }
}

impl Config {
    /// Defaults for every section, stored at `db_path`. Unlike `default()`
    /// this never touches the user data directory.
    pub fn with_db_path(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            gnews_api_key: None,
            groq_api_key: None,
            gnews: GNewsConfig::default(),
            ingest: IngestConfig::default(),
            summarizer: SummarizerConfig::default(),
            keeper: KeeperConfig::default(),
            extractor: ExtractorConfig::default(),
        }
    }

    /// Load from `path` (or the default location), writing defaults when the
    /// file does not exist yet, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save(&config_path)?;
            config
        };

        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quick-brew")
            .join("config.toml")
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("GNEWS_API_KEY") {
            self.gnews_api_key = Some(key);
        }
        if let Some(key) = non_empty("GROQ_API_KEY") {
            self.groq_api_key = Some(key);
        }
        if let Some(path) = non_empty("QUICK_BREW_DB") {
            self.db_path = path;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let keeper = &self.keeper;
        if keeper.window_days_primary <= 0 {
            return Err(AppError::Config(
                "keeper.window_days_primary must be positive".into(),
            ));
        }
        if keeper.window_days_fallback <= keeper.window_days_primary {
            return Err(AppError::Config(format!(
                "keeper.window_days_fallback ({}) must exceed window_days_primary ({})",
                keeper.window_days_fallback, keeper.window_days_primary
            )));
        }
        if self.summarizer.retry.max_attempts == 0 {
            return Err(AppError::Config(
                "summarizer.retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.gnews.max_per_page == 0 || self.gnews.max_pages == 0 {
            return Err(AppError::Config(
                "gnews.max_per_page and gnews.max_pages must be at least 1".into(),
            ));
        }
        for slug in &self.ingest.categories {
            self.ingest.query_for(slug)?;
        }
        if keeper.parallel > 2 {
            tracing::warn!(
                "keeper.parallel = {} may trigger upstream rate limits during top-up",
                keeper.parallel
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_db_path_keeps_section_defaults() {
        let config = Config::with_db_path(":memory:");
        assert_eq!(config.db_path, ":memory:");
        assert!(config.gnews_api_key.is_none());
        assert!(config.groq_api_key.is_none());
        assert_eq!(config.keeper.min_ready, KeeperConfig::default().min_ready);
        assert_eq!(config.ingest.categories, IngestConfig::default().categories);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn defaults_match_pipeline_constants() {
        let config = Config::with_db_path("news.db");
        assert_eq!(config.keeper.min_ready, 50);
        assert_eq!(config.keeper.window_days_primary, 3);
        assert_eq!(config.keeper.window_days_fallback, 7);
        assert_eq!(config.keeper.max_new_summaries, 24);
        assert_eq!(config.summarizer.retry.max_attempts, 5);
        assert_eq!(config.ingest.categories.len(), 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(config.gnews.max_per_page, 10);
    }

    #[test]
    fn partial_file_keeps_section_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "db_path = \"/tmp/qb.db\"\n[keeper]\nmin_ready = 20\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.db_path, "/tmp/qb.db");
        assert_eq!(config.keeper.min_ready, 20);
        assert_eq!(config.keeper.window_days_fallback, 7);
        assert_eq!(config.summarizer.model, "llama-3.1-8b-instant");
    }

    #[test]
    fn env_overrides_credentials() {
        let mut config = Config::with_db_path("news.db");
        config.apply_env(|name| match name {
            "GROQ_API_KEY" => Some("groq-key".to_string()),
            "GNEWS_API_KEY" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.groq_api_key.as_deref(), Some("groq-key"));
        assert_eq!(config.gnews_api_key, None);
    }

    #[test]
    fn fallback_window_must_exceed_primary() {
        let mut config = Config::default();
        config.keeper.window_days_fallback = 3;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn category_without_query_is_rejected() {
        let mut config = Config::default();
        config.ingest.categories.push("sports".to_string());
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }
}
