use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::SummarizerConfig;
use crate::error::{AppError, Result};

use super::prompt::Prompt;
use super::SummaryGenerator;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    code: Option<String>,
}

/// Chat-completions client for Groq's OpenAI-compatible API, in JSON mode.
pub struct GroqClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl GroqClient {
    pub fn new(api_key: String, config: &SummarizerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_output_tokens,
        })
    }
}

#[async_trait]
impl SummaryGenerator for GroqClient {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
            messages: vec![
                Message {
                    role: "system",
                    content: &prompt.system,
                },
                Message {
                    role: "user",
                    content: &prompt.user,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_response(status, &headers, &body));
        }

        let chat: ChatResponse = response.json().await.map_err(classify_transport)?;

        Ok(chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_else(|| "{}".to_string()))
    }

    fn model_version(&self) -> &str {
        &self.model
    }
}

fn classify_transport(err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::timed_out(err.without_url().to_string())
    } else {
        AppError::Upstream(err.without_url().to_string())
    }
}

/// Tag a non-2xx reply. This is the only place error text is inspected.
fn classify_response(status: StatusCode, headers: &HeaderMap, body: &str) -> AppError {
    let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let (message, code) = match envelope.error {
        Some(err) => (err.message, err.code),
        None => (body.to_string(), None),
    };
    let message = format!("HTTP {}: {}", status.as_u16(), message);

    let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
        || code.as_deref() == Some("rate_limit_exceeded");
    if rate_limited {
        let retry_after = retry_after_header(headers).or_else(|| retry_after_hint(&message));
        return AppError::rate_limited(message, retry_after);
    }

    if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        return AppError::timed_out(message);
    }

    AppError::Upstream(message)
}

fn retry_after_header(headers: &HeaderMap) -> Option<Duration> {
    let secs: f64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

/// "Please try again in 7.66s" style hints embedded in the error message.
fn retry_after_hint(message: &str) -> Option<Duration> {
    static HINT: OnceLock<Option<Regex>> = OnceLock::new();
    let re = HINT
        .get_or_init(|| Regex::new(r"(?i)try again in ([0-9]+(?:\.[0-9]+)?)\s*s").ok())
        .as_ref()?;

    let secs: f64 = re.captures(message)?.get(1)?.as_str().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}
