use chrono::{DateTime, SecondsFormat, Utc};

/// System and user messages for one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

pub struct PromptInput<'a> {
    pub title: &'a str,
    pub source: &'a str,
    pub published_at: DateTime<Utc>,
    pub text: &'a str,
}

const SYSTEM_PROMPT: &str = "\
You summarize news articles precisely.
Reply with one strict JSON object and nothing else: no preface, no markdown.
Rules:
- Stay extractive. Never add facts that are not in the provided text.
- Write short sentences dense with information.
- Keep a neutral tone.
- When key information is missing, state that it is missing.
- Match the schema exactly.";

const INSTRUCTIONS: &str = "\
Write exactly 5 bullets covering the key facts.
Add one concise 'why it matters' line about impact or context.
Do not include URLs, emojis or markdown.
Return ONLY valid JSON that follows the schema.";

const SCHEMA: &str = r#"Schema:
{
  "bullets": [ "string", "string", "string", "string", "string" ],
  "why_it_matters": "string"
}"#;

pub fn build_prompt(input: &PromptInput<'_>) -> Prompt {
    let header = format!(
        "Title: {}\nSource: {}\nPublished at: {}",
        input.title,
        input.source,
        input.published_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    let body = format!("Article text/snippet:\n{}", input.text);

    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user: [header.as_str(), "", &body, "", INSTRUCTIONS, "", SCHEMA].join("\n"),
    }
}
