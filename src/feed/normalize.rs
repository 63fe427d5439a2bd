use chrono::{DateTime, Utc};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::NewArticle;
use crate::text::truncate_chars;

use super::gnews::RawArticle;

pub const MAX_LEDE_CHARS: usize = 800;
pub const UNTITLED: &str = "(no title)";

/// Turn a provider item into an insertable article for `category_id`.
pub fn normalize(raw: &RawArticle, category_id: i64) -> Result<NewArticle> {
    let url = Url::parse(&raw.url)
        .map_err(|e| AppError::Provider(format!("invalid article url {:?}: {}", raw.url, e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| AppError::Provider(format!("article url has no host: {}", raw.url)))?;
    let source_domain = host.strip_prefix("www.").unwrap_or(host).to_string();

    let lede = [raw.description.as_deref(), raw.content.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(|s| truncate_chars(s, MAX_LEDE_CHARS).to_string())
        .unwrap_or_default();

    let title = raw
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNTITLED)
        .to_string();

    let published_at = DateTime::parse_from_rfc3339(raw.published_at.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            AppError::Provider(format!("invalid publishedAt {:?}: {}", raw.published_at, e))
        })?;

    let source_name = raw
        .source
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| source_domain.clone());

    Ok(NewArticle {
        url: raw.url.clone(),
        title,
        lede,
        source_name,
        source_domain,
        image_url: raw.image.clone().filter(|i| !i.is_empty()),
        published_at,
        category_id,
    })
}
