use serde_json::Value;

use crate::error::{AppError, Result};
use crate::text::truncate_chars;

pub const BULLET_COUNT: usize = 5;
pub const MIN_BULLET_CHARS: usize = 3;
pub const MAX_BULLET_CHARS: usize = 180;
pub const MIN_WHY_CHARS: usize = 10;
/// Upper bound accepted from the model; stored text is capped lower.
pub const MAX_WHY_ACCEPTED_CHARS: usize = 300;
pub const MAX_WHY_CHARS: usize = 280;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryPayload {
    pub bullets: Vec<String>,
    pub why_it_matters: String,
}

/// Parse and validate raw model output, then trim and cap every field.
///
/// Invalid JSON is a [`AppError::Parse`]; JSON of the wrong shape or length is
/// a [`AppError::Schema`]. Neither is repaired.
pub fn parse_summary(raw: &str) -> Result<SummaryPayload> {
    let value: Value = serde_json::from_str(raw).map_err(|e| AppError::Parse(e.to_string()))?;

    let object = value
        .as_object()
        .ok_or_else(|| AppError::Schema("expected a JSON object".into()))?;

    let bullets = object
        .get("bullets")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::Schema("`bullets` must be an array".into()))?;
    if bullets.len() != BULLET_COUNT {
        return Err(AppError::Schema(format!(
            "expected {} bullets, got {}",
            BULLET_COUNT,
            bullets.len()
        )));
    }

    let bullets = bullets
        .iter()
        .enumerate()
        .map(|(i, bullet)| {
            let text = bullet
                .as_str()
                .ok_or_else(|| AppError::Schema(format!("bullet {} is not a string", i + 1)))?
                .trim();
            let text = truncate_chars(text, MAX_BULLET_CHARS).trim_end();
            if text.chars().count() < MIN_BULLET_CHARS {
                return Err(AppError::Schema(format!("bullet {} is too short", i + 1)));
            }
            Ok(text.to_string())
        })
        .collect::<Result<Vec<_>>>()?;

    let why = object
        .get("why_it_matters")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Schema("`why_it_matters` must be a string".into()))?
        .trim();
    let why_len = why.chars().count();
    if !(MIN_WHY_CHARS..=MAX_WHY_ACCEPTED_CHARS).contains(&why_len) {
        return Err(AppError::Schema(format!(
            "`why_it_matters` has {} chars, expected {}..={}",
            why_len, MIN_WHY_CHARS, MAX_WHY_ACCEPTED_CHARS
        )));
    }

    let why = truncate_chars(why, MAX_WHY_CHARS).trim_end();
    if why.chars().count() < MIN_WHY_CHARS {
        return Err(AppError::Schema(
            "`why_it_matters` is too short once capped".into(),
        ));
    }

    Ok(SummaryPayload {
        bullets,
        why_it_matters: why.to_string(),
    })
}
