//! Model response parsing.
//!
//! Models wrap JSON in prose more often than not. Three strategies run in
//! order and the first that yields valid JSON wins:
//! 1. fenced ```json block
//! 2. first balanced `{...}` span
//! 3. the raw response as-is

use super::FieldError;

/// Parse a model response into a JSON object using the strategy chain.
pub fn parse_json_response(response: &str) -> Result<serde_json::Value, FieldError> {
    if let Some(fenced) = extract_fenced_block(response) {
        if let Ok(value) = serde_json::from_str(fenced.trim()) {
            return Ok(value);
        }
    }

    if let Some(span) = extract_balanced_object(response) {
        if let Ok(value) = serde_json::from_str(span) {
            return Ok(value);
        }
    }

    serde_json::from_str(response.trim()).map_err(|e| FieldError::ParseFailed {
        reason: e.to_string(),
        raw_response: response.to_string(),
    })
}

/// Content of the first ```json fenced block, if any. A bare ``` fence
/// also counts when its body starts with `{`.
fn extract_fenced_block(response: &str) -> Option<&str> {
    let start = response.find("```json").map(|i| i + 7).or_else(|| {
        let i = response.find("```")? + 3;
        response[i..].trim_start().starts_with('{').then_some(i)
    })?;
    let end = response[start..].find("```")?;
    Some(&response[start..start + end])
}

/// First balanced `{...}` span, brace-counting with string awareness.
fn extract_balanced_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let bytes = response.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&response[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
