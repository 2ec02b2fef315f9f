//! Parsing of the oracle's raw text answer into a tag list.

use crate::ProviderError;

/// Strips Markdown code fences the model sometimes wraps its answer in.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string (`json`, `JSON`, ...) on the opening fence.
        text = match rest.find('\n') {
            Some(idx) if rest[..idx].chars().all(|c| c.is_ascii_alphanumeric()) => &rest[idx + 1..],
            _ => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parses `["a", "b"]`, tolerating fences. Empty output means no match.
pub fn parse_tag_list(raw: &str) -> Result<Vec<String>, ProviderError> {
    let body = strip_code_fences(raw);
    if body.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Vec<String>>(body).map_err(|e| {
        let preview: String = body.chars().take(120).collect();
        ProviderError::MalformedResponse(format!("{e}: {preview:?}"))
    })
}
