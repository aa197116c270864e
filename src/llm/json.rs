//! JSON extraction from chat-completion replies.
//!
//! Models asked for "JSON only" still wrap it in markdown fences or chatty
//! prose. [`extract_json`] digs the object out before deserialization.

/// Extract the JSON object from a model reply.
///
/// Tries, in order:
/// 1. A ` ```json ` fenced block
/// 2. A bare ` ``` ` fenced block whose content starts with `{`
/// 3. The first `{` that starts a parseable object in the surrounding text
/// 4. The trimmed input unchanged
pub fn extract_json(reply: &str) -> String {
    let trimmed = reply.trim();

    if let Some(inner) = fenced_block(trimmed, "```json") {
        return inner.to_string();
    }

    if let Some(inner) = fenced_block(trimmed, "```")
        && inner.starts_with('{')
    {
        return inner.to_string();
    }

    first_object(trimmed).unwrap_or_else(|| trimmed.to_string())
}

/// Trimmed content between `opener` and the next closing fence.
fn fenced_block<'a>(text: &'a str, opener: &str) -> Option<&'a str> {
    let start = text.find(opener)? + opener.len();
    let end = text[start..].find("```")?;
    Some(text[start..start + end].trim())
}

/// First `{`-anchored substring that parses as a JSON object.
fn first_object(text: &str) -> Option<String> {
    text.match_indices('{').find_map(|(idx, _)| {
        let candidate = &text[idx..];
        let object = balanced_object(candidate)?;
        serde_json::from_str::<serde_json::Value>(object)
            .ok()
            .filter(serde_json::Value::is_object)
            .map(|_| object.to_string())
    })
}

/// Prefix of `text` up to the brace closing its first `{`.
///
/// String literals (with escapes) are skipped, so braces inside a commit
/// description do not unbalance the scan.
fn balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..=idx]);
                }
            }
            _ => {}
        }
    }

    None
}
