/// Pull one JSON object out of a model response. Handles a bare object, a
/// fenced ```json block, and an object embedded in surrounding prose.
pub fn extract_json_object(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed.to_string());
    }

    if let Some(block) = fenced_block(raw) {
        if let Some(object) = balanced_object(block) {
            return Some(object);
        }
    }

    balanced_object(raw)
}

fn fenced_block(raw: &str) -> Option<&str> {
    let start = raw.find("```")? + 3;
    let rest = &raw[start..];
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '_');
    let end = rest.find("```")?;
    Some(&rest[..end])
}

/// First balanced `{...}` group. Depth counting ignores braces inside JSON
/// strings, which is tolerable for model output.
fn balanced_object(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in raw[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(raw[start..start + offset + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }
    None
}
