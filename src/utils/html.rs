/// Sanitizes user-entered free text before it is stored.
///
/// Uses ammonia's whitelist: harmless inline markup survives, while
/// `<script>`, event handler attributes and similar are stripped.
/// Surrounding whitespace is trimmed.
pub fn clean_text(input: &str) -> String {
    ammonia::clean(input.trim())
}

/// `clean_text` for optional fields; blank input becomes `None`.
pub fn clean_optional(input: &str) -> Option<String> {
    let cleaned = clean_text(input);
    if cleaned.trim().is_empty() { None } else { Some(cleaned) }
}
