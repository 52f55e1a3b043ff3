//! Shared helpers

/// Keys shorter than this are fully masked
const MIN_KEY_LENGTH_FOR_PARTIAL_DISPLAY: usize = 12;

/// Visible characters at each end of a masked key
const KEY_MASK_VISIBLE_CHARS: usize = 4;

/// Mask an API key for logs and Debug output.
#[must_use]
pub fn mask_api_key(key: &str) -> String {
    if key.len() <= MIN_KEY_LENGTH_FOR_PARTIAL_DISPLAY {
        return "****".to_string();
    }
    format!(
        "{}...{}",
        &key[..KEY_MASK_VISIBLE_CHARS],
        &key[key.len() - KEY_MASK_VISIBLE_CHARS..]
    )
}

/// Sanitize a provider error message before it reaches logs or callers.
///
/// Authentication and rate-limit details are replaced with generic text;
/// anything else is truncated to a reasonable length.
#[must_use]
pub fn sanitize_api_error(error: &str) -> String {
    let lower = error.to_lowercase();

    if lower.contains("api key")
        || lower.contains("apikey")
        || lower.contains("unauthorized")
        || lower.contains("authentication")
    {
        return "API authentication error. Check the API key configuration.".to_string();
    }

    if lower.contains("rate limit") || lower.contains("quota") || lower.contains("overloaded") {
        return "API rate limit exceeded. Try again later.".to_string();
    }

    if error.len() > 300 {
        let mut end = 300;
        while !error.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...(truncated)", &error[..end])
    } else {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_short_key() {
        assert_eq!(mask_api_key("short"), "****");
    }

    #[test]
    fn test_mask_long_key() {
        assert_eq!(mask_api_key("sk-abcdefghijklmnop"), "sk-a...mnop");
    }

    #[test]
    fn test_sanitize_auth_error() {
        let sanitized = sanitize_api_error("Invalid API key provided: sk-123");
        assert!(!sanitized.contains("sk-123"));
    }

    #[test]
    fn test_sanitize_passthrough() {
        assert_eq!(sanitize_api_error("model overloaded, retry"),
            "API rate limit exceeded. Try again later.");
        assert_eq!(sanitize_api_error("bad request"), "bad request");
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "x".repeat(500);
        let sanitized = sanitize_api_error(&long);
        assert!(sanitized.len() < 320);
        assert!(sanitized.ends_with("...(truncated)"));
    }
}
