use base64::Engine;

/// Clip to `max_chars` characters, appending an ellipsis when clipped.
///
/// Char-based, not byte-based, so multi-byte addresses don't panic.
pub fn clip_with_ellipsis(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

/// Opaque url-safe token for share links (22 chars, 122 bits of randomness).
pub fn url_safe_token() -> String {
    let bytes = *uuid::Uuid::new_v4().as_bytes();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_keeps_short_strings() {
        assert_eq!(clip_with_ellipsis("Shop 12, Main Market", 40), "Shop 12, Main Market");
    }

    #[test]
    fn clip_appends_ellipsis_past_limit() {
        let long = "a".repeat(45);
        let clipped = clip_with_ellipsis(&long, 40);
        assert_eq!(clipped.len(), 43);
        assert!(clipped.ends_with("..."));
    }

    #[test]
    fn clip_counts_chars_not_bytes() {
        let s = "néné".repeat(15); // 60 chars
        let clipped = clip_with_ellipsis(&s, 40);
        assert_eq!(clipped.chars().count(), 43);
    }

    #[test]
    fn tokens_are_url_safe_and_unique() {
        let a = url_safe_token();
        let b = url_safe_token();
        assert_ne!(a, b);
        assert!(!a.contains('+') && !a.contains('/') && !a.contains('='));
    }
}
