//! External reference recognition
//!
//! A reference is a string starting with a URI-style scheme followed by a
//! colon, such as `ssm:/app/db/password`, `s3://bucket/key` or `env:HOME`.
//! The scheme is matched case-insensitively and is the reference's protocol.

/// Extract the lower-cased protocol of a reference, `None` for plain strings
pub fn extract_protocol(value: &str) -> Option<String> {
    let (scheme, _) = value.split_once(':')?;

    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-')) {
        return None;
    }

    Some(scheme.to_ascii_lowercase())
}

/// Check whether a string looks like an external reference
pub fn is_reference(value: &str) -> bool {
    extract_protocol(value).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_protocol() {
        assert_eq!(extract_protocol("ssm:/app/db/password").as_deref(), Some("ssm"));
        assert_eq!(extract_protocol("s3://bucket/key").as_deref(), Some("s3"));
        assert_eq!(extract_protocol("env:HOME").as_deref(), Some("env"));
        assert_eq!(extract_protocol("SSM:/upper").as_deref(), Some("ssm"));
        assert_eq!(
            extract_protocol("git+ssh://host/repo").as_deref(),
            Some("git+ssh")
        );
    }

    #[test]
    fn test_plain_strings_are_not_references() {
        assert!(!is_reference("plain"));
        assert!(!is_reference(""));
        assert!(!is_reference(":/no-scheme"));
        assert!(!is_reference("1abc:/digit-first"));
        assert!(!is_reference("has space:/x"));
        assert!(!is_reference("under_score:x"));
    }

    #[test]
    fn test_colon_in_value_after_scheme() {
        assert_eq!(
            extract_protocol("http://host:8080/path").as_deref(),
            Some("http")
        );
    }
}
