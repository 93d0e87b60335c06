//! Field validation shared by users and rooms.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::GatewayError;

/// One or more letters, numbers, punctuation or symbols; no whitespace.
static NAME_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| match Regex::new(r"^[\p{L}\p{N}\p{P}\p{S}]+$") {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::error!(error = %e, "name pattern failed to compile");
            None
        }
    });

/// Whether `value` is an acceptable username or room name.
#[must_use]
pub fn is_valid_name(value: &str) -> bool {
    NAME_PATTERN.as_ref().is_some_and(|re| re.is_match(value))
}

/// Validates an optional name field, failing with `message`.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidArgument`] if the value is missing or
/// does not match the name pattern.
pub fn require_name(value: Option<String>, message: &str) -> Result<String, GatewayError> {
    match value {
        Some(name) if is_valid_name(&name) => Ok(name),
        _ => Err(GatewayError::InvalidArgument(message.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_unicode_names() {
        assert!(is_valid_name("neon"));
        assert!(is_valid_name("café_42!"));
        assert!(is_valid_name("東京"));
        assert!(is_valid_name("🦀"));
    }

    #[test]
    fn rejects_whitespace_and_empty() {
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("two words"));
        assert!(!is_valid_name("tab\there"));
        assert!(!is_valid_name("trailing\n"));
    }

    #[test]
    fn require_name_uses_message() {
        assert!(require_name(Some("ok".into()), "bad").is_ok());
        assert!(matches!(
            require_name(None, "Invalid room name"),
            Err(GatewayError::InvalidArgument(m)) if m == "Invalid room name"
        ));
    }
}
