//! API key wrapper that keeps credentials out of logs.
//!
//! [`ApiKey`] is what providers hold once a credential has been resolved.
//! Its `Debug` and `Display` output never contain the key, and it cannot be
//! serialized, so a provider can derive or print debug state freely.

use std::fmt;

/// A resolved vendor API key.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key. Returns `None` for empty or whitespace-only input so a
    /// blank env var counts as "not set".
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    /// Read a key from an environment variable.
    pub fn from_env(var: &str) -> Option<Self> {
        std::env::var(var).ok().and_then(Self::new)
    }

    /// The actual key. Only for building request headers.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(\"[REDACTED]\")")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_and_display_redact() {
        let key = ApiKey::new("sk-secret-123").unwrap();
        assert!(!format!("{key:?}").contains("sk-secret-123"));
        assert!(!format!("{key}").contains("sk-secret-123"));
        assert_eq!(format!("{key}"), "[REDACTED]");
    }

    #[test]
    fn blank_values_are_rejected() {
        assert!(ApiKey::new("").is_none());
        assert!(ApiKey::new("   ").is_none());
    }

    #[test]
    fn expose_returns_value() {
        assert_eq!(ApiKey::new("abc").unwrap().expose(), "abc");
    }

    #[test]
    fn from_env_missing_var_is_none() {
        assert!(ApiKey::from_env("THINKTANK_TYPES_TEST_NO_SUCH_VAR_4821").is_none());
    }
}
