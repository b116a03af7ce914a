use crate::error::KeyError;
use regex::Regex;
use std::sync::OnceLock;

const KEY_PATTERN: &str = r"^[a-z0-9\-_]+$";

/// Syntactic gate applied to every key before it is hashed or stored.
pub trait KeyValidator: Send + Sync {
    fn is_valid(&self, key: &str) -> bool;

    fn validate(&self, key: &str) -> Result<(), KeyError> {
        if self.is_valid(key) {
            Ok(())
        } else {
            Err(KeyError::Invalid {
                key: key.to_string(),
            })
        }
    }
}

/// Accepts non-empty strings of lower case ASCII letters, digits, `-` and `_`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternKeyValidator;

impl PatternKeyValidator {
    pub fn new() -> Self {
        Self
    }

    fn pattern() -> &'static Regex {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        PATTERN.get_or_init(|| Regex::new(KEY_PATTERN).expect("key pattern is a valid regex"))
    }
}

impl KeyValidator for PatternKeyValidator {
    fn is_valid(&self, key: &str) -> bool {
        Self::pattern().is_match(key)
    }
}
