/*
[INPUT]:  API key and secret strings
[OUTPUT]: Immutable credentials that never print their secret
[POS]:    Auth layer - credential storage
[UPDATE]: When credential fields or validation rules change
*/

use std::fmt;

use crate::http::{BydfiError, Result};

/// API key pair for authenticated endpoints
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
}

impl Credentials {
    /// Create credentials, rejecting blank values
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        let api_secret = api_secret.into();

        if api_key.trim().is_empty() {
            return Err(BydfiError::Config("API key must not be empty".to_string()));
        }
        if api_secret.trim().is_empty() {
            return Err(BydfiError::Config("API secret must not be empty".to_string()));
        }

        Ok(Self {
            api_key,
            api_secret,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub(crate) fn api_secret(&self) -> &str {
        &self.api_secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_values_rejected() {
        assert!(matches!(
            Credentials::new("", "secret"),
            Err(BydfiError::Config(_))
        ));
        assert!(matches!(
            Credentials::new("key", "   "),
            Err(BydfiError::Config(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let credentials = Credentials::new("my-key", "my-secret").unwrap();
        let printed = format!("{credentials:?}");
        assert!(!printed.contains("my-key"));
        assert!(!printed.contains("my-secret"));
        assert_eq!(credentials.api_key(), "my-key");
    }
}
