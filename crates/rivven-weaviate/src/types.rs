//! Credential handling
//!
//! API keys, WCS passwords and module header values are held as
//! [`SensitiveString`] from configuration parsing until the request that
//! needs them. The host hands unset parameters over as `""`, so an empty
//! secret is treated like a missing one.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

const REDACTED: &str = "[REDACTED]";

/// Secret configuration value.
///
/// Formats as `[REDACTED]` and serializes as `"***REDACTED***"`, so
/// `DestinationConfig` can be logged or dumped as a whole.
///
/// ```rust
/// use rivven_weaviate::SensitiveString;
///
/// let key = SensitiveString::new("weaviate-api-key");
/// assert_eq!(format!("{:?}", key), "[REDACTED]");
/// assert_eq!(key.expose_secret(), "weaviate-api-key");
/// ```
#[derive(Clone)]
pub struct SensitiveString(SecretString);

impl SensitiveString {
    /// Wrap a secret
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::new(value.into().into_boxed_str()))
    }

    /// Plain value, for building a request header or token form
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }

    /// True for `""`
    pub fn is_empty(&self) -> bool {
        self.expose_secret().is_empty()
    }
}

impl fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for SensitiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl Serialize for SensitiveString {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***REDACTED***")
    }
}

impl<'de> Deserialize<'de> for SensitiveString {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// The secret, if one was configured and it is not blank.
pub(crate) fn non_empty(secret: &Option<SensitiveString>) -> Option<&SensitiveString> {
    secret.as_ref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_never_formatted() {
        let key = SensitiveString::new("wv-key-123");
        assert_eq!(format!("{:?}", key), "[REDACTED]");
        assert_eq!(key.to_string(), "[REDACTED]");
        assert_eq!(
            serde_json::to_string(&key).unwrap(),
            "\"***REDACTED***\""
        );
    }

    #[test]
    fn test_password_from_config_json() {
        let password: SensitiveString = serde_json::from_str("\"wcs-pass\"").unwrap();
        assert_eq!(password.expose_secret(), "wcs-pass");
        assert!(!password.is_empty());
    }

    #[test]
    fn test_blank_secret_counts_as_unset() {
        assert!(non_empty(&None).is_none());
        assert!(non_empty(&Some(SensitiveString::new(""))).is_none());
        assert_eq!(
            non_empty(&Some(SensitiveString::new("k"))).map(|s| s.expose_secret()),
            Some("k")
        );
    }
}
