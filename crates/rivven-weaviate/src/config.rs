//! Destination configuration
//!
//! The host runtime hands over configuration as a flat map of dotted keys
//! with string values:
//!
//! ```text
//! endpoint            = localhost:8080
//! scheme              = http
//! class               = Products
//! auth.mechanism      = apiKey
//! auth.apiKey         = ...
//! moduleHeader.name   = X-OpenAI-Api-Key
//! moduleHeader.value  = ...
//! generateUUID        = true
//! ```
//!
//! [`DestinationConfig::from_raw`] nests the keys, deserializes them and runs
//! field-level (`validator`) and cross-field validation. The result is
//! immutable for the lifetime of the destination.
//!
//! # Authentication
//!
//! `auth.mechanism` selects exactly one credential source:
//!
//! | mechanism  | required                                  | rejected                        |
//! |------------|-----------------------------------------------------|----------------------------------|
//! | `none`     | -                                                   | `auth.apiKey`, `auth.wcsCreds.*` |
//! | `apiKey`   | `auth.apiKey`                                       | `auth.wcsCreds.*`                |
//! | `wcsCreds` | `auth.wcsCreds.username`, `auth.wcsCreds.password`  | `auth.apiKey`                    |
//!
//! Empty values count as unset, so `scheme = ""` and `auth.mechanism = ""`
//! fall back to their defaults.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::client::{ClientAuth, ClientConfig};
use crate::error::{ConnectorError, Result};
use crate::types::{non_empty, SensitiveString};

/// URL scheme used to reach Weaviate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Plain HTTP
    Http,
    /// HTTP over TLS
    #[default]
    Https,
}

impl Scheme {
    /// Scheme as used in URLs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the connector authenticates against Weaviate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum AuthMechanism {
    /// Anonymous access
    #[default]
    #[serde(rename = "none")]
    None,
    /// Static API key sent as a bearer token
    #[serde(rename = "apiKey")]
    ApiKey,
    /// Weaviate Cloud Services username/password (OIDC password grant)
    #[serde(rename = "wcsCreds")]
    WcsCreds,
}

impl fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::ApiKey => f.write_str("apiKey"),
            Self::WcsCreds => f.write_str("wcsCreds"),
        }
    }
}

/// Weaviate Cloud Services credentials
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WcsCredentials {
    /// WCS username
    #[serde(default)]
    pub username: String,
    /// WCS password
    #[serde(default)]
    pub password: Option<SensitiveString>,
}

impl WcsCredentials {
    fn is_empty(&self) -> bool {
        self.username.is_empty() && non_empty(&self.password).is_none()
    }
}

/// Authentication settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// Selected mechanism
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub mechanism: AuthMechanism,
    /// Weaviate API key
    #[serde(default)]
    pub api_key: Option<SensitiveString>,
    /// WCS credentials (`auth.wcsCreds.*`)
    #[serde(default, rename = "wcsCreds")]
    pub wcs: WcsCredentials,
}

impl AuthConfig {
    /// Check that the credentials match the selected mechanism.
    pub fn validate_mechanism(&self) -> std::result::Result<(), String> {
        let has_api_key = non_empty(&self.api_key).is_some();
        let has_wcs = !self.wcs.is_empty();

        match self.mechanism {
            AuthMechanism::None => {
                if has_api_key || has_wcs {
                    return Err(
                        "auth.mechanism is 'none', but credentials were specified".to_string()
                    );
                }
            }
            AuthMechanism::ApiKey => {
                if !has_api_key {
                    return Err(
                        "auth.mechanism set to 'apiKey', but auth.apiKey not specified"
                            .to_string(),
                    );
                }
                if has_wcs {
                    return Err(
                        "auth.mechanism set to 'apiKey', but WCS credentials were also specified"
                            .to_string(),
                    );
                }
            }
            AuthMechanism::WcsCreds => {
                if self.wcs.username.is_empty() || non_empty(&self.wcs.password).is_none() {
                    return Err("username or password missing".to_string());
                }
                if has_api_key {
                    return Err(
                        "auth.mechanism set to 'wcsCreds', but auth.apiKey was also specified"
                            .to_string(),
                    );
                }
            }
        }
        Ok(())
    }
}

/// Extra header forwarded to Weaviate modules (e.g. `X-OpenAI-Api-Key`)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ModuleHeader {
    /// Header name
    #[serde(default)]
    pub name: String,
    /// Header value
    #[serde(default)]
    pub value: Option<SensitiveString>,
}

impl ModuleHeader {
    /// Both name and value set
    pub fn is_set(&self) -> bool {
        !self.name.is_empty() && non_empty(&self.value).is_some()
    }

    /// Both set or both empty
    pub fn is_valid(&self) -> bool {
        self.is_set() || (self.name.is_empty() && non_empty(&self.value).is_none())
    }
}

/// Configuration for the Weaviate destination
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DestinationConfig {
    /// Host (and optional port) of the Weaviate instance
    #[validate(length(min = 1, max = 2048))]
    pub endpoint: String,

    /// Scheme of the Weaviate instance
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub scheme: Scheme,

    /// Authentication settings
    #[serde(default)]
    pub auth: AuthConfig,

    /// Class records are written to unless they carry `weaviate.class`
    #[validate(length(min = 1, max = 255))]
    pub class: String,

    /// Header forwarded to vectorizer modules
    #[serde(default)]
    pub module_header: ModuleHeader,

    /// Derive object IDs as MD5 (v3) UUIDs of record keys instead of using
    /// the key text as-is
    #[serde(default, rename = "generateUUID", deserialize_with = "lenient::flag")]
    pub generate_uuid: bool,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs", deserialize_with = "lenient::number")]
    #[validate(range(min = 1, max = 300))]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl DestinationConfig {
    /// Parse and validate the host's flat configuration map.
    pub fn from_raw(raw: &HashMap<String, String>) -> Result<Self> {
        let nested = nest_keys(raw)?;
        let config: Self = serde_json::from_value(nested)
            .map_err(|e| ConnectorError::config(format!("invalid configuration: {}", e)))?;
        config.validate_all()?;
        Ok(config)
    }

    /// Run field and cross-field validation
    pub fn validate_all(&self) -> Result<()> {
        self.validate()
            .map_err(|e| ConnectorError::config(format!("invalid configuration: {}", e)))?;
        self.validate_module_header()
            .map_err(ConnectorError::Config)?;
        self.auth
            .validate_mechanism()
            .map_err(|e| ConnectorError::config(format!("invalid auth configuration: {}", e)))?;
        Ok(())
    }

    /// Module header must be fully set or fully empty, and usable as an
    /// HTTP header.
    pub fn validate_module_header(&self) -> std::result::Result<(), String> {
        let header = &self.module_header;
        if !header.is_valid() {
            return Err(
                "invalid module configuration: moduleHeader.name and moduleHeader.value must be set together"
                    .to_string(),
            );
        }
        if !header.is_set() {
            return Ok(());
        }

        HeaderName::from_bytes(header.name.as_bytes()).map_err(|e| {
            format!(
                "invalid module configuration: moduleHeader.name '{}': {}",
                header.name, e
            )
        })?;
        if let Some(value) = non_empty(&header.value) {
            HeaderValue::from_str(value.expose_secret()).map_err(|e| {
                format!("invalid module configuration: moduleHeader.value: {}", e)
            })?;
        }
        Ok(())
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Connection settings for the store client
    pub fn client_config(&self) -> ClientConfig {
        let mut headers = BTreeMap::new();
        if self.module_header.is_set() {
            if let Some(value) = &self.module_header.value {
                headers.insert(self.module_header.name.clone(), value.clone());
            }
        }

        let auth = match self.auth.mechanism {
            AuthMechanism::None => ClientAuth::None,
            AuthMechanism::ApiKey => match non_empty(&self.auth.api_key) {
                Some(key) => ClientAuth::ApiKey(key.clone()),
                None => ClientAuth::None,
            },
            AuthMechanism::WcsCreds => match non_empty(&self.auth.wcs.password) {
                Some(password) => ClientAuth::Wcs {
                    username: self.auth.wcs.username.clone(),
                    password: password.clone(),
                },
                None => ClientAuth::None,
            },
        };

        ClientConfig {
            endpoint: self.endpoint.clone(),
            scheme: self.scheme,
            auth,
            headers,
            timeout: self.timeout(),
        }
    }
}

/// Turn `{"auth.apiKey": "k"}` into `{"auth": {"apiKey": "k"}}`.
fn nest_keys(raw: &HashMap<String, String>) -> Result<serde_json::Value> {
    let mut root = serde_json::Map::new();

    // Sorted so that conflicts are reported deterministically.
    let sorted: BTreeMap<&String, &String> = raw.iter().collect();
    for (key, value) in sorted {
        let mut parts = key.split('.').peekable();
        let mut node = &mut root;
        while let Some(part) = parts.next() {
            if part.is_empty() {
                return Err(ConnectorError::config(format!(
                    "invalid configuration key '{}'",
                    key
                )));
            }
            if parts.peek().is_none() {
                if node.contains_key(part) {
                    return Err(ConnectorError::config(format!(
                        "configuration key '{}' conflicts with a nested key",
                        key
                    )));
                }
                node.insert(part.to_string(), serde_json::Value::String(value.clone()));
                break;
            }
            let child = node
                .entry(part.to_string())
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
            node = match child {
                serde_json::Value::Object(map) => map,
                _ => {
                    return Err(ConnectorError::config(format!(
                        "configuration key '{}' conflicts with a scalar key",
                        key
                    )))
                }
            };
        }
    }

    Ok(serde_json::Value::Object(root))
}

/// Deserializers accepting both native values and their string form, since
/// the host passes every parameter as a string.
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{de, Deserialize, Deserializer};

    /// Blank strings (and null) select the type's default.
    pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        match &value {
            serde_json::Value::Null => Ok(T::default()),
            serde_json::Value::String(s) if s.trim().is_empty() => Ok(T::default()),
            _ => T::deserialize(value).map_err(de::Error::custom),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Flag::deserialize(deserializer)? {
            Flag::Bool(b) => Ok(b),
            Flag::Text(s) => match s.trim() {
                "" | "false" => Ok(false),
                "true" => Ok(true),
                other => Err(de::Error::custom(format!(
                    "invalid boolean '{}', expected 'true' or 'false'",
                    other
                ))),
            },
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Int(u64),
        Text(String),
    }

    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match Number::deserialize(deserializer)? {
            Number::Int(n) => Ok(n),
            Number::Text(s) => s
                .trim()
                .parse()
                .map_err(|e| de::Error::custom(format!("invalid number '{}': {}", s, e))),
        }
    }
}
