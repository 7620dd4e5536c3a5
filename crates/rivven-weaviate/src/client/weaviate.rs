//! Weaviate REST client
//!
//! | Operation | Request                                                   |
//! |-----------|-----------------------------------------------------------|
//! | open      | `GET /v1/meta`                                            |
//! | insert    | `POST /v1/objects?consistency_level=ALL`                  |
//! | update    | `PUT /v1/objects/{class}/{id}?consistency_level=ALL`      |
//! | delete    | `DELETE /v1/objects/{class}/{id}?consistency_level=ALL`   |
//!
//! Every write waits for all replicas to acknowledge (`ALL`). Errors carry
//! the HTTP status and the messages from Weaviate's `{"error": [...]}` body.

use std::time::Instant;

use async_trait::async_trait;
use metrics::histogram;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::oidc::OidcSession;
use super::{ClientAuth, ClientConfig, StoreClient};
use crate::error::{ConnectorError, Result};
use crate::object::TargetObject;
use crate::types::SensitiveString;

const CONSISTENCY_LEVEL: &str = "ALL";

/// Map a transport failure outside of a write (open, token requests).
pub(super) fn transport_error(err: reqwest::Error) -> ConnectorError {
    if err.is_timeout() {
        ConnectorError::Timeout(err.to_string())
    } else {
        ConnectorError::connection(err.to_string())
    }
}

enum Credentials {
    None,
    Bearer(SensitiveString),
    Oidc(OidcSession),
}

struct Connection {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
}

#[derive(Serialize)]
struct ObjectBody<'a> {
    class: &'a str,
    id: &'a str,
    properties: &'a serde_json::Map<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vector: Option<&'a [f32]>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Vec<ErrorMessage>,
}

#[derive(Deserialize)]
struct ErrorMessage {
    message: String,
}

/// Extract Weaviate's error messages from a response body.
fn error_detail(status: u16, body: &str) -> String {
    let messages = serde_json::from_str::<ErrorBody>(body)
        .map(|b| {
            b.error
                .into_iter()
                .map(|m| m.message)
                .collect::<Vec<_>>()
                .join("; ")
        })
        .unwrap_or_default();

    let detail = if !messages.is_empty() {
        messages
    } else if !body.trim().is_empty() {
        body.trim().to_string()
    } else {
        "no error detail".to_string()
    };
    format!("HTTP {}: {}", status, detail)
}

impl Connection {
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ConnectorError::config(format!("invalid endpoint '{}'", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn object_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.url(segments)?;
        url.query_pairs_mut()
            .append_pair("consistency_level", CONSISTENCY_LEVEL);
        Ok(url)
    }

    async fn request(&self, method: Method, url: Url) -> Result<reqwest::RequestBuilder> {
        let builder = self.http.request(method, url);
        Ok(match &self.credentials {
            Credentials::None => builder,
            Credentials::Bearer(key) => builder.bearer_auth(key.expose_secret()),
            Credentials::Oidc(session) => {
                let token = session.bearer(&self.http).await?;
                builder.bearer_auth(token.expose_secret())
            }
        })
    }

    /// Verify the instance is reachable and accepts our credentials.
    async fn probe(&self) -> Result<String> {
        let url = self.url(&["v1", "meta"])?;
        let resp = self
            .request(Method::GET, url)
            .await?
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConnectorError::Auth(error_detail(status.as_u16(), &body)));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConnectorError::connection(error_detail(
                status.as_u16(),
                &body,
            )));
        }

        let meta: serde_json::Value = resp.json().await.unwrap_or_default();
        Ok(meta
            .get("version")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string())
    }

    async fn execute(
        &self,
        action: &'static str,
        method: Method,
        url: Url,
        body: Option<&ObjectBody<'_>>,
    ) -> Result<()> {
        let mut request = self.request(method, url).await?;
        if let Some(body) = body {
            request = request.json(body);
        }

        let t0 = Instant::now();
        let sent = request.send().await;
        histogram!("weaviate.request.duration_ms", "action" => action)
            .record(t0.elapsed().as_secs_f64() * 1000.0);

        let resp = sent.map_err(|e| {
            if e.is_timeout() {
                ConnectorError::Timeout(format!("{} object: {}", action, e))
            } else {
                ConnectorError::store(action, None, e.to_string())
            }
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let text = resp.text().await.unwrap_or_default();
        Err(ConnectorError::store(
            action,
            Some(status.as_u16()),
            error_detail(status.as_u16(), &text),
        ))
    }
}

/// REST client for a single Weaviate instance.
///
/// Holds one `reqwest::Client` (and its connection pool) between `open` and
/// `close`.
#[derive(Default)]
pub struct WeaviateClient {
    conn: Option<Connection>,
}

impl WeaviateClient {
    /// Create an unopened client
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `open` has completed
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn connection(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(ConnectorError::NotOpen)
    }
}

impl std::fmt::Debug for WeaviateClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeaviateClient")
            .field(
                "base_url",
                &self.conn.as_ref().map(|c| c.base_url.as_str()),
            )
            .finish()
    }
}

#[async_trait]
impl StoreClient for WeaviateClient {
    async fn open(&mut self, config: &ClientConfig) -> Result<()> {
        let base_url = Url::parse(&config.base_url()).map_err(|e| {
            ConnectorError::config(format!("invalid endpoint '{}': {}", config.endpoint, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConnectorError::config(format!(
                "invalid endpoint '{}'",
                config.endpoint
            )));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ConnectorError::config(format!("invalid module header name '{}': {}", name, e))
            })?;
            let mut header_value = HeaderValue::from_str(value.expose_secret()).map_err(|e| {
                ConnectorError::config(format!("invalid value for header '{}': {}", name, e))
            })?;
            header_value.set_sensitive(true);
            headers.insert(header_name, header_value);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| {
                ConnectorError::connection(format!("failed to build HTTP client: {}", e))
            })?;

        let credentials = match &config.auth {
            ClientAuth::None => Credentials::None,
            ClientAuth::ApiKey(key) => Credentials::Bearer(key.clone()),
            ClientAuth::Wcs { username, password } => Credentials::Oidc(
                OidcSession::discover(
                    &http,
                    base_url.as_str().trim_end_matches('/'),
                    username,
                    password,
                )
                .await?,
            ),
        };

        let conn = Connection {
            http,
            base_url,
            credentials,
        };
        let version = conn.probe().await?;

        info!(
            base_url = %conn.base_url,
            auth = config.auth.kind(),
            module_headers = config.headers.len(),
            version = %version,
            "Connected to Weaviate"
        );
        self.conn = Some(conn);
        Ok(())
    }

    async fn insert(&self, object: &TargetObject) -> Result<()> {
        let conn = self.connection()?;
        let url = conn.object_url(&["v1", "objects"])?;
        let body = ObjectBody {
            class: &object.class,
            id: &object.id,
            properties: &object.properties,
            vector: object.vector.as_deref(),
        };
        debug!(id = %object.id, class = %object.class, "Creating Weaviate object");
        conn.execute("creating", Method::POST, url, Some(&body))
            .await
    }

    async fn update(&self, object: &TargetObject) -> Result<()> {
        let conn = self.connection()?;
        let url = conn.object_url(&["v1", "objects", &object.class, &object.id])?;
        let body = ObjectBody {
            class: &object.class,
            id: &object.id,
            properties: &object.properties,
            vector: None,
        };
        debug!(id = %object.id, class = %object.class, "Updating Weaviate object");
        conn.execute("updating", Method::PUT, url, Some(&body))
            .await
    }

    async fn delete(&self, object: &TargetObject) -> Result<()> {
        let conn = self.connection()?;
        let url = conn.object_url(&["v1", "objects", &object.class, &object.id])?;
        debug!(id = %object.id, class = %object.class, "Deleting Weaviate object");
        conn.execute("deleting", Method::DELETE, url, None).await
    }

    async fn close(&mut self) -> Result<()> {
        if self.conn.take().is_some() {
            debug!("Weaviate client closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_detail_from_weaviate_body() {
        let body = r#"{"error":[{"message":"class 'Foo' not found"},{"message":"second"}]}"#;
        assert_eq!(
            error_detail(422, body),
            "HTTP 422: class 'Foo' not found; second"
        );
    }

    #[test]
    fn test_error_detail_fallbacks() {
        assert_eq!(error_detail(500, "boom"), "HTTP 500: boom");
        assert_eq!(error_detail(404, ""), "HTTP 404: no error detail");
    }

    #[test]
    fn test_object_url_escapes_segments() {
        let conn = Connection {
            http: reqwest::Client::new(),
            base_url: Url::parse("http://localhost:8080").unwrap(),
            credentials: Credentials::None,
        };
        let url = conn
            .object_url(&["v1", "objects", "Products", "key with/slash"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/v1/objects/Products/key%20with%2Fslash?consistency_level=ALL"
        );
    }

    #[tokio::test]
    async fn test_write_before_open() {
        let client = WeaviateClient::new();
        let object = TargetObject {
            id: "1".into(),
            class: "Products".into(),
            properties: serde_json::Map::new(),
            vector: None,
        };
        assert!(matches!(
            client.insert(&object).await,
            Err(ConnectorError::NotOpen)
        ));
    }

    #[tokio::test]
    async fn test_close_without_open() {
        let mut client = WeaviateClient::new();
        client.close().await.unwrap();
        assert!(!client.is_open());
    }
}
