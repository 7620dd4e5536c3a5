//! Integration tests for the Weaviate REST client
//!
//! Each test runs a `wiremock` server standing in for Weaviate and checks
//! the request shapes (method, path, consistency level, headers, body) and
//! how error responses are mapped.

use std::collections::BTreeMap;
use std::time::Duration;

use rivven_weaviate::{
    ClientAuth, ClientConfig, ConnectorError, Scheme, SensitiveString, StoreClient, TargetObject,
    WeaviateClient,
};
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_config(server: &MockServer, auth: ClientAuth) -> ClientConfig {
    ClientConfig {
        endpoint: server.address().to_string(),
        scheme: Scheme::Http,
        auth,
        headers: BTreeMap::new(),
        timeout: Duration::from_secs(5),
    }
}

async fn mount_meta(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/meta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "1.24.1"})))
        .mount(server)
        .await;
}

async fn open_client(server: &MockServer) -> WeaviateClient {
    mount_meta(server).await;
    let mut client = WeaviateClient::new();
    client
        .open(&client_config(server, ClientAuth::None))
        .await
        .unwrap();
    client
}

fn product(vector: Option<Vec<f32>>) -> TargetObject {
    let properties = json!({"product_name": "computer", "price": 1000});
    TargetObject {
        id: "computer-1".to_string(),
        class: "Products".to_string(),
        properties: properties.as_object().cloned().unwrap(),
        vector,
    }
}

// ============================================================================
// open
// ============================================================================

#[tokio::test]
async fn test_open_sends_api_key_and_module_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/meta"))
        .and(header("authorization", "Bearer secret-key"))
        .and(header("X-OpenAI-Api-Key", "sk-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "1.24.1"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = client_config(
        &server,
        ClientAuth::ApiKey(SensitiveString::new("secret-key")),
    );
    config
        .headers
        .insert("X-OpenAI-Api-Key".to_string(), SensitiveString::new("sk-123"));

    let mut client = WeaviateClient::new();
    client.open(&config).await.unwrap();
    assert!(client.is_open());

    client.close().await.unwrap();
    assert!(!client.is_open());
}

#[tokio::test]
async fn test_open_rejected_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/meta"))
        .respond_with(ResponseTemplate::new(401).set_body_json(
            json!({"error": [{"message": "unauthorized: invalid api key"}]}),
        ))
        .mount(&server)
        .await;

    let mut client = WeaviateClient::new();
    let err = client
        .open(&client_config(
            &server,
            ClientAuth::ApiKey(SensitiveString::new("wrong")),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, ConnectorError::Auth(_)), "{:?}", err);
    assert!(err.to_string().contains("invalid api key"));
    assert!(!client.is_open());
}

#[tokio::test]
async fn test_open_server_error_is_connection_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/meta"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut client = WeaviateClient::new();
    let err = client
        .open(&client_config(&server, ClientAuth::None))
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectorError::Connection(_)), "{:?}", err);
}

#[tokio::test]
async fn test_open_unreachable() {
    let config = ClientConfig {
        endpoint: "127.0.0.1:1".to_string(),
        scheme: Scheme::Http,
        auth: ClientAuth::None,
        headers: BTreeMap::new(),
        timeout: Duration::from_secs(2),
    };

    let mut client = WeaviateClient::new();
    let err = client.open(&config).await.unwrap_err();
    assert!(err.is_retryable(), "{:?}", err);
}

#[tokio::test]
async fn test_open_with_wcs_credentials() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/v1/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "href": format!("{}/auth/.well-known/openid-configuration", base),
            "clientId": "wcs",
            "scopes": ["openid", "email"],
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_endpoint": format!("{}/auth/token", base),
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("username=conduit-user"))
        .and(body_string_contains("client_id=wcs"))
        .and(body_string_contains("offline_access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "wcs-token",
            "token_type": "Bearer",
            "expires_in": 3600,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/meta"))
        .and(header("authorization", "Bearer wcs-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "1.24.1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/objects"))
        .and(header("authorization", "Bearer wcs-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = WeaviateClient::new();
    client
        .open(&client_config(
            &server,
            ClientAuth::Wcs {
                username: "conduit-user".to_string(),
                password: SensitiveString::new("secret"),
            },
        ))
        .await
        .unwrap();

    // Cached token is reused for writes.
    client.insert(&product(None)).await.unwrap();
}

#[tokio::test]
async fn test_wcs_without_oidc() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut client = WeaviateClient::new();
    let err = client
        .open(&client_config(
            &server,
            ClientAuth::Wcs {
                username: "conduit-user".to_string(),
                password: SensitiveString::new("secret"),
            },
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectorError::Auth(_)), "{:?}", err);
}

// ============================================================================
// Writes
// ============================================================================

#[tokio::test]
async fn test_insert_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/objects"))
        .and(query_param("consistency_level", "ALL"))
        .and(body_json(json!({
            "class": "Products",
            "id": "computer-1",
            "properties": {"product_name": "computer", "price": 1000},
            "vector": [1.5, -2.0],
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = open_client(&server).await;
    client
        .insert(&product(Some(vec![1.5, -2.0])))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_insert_without_vector_omits_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/objects"))
        .and(body_json(json!({
            "class": "Products",
            "id": "computer-1",
            "properties": {"product_name": "computer", "price": 1000},
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = open_client(&server).await;
    client.insert(&product(None)).await.unwrap();
}

#[tokio::test]
async fn test_update_request_sends_no_vector() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/objects/Products/computer-1"))
        .and(query_param("consistency_level", "ALL"))
        .and(body_json(json!({
            "class": "Products",
            "id": "computer-1",
            "properties": {"product_name": "computer", "price": 1000},
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = open_client(&server).await;
    client
        .update(&product(Some(vec![1.0, 2.0])))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_request() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/objects/Products/computer-1"))
        .and(query_param("consistency_level", "ALL"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = open_client(&server).await;
    client.delete(&product(None)).await.unwrap();
}

#[tokio::test]
async fn test_store_error_carries_status_and_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/objects"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "error": [{"message": "invalid object: no such class with name 'Products' found"}],
        })))
        .mount(&server)
        .await;

    let client = open_client(&server).await;
    let err = client.insert(&product(None)).await.unwrap_err();

    assert_eq!(err.status(), Some(422));
    assert!(!err.is_retryable());
    assert_eq!(
        err.to_string(),
        "error creating object: HTTP 422: invalid object: no such class with name 'Products' found"
    );
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let client = open_client(&server).await;
    let err = client.delete(&product(None)).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(err.is_retryable());
    assert!(err.to_string().starts_with("error deleting object: HTTP 500"));
}

#[tokio::test]
async fn test_request_timeout() {
    let server = MockServer::start().await;
    mount_meta(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/objects"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let mut config = client_config(&server, ClientAuth::None);
    config.timeout = Duration::from_millis(500);
    let mut client = WeaviateClient::new();
    client.open(&config).await.unwrap();

    let err = client.insert(&product(None)).await.unwrap_err();
    assert!(matches!(err, ConnectorError::Timeout(_)), "{:?}", err);
}
