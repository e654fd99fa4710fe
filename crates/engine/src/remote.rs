//! Remote cart service boundary.
//!
//! The remote store exposes REST-shaped cart resources keyed by a
//! server-assigned identifier: `GET/POST {base}/cart` and
//! `PUT/DELETE {base}/cart/{id}`. [`CartRemote`] is the seam the engine
//! talks through; [`HttpCartRemote`] is the production implementation.
//!
//! This layer captures network and server errors and hands them back as
//! values - it never retries and never panics into the caller. Retry policy
//! belongs to the reconciliation engine.

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use trolley_core::{CartItem, ClientRef, ProductId, ServerId, SyncState};

use crate::config::RemoteConfig;

/// Longest error-body excerpt carried in a [`RemoteError::Status`].
const MAX_ERROR_BODY: usize = 200;

/// Errors from the remote cart service.
///
/// The variants are granular for logging, but to the engine they all mean
/// the same thing: the remote store is unavailable and the affected item
/// degrades to local-only.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The request itself failed: connection refused, DNS, timeout.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("remote returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body was not the shape we expected.
    #[error("decode error: {0}")]
    Decode(String),

    /// The client could not be built from its configuration.
    #[error("client configuration error: {0}")]
    Config(String),
}

/// The cart resource as it travels over the wire.
///
/// Field names are camelCase to match the store's JSON. The record carries
/// no client reference - that identifier is session-local and never leaves
/// the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCartRecord {
    /// Server-assigned identifier. Never sent on writes (identity travels
    /// in the URL); depending on the backing store it may come back as a
    /// JSON string or a number, so decoding accepts both.
    #[serde(default, skip_serializing, deserialize_with = "deserialize_record_id")]
    pub id: Option<ServerId>,
    pub product_id: ProductId,
    pub name: String,
    pub image: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl RemoteCartRecord {
    /// Convert a fetched record into a session cart item.
    ///
    /// Mints a fresh client reference and marks the item synced, since the
    /// record came straight from the store.
    #[must_use]
    pub fn into_item(self) -> CartItem {
        CartItem {
            client_ref: ClientRef::generate(),
            server_id: self.id,
            product_id: self.product_id,
            name: self.name,
            image: self.image,
            price: self.price,
            quantity: self.quantity,
            notes: self.notes,
            sync_state: SyncState::Synced,
            revision: 0,
        }
    }
}

impl From<&CartItem> for RemoteCartRecord {
    fn from(item: &CartItem) -> Self {
        Self {
            id: item.server_id.clone(),
            product_id: item.product_id,
            name: item.name.clone(),
            image: item.image.clone(),
            price: item.price,
            quantity: item.quantity,
            notes: item.notes.clone(),
        }
    }
}

/// Accept a record id as either a JSON string or a JSON number.
fn deserialize_record_id<'de, D>(deserializer: D) -> Result<Option<ServerId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    let raw = Option::<RawId>::deserialize(deserializer)?;
    Ok(raw.map(|raw| match raw {
        RawId::Text(id) => ServerId::new(id),
        RawId::Number(id) => ServerId::new(id.to_string()),
    }))
}

/// The remote cart service seam.
///
/// No implementation retries; a failed call is reported once and the engine
/// decides what happens next.
#[async_trait]
pub trait CartRemote: Send + Sync {
    /// List every cart record in the session/user scope.
    async fn fetch_all(&self) -> Result<Vec<RemoteCartRecord>, RemoteError>;

    /// Create a record and return the identifier the store assigned it.
    async fn create(&self, record: &RemoteCartRecord) -> Result<ServerId, RemoteError>;

    /// Overwrite the record stored under `id`.
    async fn update(&self, id: &ServerId, record: &RemoteCartRecord) -> Result<(), RemoteError>;

    /// Delete the record stored under `id`.
    async fn delete(&self, id: &ServerId) -> Result<(), RemoteError>;
}

/// HTTP implementation of [`CartRemote`].
#[derive(Clone)]
pub struct HttpCartRemote {
    client: reqwest::Client,
    base: String,
}

impl HttpCartRemote {
    /// Build a client from `config`.
    ///
    /// The configured timeout applies to every request; a timed-out call
    /// surfaces as an ordinary [`RemoteError::Http`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bearer token is not a valid header value or
    /// the underlying HTTP client fails to build.
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let mut headers = HeaderMap::new();

        if let Some(token) = &config.bearer_token {
            let bearer = format!("Bearer {}", token.expose_secret());
            let mut value = HeaderValue::from_str(&bearer)
                .map_err(|e| RemoteError::Config(format!("invalid bearer token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base: config.base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn cart_url(&self) -> String {
        format!("{}/cart", self.base)
    }

    fn item_url(&self, id: &ServerId) -> String {
        format!("{}/cart/{id}", self.base)
    }
}

#[async_trait]
impl CartRemote for HttpCartRemote {
    #[instrument(skip(self))]
    async fn fetch_all(&self) -> Result<Vec<RemoteCartRecord>, RemoteError> {
        let response = self.client.get(self.cart_url()).send().await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let text = response.text().await?;
        decode_json(&text)
    }

    #[instrument(skip(self, record), fields(product_id = %record.product_id))]
    async fn create(&self, record: &RemoteCartRecord) -> Result<ServerId, RemoteError> {
        let response = self.client.post(self.cart_url()).json(record).send().await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let text = response.text().await?;
        let created: RemoteCartRecord = decode_json(&text)?;
        created
            .id
            .ok_or_else(|| RemoteError::Decode("create response carried no record id".to_string()))
    }

    #[instrument(skip(self, record), fields(server_id = %id))]
    async fn update(&self, id: &ServerId, record: &RemoteCartRecord) -> Result<(), RemoteError> {
        let response = self.client.put(self.item_url(id)).json(record).send().await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(server_id = %id))]
    async fn delete(&self, id: &ServerId) -> Result<(), RemoteError> {
        let response = self.client.delete(self.item_url(id)).send().await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(())
    }
}

/// Turn a non-success response into a [`RemoteError::Status`], keeping a
/// truncated body excerpt for diagnostics.
async fn status_error(response: reqwest::Response) -> RemoteError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(
        status,
        body = %body.chars().take(MAX_ERROR_BODY).collect::<String>(),
        "remote cart service returned non-success status"
    );
    RemoteError::Status {
        status,
        message: body.chars().take(MAX_ERROR_BODY).collect(),
    }
}

/// Decode a JSON response body, logging an excerpt on failure.
fn decode_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, RemoteError> {
    serde_json::from_str(text).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %text.chars().take(500).collect::<String>(),
            "failed to decode remote cart response"
        );
        RemoteError::Decode(e.to_string())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};
    use secrecy::SecretString;
    use url::Url;

    fn remote_for(server: &ServerGuard) -> HttpCartRemote {
        let config = RemoteConfig::new(Url::parse(&server.url()).unwrap());
        HttpCartRemote::new(&config).unwrap()
    }

    fn sample_record() -> RemoteCartRecord {
        RemoteCartRecord {
            id: None,
            product_id: ProductId::new(7),
            name: "Espresso Beans".to_string(),
            image: "/images/espresso.jpg".to_string(),
            price: Decimal::new(1250, 2),
            quantity: 2,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_fetch_all_accepts_string_and_numeric_ids_and_prices() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/cart")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"id":"a1","productId":7,"name":"Espresso Beans","image":"/images/espresso.jpg","price":"12.50","quantity":2},
                    {"id":3,"productId":9,"name":"Filter Paper","image":"/images/filter.jpg","price":2.5,"quantity":1,"notes":"gift wrap"}
                ]"#,
            )
            .create_async()
            .await;

        let remote = remote_for(&server);
        let records = remote.fetch_all().await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, Some(ServerId::new("a1")));
        assert_eq!(records[0].price, Decimal::new(1250, 2));
        assert_eq!(records[1].id, Some(ServerId::new("3")));
        assert_eq!(records[1].price, Decimal::new(25, 1));
        assert_eq!(records[1].notes.as_deref(), Some("gift wrap"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_posts_record_without_id_and_returns_assigned_id() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/cart")
            .match_body(Matcher::Json(serde_json::json!({
                "productId": 7,
                "name": "Espresso Beans",
                "image": "/images/espresso.jpg",
                "price": "12.50",
                "quantity": 2
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id":"srv-1","productId":7,"name":"Espresso Beans","image":"/images/espresso.jpg","price":"12.50","quantity":2}"#,
            )
            .create_async()
            .await;

        let remote = remote_for(&server);
        let id = remote.create(&sample_record()).await.unwrap();

        assert_eq!(id, ServerId::new("srv-1"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_without_id_in_response_is_decode_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/cart")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"productId":7,"name":"Espresso Beans","image":"/images/espresso.jpg","price":"12.50","quantity":2}"#,
            )
            .create_async()
            .await;

        let remote = remote_for(&server);
        let err = remote.create(&sample_record()).await.unwrap_err();

        assert!(matches!(err, RemoteError::Decode(_)));
    }

    #[tokio::test]
    async fn test_update_puts_to_item_path() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/cart/srv-9")
            .match_body(Matcher::PartialJson(serde_json::json!({ "quantity": 2 })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{}")
            .create_async()
            .await;

        let remote = remote_for(&server);
        remote
            .update(&ServerId::new("srv-9"), &sample_record())
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_hits_item_path() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", "/cart/srv-9")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let remote = remote_for(&server);
        remote.delete(&ServerId::new("srv-9")).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_reported_with_body_excerpt() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/cart")
            .with_status(503)
            .with_body("service down for maintenance")
            .create_async()
            .await;

        let remote = remote_for(&server);
        let err = remote.fetch_all().await.unwrap_err();

        match err {
            RemoteError::Status { status, message } => {
                assert_eq!(status, 503);
                assert!(message.contains("service down"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bearer_token_is_sent_when_configured() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/cart")
            .match_header("authorization", "Bearer cart-service-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let mut config = RemoteConfig::new(Url::parse(&server.url()).unwrap());
        config.bearer_token = Some(SecretString::from("cart-service-token"));
        let remote = HttpCartRemote::new(&config).unwrap();

        assert!(remote.fetch_all().await.unwrap().is_empty());
        mock.assert_async().await;
    }

    #[test]
    fn test_record_serialization_never_carries_the_id() {
        let mut item = CartItem::new(
            trolley_core::ProductInfo {
                product_id: ProductId::new(7),
                name: "Espresso Beans".to_string(),
                image: "/images/espresso.jpg".to_string(),
                price: Decimal::new(1250, 2),
            },
            2,
            None,
        );
        item.server_id = Some(ServerId::new("srv-1"));

        let record = RemoteCartRecord::from(&item);
        let json = serde_json::to_value(&record).unwrap();

        assert!(json.get("id").is_none());
        assert_eq!(json.get("productId"), Some(&serde_json::json!(7)));
    }

    #[test]
    fn test_into_item_keeps_identity_and_marks_synced() {
        let record = RemoteCartRecord {
            id: Some(ServerId::new("srv-4")),
            ..sample_record()
        };

        let item = record.into_item();

        assert_eq!(item.server_id, Some(ServerId::new("srv-4")));
        assert_eq!(item.sync_state, SyncState::Synced);
        assert_eq!(item.product_id, ProductId::new(7));
        assert_eq!(item.quantity, 2);
    }
}
