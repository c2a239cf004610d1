//! Reporting a subscription to the server registry.

use async_trait::async_trait;
use tracing::debug;

use pushcast_core::SubscriptionPayload;
use pushcast_logging::redact_endpoint;

use crate::error::ClientError;

/// Where the lifecycle posts subscriptions.
#[async_trait]
pub trait RegistryEndpoint: Send + Sync {
    async fn upsert(&self, payload: &SubscriptionPayload) -> Result<(), ClientError>;
}

/// Posts to `<base>/subscribe` over HTTP, keeping cookies between calls.
pub struct HttpRegistryClient {
    client: reqwest::Client,
    subscribe_url: String,
}

impl HttpRegistryClient {
    /// `base_url` is the push API root, e.g. `http://localhost:8080/api/push`.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            subscribe_url: format!("{}/subscribe", base_url.trim_end_matches('/')),
        })
    }

    pub fn subscribe_url(&self) -> &str {
        &self.subscribe_url
    }
}

#[async_trait]
impl RegistryEndpoint for HttpRegistryClient {
    async fn upsert(&self, payload: &SubscriptionPayload) -> Result<(), ClientError> {
        let response = self
            .client
            .post(&self.subscribe_url)
            .json(payload.as_value())
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::RegistryRejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(
            endpoint = %redact_endpoint(payload.endpoint().unwrap_or_default()),
            "Subscription registered"
        );
        Ok(())
    }
}
