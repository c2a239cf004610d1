//! HTTP client for a running Pushcast gateway.

use anyhow::{bail, Context, Result};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub struct PushApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl PushApiClient {
    /// `base_url` points at the push routes, e.g. `http://127.0.0.1:8080/api/push`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.call(Method::GET, path, None).await
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        self.call(Method::POST, path, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        self.call(Method::DELETE, path, Some(body)).await
    }

    /// GET an absolute URL on the same server (e.g. `/health` outside the base path).
    pub async fn get_url<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Pushcast is not reachable at {url}"))?;
        decode(response).await
    }

    async fn call<T: DeserializeOwned>(&self, method: Method, path: &str, body: Option<&Value>) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("Pushcast is not reachable at {url}"))?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let text = response.text().await.context("Failed to read response body")?;
    if !status.is_success() {
        bail!("{}", error_message(status, &text));
    }
    serde_json::from_str(&text).with_context(|| format!("Unexpected response body: {text}"))
}

/// Pull the `error` field out of a gateway error body.
fn error_message(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string());
    format!("{status}: {detail}")
}
