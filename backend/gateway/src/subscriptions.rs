//! Subscription management routes: `/subscribe`, `/unsubscribe`, `/debug`.

use axum::{body::Bytes, extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use pushcast_core::{ListFilter, SubscriptionPayload};
use pushcast_logging::redact_endpoint;

use crate::error::{ApiError, ApiResult};
use crate::server::GatewayState;

/// Characters of an endpoint shown by `/debug`.
const DEBUG_ENDPOINT_CHARS: usize = 60;

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub ok: bool,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UnsubscribeResponse {
    pub ok: bool,
    pub removed: bool,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct DebugResponse {
    pub count: usize,
    /// Truncated endpoints, most recently updated first.
    pub endpoints: Vec<String>,
    /// `updatedAt` of the most recently updated record.
    pub latest: Option<DateTime<Utc>>,
}

/// Parse a JSON request body, mapping any failure to a 400.
pub(crate) fn parse_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))
}

fn truncate_endpoint(endpoint: &str) -> String {
    if endpoint.chars().count() <= DEBUG_ENDPOINT_CHARS {
        return endpoint.to_string();
    }
    let head: String = endpoint.chars().take(DEBUG_ENDPOINT_CHARS).collect();
    format!("{head}…")
}

/// Handler for `POST /subscribe`. Body is the browser's subscription JSON.
pub async fn subscribe(
    State(state): State<GatewayState>,
    body: Bytes,
) -> ApiResult<Json<SubscribeResponse>> {
    let payload = SubscriptionPayload::new(parse_body::<Value>(&body)?);
    let endpoint = payload
        .endpoint()
        .ok_or_else(|| ApiError::BadRequest("missing endpoint".into()))?
        .to_string();

    state.registry.upsert(&endpoint, payload).await?;
    let count = state.registry.count().await?;

    info!(endpoint = %redact_endpoint(&endpoint), count, "Subscription stored");
    Ok(Json(SubscribeResponse { ok: true, count }))
}

/// Handler for `DELETE /unsubscribe`.
pub async fn unsubscribe(
    State(state): State<GatewayState>,
    body: Bytes,
) -> ApiResult<Json<UnsubscribeResponse>> {
    let request: UnsubscribeRequest = parse_body(&body)?;
    let endpoint = request
        .endpoint
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing endpoint".into()))?;

    let removed = state.registry.remove(&endpoint).await?;
    let count = state.registry.count().await?;

    info!(endpoint = %redact_endpoint(&endpoint), removed, count, "Unsubscribe handled");
    Ok(Json(UnsubscribeResponse {
        ok: true,
        removed,
        count,
    }))
}

/// Handler for `GET /debug`.
pub async fn debug_listing(State(state): State<GatewayState>) -> ApiResult<Json<DebugResponse>> {
    let records = state.registry.list(&ListFilter::all().recent_first()).await?;
    let count = state.registry.count().await?;

    Ok(Json(DebugResponse {
        count,
        latest: records.first().map(|r| r.updated_at),
        endpoints: records.iter().map(|r| truncate_endpoint(&r.endpoint)).collect(),
    }))
}
