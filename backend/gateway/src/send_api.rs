//! Sending routes: `/public-key` and `/send`.
//!
//! Both fail closed with a 500 when the VAPID key pair is not configured.

use axum::{body::Bytes, extract::State, Json};
use serde::{Deserialize, Serialize};

use pushcast_core::{DispatchReport, DispatchTarget, PushMessage};

use crate::error::{ApiError, ApiResult};
use crate::server::GatewayState;
use crate::subscriptions::parse_body;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    pub public_key: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SendRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
    /// Absent means broadcast.
    pub endpoint: Option<String>,
}

/// Handler for `GET /public-key`.
pub async fn public_key(State(state): State<GatewayState>) -> ApiResult<Json<PublicKeyResponse>> {
    let public_key = state.sending()?.public_key.clone();
    Ok(Json(PublicKeyResponse { public_key }))
}

/// Handler for `POST /send`.
pub async fn send(State(state): State<GatewayState>, body: Bytes) -> ApiResult<Json<DispatchReport>> {
    let sending = state.sending()?;
    let request: SendRequest = parse_body(&body)?;

    let message = PushMessage::from_parts(request.title, request.body, request.url);
    let target = DispatchTarget::from_optional(request.endpoint);

    let report = sending
        .dispatcher
        .dispatch(target, &message)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(report))
}
