//! Push gateway HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, instrument, warn};

use pushcast_core::SubscriptionRegistry;
use pushcast_delivery::FanoutDispatcher;

use crate::error::ApiError;
use crate::{health_api, send_api, subscriptions};

/// Everything the send path needs. Exists only with a full VAPID key pair.
pub struct SendingState {
    pub public_key: String,
    pub dispatcher: Arc<FanoutDispatcher>,
}

/// Application state shared across routes.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<dyn SubscriptionRegistry>,
    /// `Err` carries the reason sending is disabled.
    sending: Result<Arc<SendingState>, String>,
}

impl GatewayState {
    pub fn new(registry: Arc<dyn SubscriptionRegistry>, sending: SendingState) -> Self {
        Self {
            registry,
            sending: Ok(Arc::new(sending)),
        }
    }

    /// State for a gateway without VAPID keys: subscription management still
    /// works, `/public-key` and `/send` answer 500.
    pub fn without_sending(registry: Arc<dyn SubscriptionRegistry>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        warn!(reason = %reason, "Push sending disabled");
        Self {
            registry,
            sending: Err(reason),
        }
    }

    pub(crate) fn sending(&self) -> Result<&SendingState, ApiError> {
        self.sending
            .as_deref()
            .map_err(|reason| ApiError::NotConfigured(format!("push sending is not configured: {reason}")))
    }
}

#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Prefix for the push routes, e.g. `/api/push`. `/` mounts them at the root.
    pub base_path: String,
    pub max_body_bytes: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            base_path: "/api/push".to_string(),
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Build the full application router.
pub fn build_router(state: GatewayState, options: &RouterOptions) -> Router {
    let push_routes = Router::new()
        .route("/public-key", get(send_api::public_key))
        .route("/subscribe", post(subscriptions::subscribe))
        .route("/unsubscribe", delete(subscriptions::unsubscribe))
        .route("/debug", get(subscriptions::debug_listing))
        .route("/send", post(send_api::send));

    let base = options.base_path.trim_end_matches('/');
    let app = Router::new().route("/health", get(health_api::get_health));
    let app = if base.is_empty() {
        app.merge(push_routes)
    } else {
        app.nest(base, push_routes)
    };

    app.layer(DefaultBodyLimit::max(options.max_body_bytes))
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve `app` until Ctrl-C.
#[instrument(skip(app))]
pub async fn start_server(addr: SocketAddr, app: Router) -> Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!("Push gateway listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
