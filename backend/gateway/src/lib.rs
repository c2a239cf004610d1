//! Pushcast HTTP gateway.
//!
//! Routes (under the configured base path):
//! - `GET /public-key`
//! - `POST /subscribe`
//! - `DELETE /unsubscribe`
//! - `GET /debug`
//! - `POST /send`
//!
//! plus `GET /health` at the root.

pub mod error;
pub mod health_api;
pub mod send_api;
pub mod server;
pub mod subscriptions;

pub use error::{ApiError, ApiResult};
pub use server::{build_router, start_server, GatewayState, RouterOptions, SendingState};

