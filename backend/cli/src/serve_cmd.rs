//! `pushcast serve`: wire config, storage, transport and the HTTP gateway.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use pushcast_config::{redact, PushcastConfig, StorageBackend};
use pushcast_delivery::{FanoutDispatcher, VapidCredentials, WebPushTransport};
use pushcast_gateway::{build_router, start_server, GatewayState, RouterOptions, SendingState};
use pushcast_registry::open_registry;

pub async fn run(config: PushcastConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.bind(), config.port())
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind(), config.port()))?;

    info!(config = %config_snapshot(&config)?, "Effective configuration");

    let sqlite_path = match config.storage_backend() {
        StorageBackend::Sqlite => Some(Path::new(config.storage_path())),
        StorageBackend::Memory => None,
    };
    let registry = open_registry(sqlite_path)?;

    let state = match config.vapid_keys() {
        Ok(keys) => {
            let transport = WebPushTransport::new(
                VapidCredentials {
                    public_key: keys.public_key.clone(),
                    private_key: keys.private_key,
                    subject: keys.subject,
                },
                Duration::from_secs(config.send_timeout_secs()),
                config.ttl_secs(),
            )?;
            let dispatcher = FanoutDispatcher::new(Arc::clone(&registry), Arc::new(transport))
                .with_concurrency(config.concurrency());
            GatewayState::new(
                registry,
                SendingState {
                    public_key: keys.public_key,
                    dispatcher: Arc::new(dispatcher),
                },
            )
        }
        Err(missing) => GatewayState::without_sending(registry, missing),
    };

    let app = build_router(
        state,
        &RouterOptions {
            base_path: config.base_path().to_string(),
            max_body_bytes: config.max_body_bytes(),
        },
    );

    info!(
        addr = %addr,
        base_path = %config.base_path(),
        storage = ?config.storage_backend(),
        concurrency = config.concurrency(),
        "Starting Pushcast gateway"
    );
    start_server(addr, app).await
}

/// The effective config as JSON with secrets masked.
fn config_snapshot(config: &PushcastConfig) -> Result<serde_json::Value> {
    let value = serde_json::to_value(config).context("Failed to serialize config")?;
    Ok(redact(&value))
}
