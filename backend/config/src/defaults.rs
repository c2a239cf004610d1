//! Config defaults: fills every unset leaf so the rest of the process can
//! read a fully populated config.

use crate::schema::{PushcastConfig, StorageBackend};

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BASE_PATH: &str = "/api/push";
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

pub const DEFAULT_DB_PATH: &str = "pushcast.db";

/// Bounded number of in-flight sends per dispatch.
pub const DEFAULT_CONCURRENCY: usize = 16;
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 10;
/// One day.
pub const DEFAULT_TTL_SECS: u32 = 86_400;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: PushcastConfig) -> PushcastConfig {
    let config = apply_server_defaults(config);
    let config = apply_storage_defaults(config);
    let config = apply_delivery_defaults(config);
    apply_logging_defaults(config)
}

fn apply_server_defaults(mut config: PushcastConfig) -> PushcastConfig {
    let server = &mut config.server;
    server.bind.get_or_insert_with(|| DEFAULT_BIND.to_string());
    server.port.get_or_insert(DEFAULT_PORT);
    server
        .base_path
        .get_or_insert_with(|| DEFAULT_BASE_PATH.to_string());
    server.max_body_bytes.get_or_insert(DEFAULT_MAX_BODY_BYTES);
    config
}

fn apply_storage_defaults(mut config: PushcastConfig) -> PushcastConfig {
    let storage = &mut config.storage;
    storage.backend.get_or_insert(StorageBackend::Sqlite);
    if storage.backend == Some(StorageBackend::Sqlite) {
        storage.path.get_or_insert_with(|| DEFAULT_DB_PATH.to_string());
    }
    config
}

fn apply_delivery_defaults(mut config: PushcastConfig) -> PushcastConfig {
    let delivery = &mut config.delivery;
    delivery.concurrency.get_or_insert(DEFAULT_CONCURRENCY);
    delivery.send_timeout_secs.get_or_insert(DEFAULT_SEND_TIMEOUT_SECS);
    delivery.ttl_secs.get_or_insert(DEFAULT_TTL_SECS);
    config
}

fn apply_logging_defaults(mut config: PushcastConfig) -> PushcastConfig {
    config
        .logging
        .level
        .get_or_insert_with(|| DEFAULT_LOG_LEVEL.to_string());
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_empty_config() {
        let config = apply_all_defaults(PushcastConfig::default());
        assert_eq!(config.server.port, Some(DEFAULT_PORT));
        assert_eq!(config.server.base_path.as_deref(), Some("/api/push"));
        assert_eq!(config.storage.backend, Some(StorageBackend::Sqlite));
        assert_eq!(config.storage.path.as_deref(), Some(DEFAULT_DB_PATH));
        assert_eq!(config.delivery.concurrency, Some(16));
        assert_eq!(config.logging.level.as_deref(), Some("info"));
        assert!(config.vapid.public_key.is_none());
    }

    #[test]
    fn keeps_explicit_values() {
        let mut config = PushcastConfig::default();
        config.server.port = Some(3000);
        config.storage.backend = Some(StorageBackend::Memory);
        config.delivery.ttl_secs = Some(60);

        let config = apply_all_defaults(config);
        assert_eq!(config.server.port, Some(3000));
        assert_eq!(config.storage.path, None);
        assert_eq!(config.delivery.ttl_secs, Some(60));
    }
}
