//! Config validation with path-qualified messages.

use thiserror::Error;

use crate::schema::{PushcastConfig, StorageBackend};

#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &PushcastConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_server(config, &mut report);
    validate_storage(config, &mut report);
    validate_vapid(config, &mut report);
    validate_delivery(config, &mut report);
    report
}

/// Emit validation warnings through `tracing`.
pub fn log_warnings(warnings: &[ConfigValidationError]) {
    for warning in warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
}

fn validate_server(config: &PushcastConfig, report: &mut ValidationReport) {
    if config.server.port == Some(0) {
        report.error("server.port", "port must be > 0");
    }
    if let Some(port) = config.server.port {
        if port < 1024 && port != 80 && port != 443 {
            report.warn(
                "server.port",
                format!("Port {port} requires elevated privileges; consider using a port >= 1024"),
            );
        }
    }
    if let Some(base) = config.server.base_path.as_deref() {
        if !base.starts_with('/') {
            report.error("server.basePath", format!("basePath must start with '/', got '{base}'"));
        }
    }
    if config.server.max_body_bytes == Some(0) {
        report.error("server.maxBodyBytes", "maxBodyBytes must be > 0");
    }
}

fn validate_storage(config: &PushcastConfig, report: &mut ValidationReport) {
    if config.storage.backend == Some(StorageBackend::Memory) {
        report.warn(
            "storage.backend",
            "memory backend loses all subscriptions on restart",
        );
    }
    if config.storage_backend() == StorageBackend::Sqlite
        && config.storage.path.as_deref().is_some_and(|p| p.trim().is_empty())
    {
        report.error("storage.path", "sqlite backend needs a database path");
    }
}

/// A missing key pair only disables sending, so it is a warning.
fn validate_vapid(config: &PushcastConfig, report: &mut ValidationReport) {
    if let Err(missing) = config.vapid_keys() {
        report.warn("vapid", format!("push sending is disabled: {missing}"));
    }
    if let Some(subject) = config.vapid.subject.as_deref() {
        if !subject.is_empty() && !subject.starts_with("mailto:") && !subject.starts_with("https:") {
            report.error(
                "vapid.subject",
                format!("subject must be a mailto: or https: URL, got '{subject}'"),
            );
        }
    }
}

fn validate_delivery(config: &PushcastConfig, report: &mut ValidationReport) {
    if config.delivery.concurrency == Some(0) {
        report.error("delivery.concurrency", "concurrency must be >= 1");
    }
    if config.delivery.send_timeout_secs == Some(0) {
        report.error("delivery.sendTimeoutSecs", "sendTimeoutSecs must be >= 1");
    }
}
