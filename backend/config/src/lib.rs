//! `pushcast-config`: runtime configuration for the push service.
//!
//! Provides:
//! - Typed config schema (server, storage, VAPID, delivery, logging)
//! - YAML loading from the config directory
//! - `${ENV_VAR}` substitution and a well-known env overlay
//! - Default value application
//! - Validation and log-safe redaction

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{apply_env_overrides, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_config};
pub use redact::redact;
pub use schema::{
    DeliveryConfig, LoggingConfig, PushcastConfig, ServerConfig, StorageBackend, StorageConfig,
    VapidConfig, VapidKeys,
};
pub use validation::{log_warnings, validate, ConfigValidationError, ValidationReport};

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;

/// A config that passed validation, plus the warnings it raised.
///
/// Warnings are returned rather than logged so the caller can emit them once
/// its logger is installed.
#[derive(Debug)]
pub struct PreparedConfig {
    pub config: PushcastConfig,
    pub warnings: Vec<ConfigValidationError>,
}

/// Load a config file and run the full pipeline against the process env.
///
/// This is the main entry point for loading a config at runtime.
pub async fn load_and_prepare(path: &Path) -> Result<PreparedConfig> {
    load_and_prepare_with(path, &std::env::vars().collect()).await
}

/// Pipeline: YAML, `${VAR}` substitution, env overlay, defaults, validation.
///
/// Fails with every validation error joined into one message.
pub async fn load_and_prepare_with(
    path: &Path,
    env: &HashMap<String, String>,
) -> Result<PreparedConfig> {
    let raw_config = load_config(path).await?;

    let value: Value = serde_json::to_value(&raw_config)
        .context("Failed to serialize config for processing")?;
    let value = resolve_env_vars_with(&value, env).context("Failed to resolve env vars in config")?;
    let config: PushcastConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;

    let config = apply_env_overrides(config, env)?;
    let config = apply_all_defaults(config);

    let report = validate(&config);
    if !report.is_valid() {
        let errors: Vec<String> = report.errors.iter().map(ToString::to_string).collect();
        bail!("{}", errors.join("; "));
    }

    Ok(PreparedConfig {
        config,
        warnings: report.warnings,
    })
}
