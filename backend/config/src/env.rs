//! Environment handling for config values.
//!
//! Two passes: `${VAR_NAME}` substitution inside string leaves (uppercase
//! `[A-Z_][A-Z0-9_]*` names only, `$${VAR}` escapes to a literal `${VAR}`),
//! then an overlay of the well-known variables onto the typed config.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::schema::PushcastConfig;

/// Matches `${VAR}` and the escaped form `$${VAR}`.
static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$?)\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

pub const ENV_BIND: &str = "PUSHCAST_BIND";
pub const ENV_PORT: &str = "PUSHCAST_PORT";
pub const ENV_DB: &str = "PUSHCAST_DB";
pub const ENV_VAPID_PUBLIC_KEY: &str = "VAPID_PUBLIC_KEY";
pub const ENV_VAPID_PRIVATE_KEY: &str = "VAPID_PRIVATE_KEY";
pub const ENV_VAPID_SUBJECT: &str = "VAPID_SUBJECT";
pub const ENV_LOG: &str = "RUST_LOG";

#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute `${VAR}` references in a config value tree using `env`.
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    substitute_value(value, env, "")
}

fn substitute_value(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_string(s, env, path)?)),
        Value::Array(arr) => arr
            .iter()
            .enumerate()
            .map(|(i, v)| substitute_value(v, env, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut result = serde_json::Map::new();
            for (k, v) in map {
                let child_path = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                result.insert(k.clone(), substitute_value(v, env, &child_path)?);
            }
            Ok(Value::Object(result))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(s: &str, env: &HashMap<String, String>, path: &str) -> Result<String> {
    if !s.contains('$') {
        return Ok(s.to_string());
    }

    let mut missing: Option<MissingEnvVarError> = None;
    let substituted = ENV_VAR_PATTERN.replace_all(s, |caps: &regex::Captures| {
        let var_name = &caps[2];
        if !caps[1].is_empty() {
            return format!("${{{var_name}}}");
        }
        match env.get(var_name) {
            Some(val) if !val.is_empty() => val.clone(),
            _ => {
                missing.get_or_insert_with(|| MissingEnvVarError {
                    var_name: var_name.to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });

    if let Some(err) = missing {
        bail!(err);
    }
    Ok(substituted.into_owned())
}

/// Overlay the well-known environment variables onto `config`.
///
/// Empty values are ignored. A `PUSHCAST_PORT` that is not a port number
/// is an error.
pub fn apply_env_overrides(
    mut config: PushcastConfig,
    env: &HashMap<String, String>,
) -> Result<PushcastConfig> {
    let get = |name: &str| env.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

    if let Some(bind) = get(ENV_BIND) {
        config.server.bind = Some(bind.to_string());
    }
    if let Some(port) = get(ENV_PORT) {
        let port: u16 = port
            .parse()
            .with_context(|| format!("{ENV_PORT} is not a valid port: {port:?}"))?;
        config.server.port = Some(port);
    }
    if let Some(db) = get(ENV_DB) {
        config.storage.path = Some(db.to_string());
    }
    if let Some(key) = get(ENV_VAPID_PUBLIC_KEY) {
        config.vapid.public_key = Some(key.to_string());
    }
    if let Some(key) = get(ENV_VAPID_PRIVATE_KEY) {
        config.vapid.private_key = Some(key.to_string());
    }
    if let Some(subject) = get(ENV_VAPID_SUBJECT) {
        config.vapid.subject = Some(subject.to_string());
    }
    if let Some(level) = get(ENV_LOG) {
        config.logging.level = Some(level.to_string());
    }

    Ok(config)
}
