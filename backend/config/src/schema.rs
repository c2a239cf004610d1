//! Pushcast runtime configuration schema.
//!
//! Every leaf is optional so a partial YAML file deserializes; `defaults`
//! fills the gaps and the accessors below fall back to the same constants.

use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_BASE_PATH, DEFAULT_BIND, DEFAULT_CONCURRENCY, DEFAULT_DB_PATH, DEFAULT_LOG_LEVEL,
    DEFAULT_MAX_BODY_BYTES, DEFAULT_PORT, DEFAULT_SEND_TIMEOUT_SECS, DEFAULT_TTL_SECS,
};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushcastConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// VAPID key pair and contact. Sending is disabled without it.
    #[serde(default)]
    pub vapid: VapidConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Prefix the push routes are mounted under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_body_bytes: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<StorageBackend>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VapidConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    /// `mailto:` or `https:` contact for push services.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Directory for rolling NDJSON logs. Console only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

/// Complete VAPID material, present only when all three parts are set.
#[derive(Clone, PartialEq, Eq)]
pub struct VapidKeys {
    pub public_key: String,
    pub private_key: String,
    pub subject: String,
}

impl std::fmt::Debug for VapidKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidKeys")
            .field("public_key", &self.public_key)
            .field("private_key", &"***")
            .field("subject", &self.subject)
            .finish()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl PushcastConfig {
    pub fn bind(&self) -> &str {
        non_empty(&self.server.bind).unwrap_or(DEFAULT_BIND)
    }

    pub fn port(&self) -> u16 {
        self.server.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn base_path(&self) -> &str {
        non_empty(&self.server.base_path).unwrap_or(DEFAULT_BASE_PATH)
    }

    pub fn max_body_bytes(&self) -> usize {
        self.server.max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES)
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.storage.backend.unwrap_or(StorageBackend::Sqlite)
    }

    pub fn storage_path(&self) -> &str {
        non_empty(&self.storage.path).unwrap_or(DEFAULT_DB_PATH)
    }

    pub fn concurrency(&self) -> usize {
        self.delivery.concurrency.unwrap_or(DEFAULT_CONCURRENCY)
    }

    pub fn send_timeout_secs(&self) -> u64 {
        self.delivery.send_timeout_secs.unwrap_or(DEFAULT_SEND_TIMEOUT_SECS)
    }

    pub fn ttl_secs(&self) -> u32 {
        self.delivery.ttl_secs.unwrap_or(DEFAULT_TTL_SECS)
    }

    pub fn log_level(&self) -> &str {
        non_empty(&self.logging.level).unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_dir(&self) -> Option<&str> {
        non_empty(&self.logging.dir)
    }

    /// The public key alone, for handing to browsers.
    pub fn vapid_public_key(&self) -> Option<&str> {
        non_empty(&self.vapid.public_key)
    }

    /// Full VAPID material, or a message naming what is missing.
    pub fn vapid_keys(&self) -> Result<VapidKeys, String> {
        let public_key = non_empty(&self.vapid.public_key);
        let private_key = non_empty(&self.vapid.private_key);
        let subject = non_empty(&self.vapid.subject);

        match (public_key, private_key, subject) {
            (Some(public_key), Some(private_key), Some(subject)) => Ok(VapidKeys {
                public_key: public_key.to_string(),
                private_key: private_key.to_string(),
                subject: subject.to_string(),
            }),
            _ => {
                let missing: Vec<&str> = [
                    ("vapid.publicKey", public_key.is_none()),
                    ("vapid.privateKey", private_key.is_none()),
                    ("vapid.subject", subject.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, is_missing)| is_missing.then_some(name))
                .collect();
                Err(format!("missing {}", missing.join(", ")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_yaml() {
        let yaml = r#"
server:
  port: 9090
vapid:
  publicKey: BPub
delivery:
  sendTimeoutSecs: 3
"#;
        let cfg: PushcastConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.port(), 9090);
        assert_eq!(cfg.bind(), DEFAULT_BIND);
        assert_eq!(cfg.send_timeout_secs(), 3);
        assert_eq!(cfg.vapid_public_key(), Some("BPub"));
        assert_eq!(cfg.storage_backend(), StorageBackend::Sqlite);
    }

    #[test]
    fn vapid_keys_names_missing_parts() {
        let mut cfg = PushcastConfig::default();
        cfg.vapid.public_key = Some("BPub".into());
        cfg.vapid.private_key = Some("   ".into());

        let err = cfg.vapid_keys().unwrap_err();
        assert!(err.contains("vapid.privateKey"));
        assert!(err.contains("vapid.subject"));
        assert!(!err.contains("vapid.publicKey"));

        cfg.vapid.private_key = Some("priv".into());
        cfg.vapid.subject = Some("mailto:ops@example.org".into());
        let keys = cfg.vapid_keys().unwrap();
        assert_eq!(keys.private_key, "priv");
        assert!(!format!("{keys:?}").contains("priv\""));
    }
}
