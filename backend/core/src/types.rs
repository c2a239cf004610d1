use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The subscription JSON handed out by the browser (endpoint plus keys).
///
/// Stored verbatim; the registry only ever reads `endpoint` out of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionPayload(Value);

impl SubscriptionPayload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The `endpoint` field, if present and non-empty.
    pub fn endpoint(&self) -> Option<&str> {
        self.0
            .get("endpoint")
            .and_then(Value::as_str)
            .filter(|e| !e.trim().is_empty())
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for SubscriptionPayload {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// One registered push endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    pub endpoint: String,
    pub payload: SubscriptionPayload,
    pub created_at: DateTime<Utc>,
    /// Set on every upsert.
    pub updated_at: DateTime<Utc>,
}

/// Order in which [`ListFilter`] returns records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListOrder {
    /// Order of first registration. Re-subscribing keeps the original slot.
    #[default]
    Registration,
    /// Most recently updated first, for diagnostics.
    RecentFirst,
}

/// Selects records from a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub endpoint: Option<String>,
    pub order: ListOrder,
}

impl ListFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            order: ListOrder::default(),
        }
    }

    pub fn recent_first(mut self) -> Self {
        self.order = ListOrder::RecentFirst;
        self
    }
}

/// A notification as composed by an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub url: String,
}

impl Default for PushMessage {
    fn default() -> Self {
        Self {
            title: "Notification".to_string(),
            body: String::new(),
            url: "/".to_string(),
        }
    }
}

impl PushMessage {
    /// Build a message, falling back to defaults for absent fields.
    pub fn from_parts(title: Option<String>, body: Option<String>, url: Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            title: title.unwrap_or(defaults.title),
            body: body.unwrap_or(defaults.body),
            url: url.unwrap_or(defaults.url),
        }
    }

    /// JSON bytes delivered to the service worker.
    pub fn to_payload_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Which subscriptions a dispatch goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchTarget {
    All,
    Endpoint(String),
}

impl DispatchTarget {
    /// `None` or a blank endpoint means broadcast.
    pub fn from_optional(endpoint: Option<String>) -> Self {
        match endpoint {
            Some(e) if !e.trim().is_empty() => DispatchTarget::Endpoint(e),
            _ => DispatchTarget::All,
        }
    }
}

impl fmt::Display for DispatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchTarget::All => write!(f, "all"),
            DispatchTarget::Endpoint(_) => write!(f, "endpoint"),
        }
    }
}

/// Result of a single transport attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The push service answered with a non-success status.
    Rejected(u16),
    /// No status was obtained (timeout, connection error, unusable payload).
    Failed(String),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }

    /// 404 and 410 mean the push service has invalidated the endpoint for good.
    pub fn is_permanent_failure(&self) -> bool {
        matches!(self, DeliveryOutcome::Rejected(404) | DeliveryOutcome::Rejected(410))
    }

    pub fn error(&self) -> Option<DeliveryError> {
        match self {
            DeliveryOutcome::Delivered => None,
            DeliveryOutcome::Rejected(status) => Some(DeliveryError::Status(*status)),
            DeliveryOutcome::Failed(message) => Some(DeliveryError::Message(message.clone())),
        }
    }
}

/// The `error` field of a per-target result: a status code when the push
/// service answered, a message otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeliveryError {
    Status(u16),
    Message(String),
}

/// Per-target entry of a dispatch report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetResult {
    pub endpoint: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DeliveryError>,
}

impl TargetResult {
    pub fn from_outcome(endpoint: impl Into<String>, outcome: &DeliveryOutcome) -> Self {
        Self {
            endpoint: endpoint.into(),
            ok: outcome.is_delivered(),
            error: outcome.error(),
        }
    }
}

/// What happened when pruning a permanently dead endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PruneOutcome {
    Removed,
    /// Someone else removed it first.
    AlreadyGone,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneResult {
    pub endpoint: String,
    pub outcome: PruneOutcome,
}

/// Aggregate result of one fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    /// Number of targets that reported [`DeliveryOutcome::Delivered`].
    pub sent: usize,
    /// Registry size after pruning.
    pub total_subscriptions: usize,
    pub results: Vec<TargetResult>,
    #[serde(skip)]
    pub pruned: Vec<PruneResult>,
}
