//! Delivery Event Logger
//!
//! One structured event per delivery attempt and per prune attempt, emitted
//! under the `push_events` target so they can be routed to their own sink.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::redact::{redact_endpoint, redact_sensitive_data};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeliveryEvent {
    Delivered {
        endpoint: String,
    },
    Rejected {
        endpoint: String,
        status: u16,
        permanent: bool,
    },
    Failed {
        endpoint: String,
        error_msg: String,
    },
    Pruned {
        endpoint: String,
        removed: bool,
    },
    PruneFailed {
        endpoint: String,
        error_msg: String,
    },
}

impl DeliveryEvent {
    fn endpoint_mut(&mut self) -> &mut String {
        match self {
            DeliveryEvent::Delivered { endpoint }
            | DeliveryEvent::Rejected { endpoint, .. }
            | DeliveryEvent::Failed { endpoint, .. }
            | DeliveryEvent::Pruned { endpoint, .. }
            | DeliveryEvent::PruneFailed { endpoint, .. } => endpoint,
        }
    }

    fn error_msg_mut(&mut self) -> Option<&mut String> {
        match self {
            DeliveryEvent::Failed { error_msg, .. } | DeliveryEvent::PruneFailed { error_msg, .. } => {
                Some(error_msg)
            }
            _ => None,
        }
    }

    fn is_failure(&self) -> bool {
        matches!(
            self,
            DeliveryEvent::Rejected { .. }
                | DeliveryEvent::Failed { .. }
                | DeliveryEvent::PruneFailed { .. }
        )
    }
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub dispatch_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: DeliveryEvent,
}

pub struct DeliveryEventLogger;

impl DeliveryEventLogger {
    /// Redact the endpoint and any error text, then hand the event to the
    /// tracing system.
    pub fn log_event(dispatch_id: &str, mut event: DeliveryEvent) -> EventLogEntry {
        let endpoint = event.endpoint_mut();
        let redacted = redact_endpoint(endpoint.as_str());
        *endpoint = redacted;
        if let Some(error_msg) = event.error_msg_mut() {
            let redacted = redact_sensitive_data(error_msg.as_str());
            *error_msg = redacted;
        }

        let entry = EventLogEntry {
            dispatch_id: dispatch_id.into(),
            timestamp: Utc::now(),
            event,
        };

        let json = serde_json::to_string(&entry).unwrap_or_default();
        if entry.event.is_failure() {
            warn!(target: "push_events", event = %json, "Push delivery event");
        } else {
            info!(target: "push_events", event = %json, "Push delivery event");
        }
        entry
    }
}
