//! Telemetry and structured logging components for Pushcast.
//!
//! Handles subscriber setup, endpoint/key redaction, and structured delivery
//! event logging.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{DeliveryEvent, DeliveryEventLogger, EventLogEntry};
pub use logger::{init_logger, LoggerGuard};
pub use redact::{redact_endpoint, redact_sensitive_data};
