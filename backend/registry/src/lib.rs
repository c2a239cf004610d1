//! Subscription registry backends.
//!
//! Both backends implement [`pushcast_core::SubscriptionRegistry`] with the
//! endpoint URL as the only key:
//! - [`InMemoryRegistry`] for tests and single-process deployments
//! - [`SqliteRegistry`] for durable storage

pub mod memory;
pub mod sqlite_store;

pub use memory::InMemoryRegistry;
pub use sqlite_store::SqliteRegistry;

use std::sync::Arc;

use anyhow::Result;
use pushcast_core::SubscriptionRegistry;

/// Open the configured backend. `None` selects the in-memory registry.
pub fn open_registry(sqlite_path: Option<&std::path::Path>) -> Result<Arc<dyn SubscriptionRegistry>> {
    match sqlite_path {
        Some(path) => Ok(Arc::new(SqliteRegistry::open(path)?)),
        None => Ok(Arc::new(InMemoryRegistry::new())),
    }
}
