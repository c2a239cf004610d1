use async_trait::async_trait;

use crate::error::RegistryError;
use crate::types::{DeliveryOutcome, ListFilter, PushMessage, SubscriptionPayload, SubscriptionRecord};

/// Keyed store of push subscriptions. The endpoint URL is the identity.
///
/// Every operation is a single-key read or write, so implementations must
/// never leave a partially written record behind.
#[async_trait]
pub trait SubscriptionRegistry: Send + Sync {
    /// Create or replace the record for `endpoint`. Repeating the call with the
    /// same input leaves exactly one record.
    async fn upsert(
        &self,
        endpoint: &str,
        payload: SubscriptionPayload,
    ) -> Result<SubscriptionRecord, RegistryError>;

    /// Delete the record for `endpoint`, returning whether one existed.
    async fn remove(&self, endpoint: &str) -> Result<bool, RegistryError>;

    /// List records matching `filter`.
    async fn list(&self, filter: &ListFilter) -> Result<Vec<SubscriptionRecord>, RegistryError>;

    /// Number of live records.
    async fn count(&self) -> Result<usize, RegistryError>;
}

/// One-attempt delivery of a message to a single subscription.
///
/// Implementations never retry and never return an error: every failure is
/// folded into the returned [`DeliveryOutcome`].
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Transport name for logs (e.g., "webpush").
    fn name(&self) -> &str;

    async fn send(&self, record: &SubscriptionRecord, message: &PushMessage) -> DeliveryOutcome;
}
