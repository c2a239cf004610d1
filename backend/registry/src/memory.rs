use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use pushcast_core::{
    ListFilter, ListOrder, RegistryError, SubscriptionPayload, SubscriptionRecord,
    SubscriptionRegistry,
};

#[derive(Default)]
struct State {
    // endpoint -> (registration sequence, record)
    records: HashMap<String, (u64, SubscriptionRecord)>,
    next_seq: u64,
}

/// Process-local registry. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryRegistry {
    state: RwLock<State>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionRegistry for InMemoryRegistry {
    async fn upsert(
        &self,
        endpoint: &str,
        payload: SubscriptionPayload,
    ) -> Result<SubscriptionRecord, RegistryError> {
        if endpoint.trim().is_empty() {
            return Err(RegistryError::InvalidEndpoint);
        }

        let mut state = self.state.write().await;
        let now = Utc::now();

        if let Some((_, record)) = state.records.get_mut(endpoint) {
            record.payload = payload;
            record.updated_at = now;
            debug!("Replaced subscription payload");
            return Ok(record.clone());
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        let record = SubscriptionRecord {
            endpoint: endpoint.to_string(),
            payload,
            created_at: now,
            updated_at: now,
        };
        state.records.insert(endpoint.to_string(), (seq, record.clone()));
        debug!("Inserted subscription");
        Ok(record)
    }

    async fn remove(&self, endpoint: &str) -> Result<bool, RegistryError> {
        let mut state = self.state.write().await;
        Ok(state.records.remove(endpoint).is_some())
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<SubscriptionRecord>, RegistryError> {
        let state = self.state.read().await;

        let mut rows: Vec<&(u64, SubscriptionRecord)> = match &filter.endpoint {
            Some(endpoint) => state.records.get(endpoint).into_iter().collect(),
            None => state.records.values().collect(),
        };

        match filter.order {
            ListOrder::Registration => rows.sort_by_key(|(seq, _)| *seq),
            ListOrder::RecentFirst => rows.sort_by(|(seq_a, a), (seq_b, b)| {
                b.updated_at.cmp(&a.updated_at).then(seq_b.cmp(seq_a))
            }),
        }

        Ok(rows.into_iter().map(|(_, record)| record.clone()).collect())
    }

    async fn count(&self) -> Result<usize, RegistryError> {
        Ok(self.state.read().await.records.len())
    }
}
