//! Fan-out dispatcher.
//!
//! A dispatch runs in two phases:
//! 1. deliver: one isolated send per target, at most `concurrency` in flight
//! 2. prune: remove every target the push service reported as gone (404/410)
//!
//! Neither phase can abort the other targets. Only registry reads (target
//! resolution and the final count) can fail a dispatch as a whole.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use pushcast_core::{
    DeliveryOutcome, DispatchReport, DispatchTarget, ListFilter, PruneOutcome, PruneResult,
    PushError, PushMessage, PushTransport, RegistryError, SubscriptionRecord,
    SubscriptionRegistry, TargetResult,
};
use pushcast_logging::{DeliveryEvent, DeliveryEventLogger};

/// Default number of sends in flight per dispatch.
pub const DEFAULT_CONCURRENCY: usize = 16;

pub struct FanoutDispatcher {
    registry: Arc<dyn SubscriptionRegistry>,
    transport: Arc<dyn PushTransport>,
    concurrency: usize,
}

impl FanoutDispatcher {
    pub fn new(registry: Arc<dyn SubscriptionRegistry>, transport: Arc<dyn PushTransport>) -> Self {
        Self {
            registry,
            transport,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Send `message` to the target set and prune permanently dead endpoints.
    ///
    /// An endpoint target with no matching record yields an empty report.
    #[instrument(skip(self, target, message), fields(dispatch_target = %target, transport = self.transport.name()))]
    pub async fn dispatch(
        &self,
        target: DispatchTarget,
        message: &PushMessage,
    ) -> Result<DispatchReport, PushError> {
        let dispatch_id = Uuid::new_v4().to_string();

        let targets = self.resolve_targets(&target).await?;
        let outcomes = self.deliver(&dispatch_id, targets, message).await;
        let pruned = self.prune(&dispatch_id, &outcomes).await;
        let total_subscriptions = self.registry.count().await?;

        let sent = outcomes.iter().filter(|(_, o)| o.is_delivered()).count();
        let results: Vec<TargetResult> = outcomes
            .iter()
            .map(|(endpoint, outcome)| TargetResult::from_outcome(endpoint.as_str(), outcome))
            .collect();

        info!(
            dispatch_id = %dispatch_id,
            targets = results.len(),
            sent,
            pruned = pruned.len(),
            total_subscriptions,
            "Dispatch complete"
        );

        Ok(DispatchReport {
            sent,
            total_subscriptions,
            results,
            pruned,
        })
    }

    async fn resolve_targets(
        &self,
        target: &DispatchTarget,
    ) -> Result<Vec<SubscriptionRecord>, RegistryError> {
        let filter = match target {
            DispatchTarget::All => ListFilter::all(),
            DispatchTarget::Endpoint(endpoint) => ListFilter::endpoint(endpoint.clone()),
        };
        self.registry.list(&filter).await
    }

    /// Phase one. Results come back in target order.
    async fn deliver(
        &self,
        dispatch_id: &str,
        targets: Vec<SubscriptionRecord>,
        message: &PushMessage,
    ) -> Vec<(String, DeliveryOutcome)> {
        let message = Arc::new(message.clone());

        let outcomes: Vec<(String, DeliveryOutcome)> = stream::iter(targets)
            .map(|record| {
                let transport = Arc::clone(&self.transport);
                let message = Arc::clone(&message);
                async move {
                    let endpoint = record.endpoint.clone();
                    // Own task per send: a panicking send only fails its own target.
                    let handle = tokio::spawn(async move { transport.send(&record, &message).await });
                    let outcome = match handle.await {
                        Ok(outcome) => outcome,
                        Err(e) => DeliveryOutcome::Failed(format!("send task aborted: {e}")),
                    };
                    (endpoint, outcome)
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        for (endpoint, outcome) in &outcomes {
            let event = match outcome {
                DeliveryOutcome::Delivered => DeliveryEvent::Delivered {
                    endpoint: endpoint.clone(),
                },
                DeliveryOutcome::Rejected(status) => DeliveryEvent::Rejected {
                    endpoint: endpoint.clone(),
                    status: *status,
                    permanent: outcome.is_permanent_failure(),
                },
                DeliveryOutcome::Failed(error_msg) => DeliveryEvent::Failed {
                    endpoint: endpoint.clone(),
                    error_msg: error_msg.clone(),
                },
            };
            DeliveryEventLogger::log_event(dispatch_id, event);
        }

        outcomes
    }

    /// Phase two. Each removal is independent; a failed removal is logged
    /// and recorded, never raised.
    async fn prune(&self, dispatch_id: &str, outcomes: &[(String, DeliveryOutcome)]) -> Vec<PruneResult> {
        let mut pruned = Vec::new();

        for (endpoint, _) in outcomes.iter().filter(|(_, o)| o.is_permanent_failure()) {
            let outcome = match self.registry.remove(endpoint).await {
                Ok(true) => PruneOutcome::Removed,
                Ok(false) => PruneOutcome::AlreadyGone,
                Err(e) => {
                    warn!(dispatch_id = %dispatch_id, error = %e, "Failed to prune dead subscription");
                    PruneOutcome::Failed(e.to_string())
                }
            };

            let event = match &outcome {
                PruneOutcome::Failed(error_msg) => DeliveryEvent::PruneFailed {
                    endpoint: endpoint.clone(),
                    error_msg: error_msg.clone(),
                },
                other => DeliveryEvent::Pruned {
                    endpoint: endpoint.clone(),
                    removed: *other == PruneOutcome::Removed,
                },
            };
            DeliveryEventLogger::log_event(dispatch_id, event);

            pruned.push(PruneResult {
                endpoint: endpoint.clone(),
                outcome,
            });
        }

        pruned
    }
}
