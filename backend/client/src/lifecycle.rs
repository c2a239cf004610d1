//! Client subscription lifecycle.
//!
//! ```text
//! Unregistered -> PermissionUnknown -> PermissionGranted -> Subscribed
//!                                   \-> PermissionDenied
//! ```
//!
//! The current state is published on a `watch` channel. Permission is asked
//! at most once per profile: the first-interaction listeners share a single
//! [`OnceGate`], and the ask is claimed in the [`PromptStore`] right before
//! the prompt is shown, so separately armed listeners cannot prompt twice.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use pushcast_core::SubscriptionPayload;
use pushcast_logging::redact_endpoint;

use crate::error::ClientError;
use crate::gate::OnceGate;
use crate::key::decode_application_server_key;
use crate::platform::{InteractionKind, InteractionSource, ListenerId, PermissionState, PushPlatform};
use crate::prompt_store::{PromptState, PromptStore};
use crate::registry_client::RegistryEndpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unregistered,
    PermissionUnknown,
    PermissionGranted,
    PermissionDenied,
    Subscribed,
}

impl From<PermissionState> for LifecycleState {
    fn from(permission: PermissionState) -> Self {
        match permission {
            PermissionState::Granted => LifecycleState::PermissionGranted,
            PermissionState::Denied => LifecycleState::PermissionDenied,
            PermissionState::Prompt => LifecycleState::PermissionUnknown,
        }
    }
}

/// What [`SubscriptionLifecycle::ask_on_first_interaction`] did.
#[derive(Debug)]
pub enum FirstInteraction {
    /// Permission was granted in an earlier session; subscribed right away.
    AlreadyGranted,
    /// Permission was denied earlier. Never re-prompted.
    Denied,
    /// The prompt was shown before (or the flag could not be read).
    AlreadyAsked,
    Unsupported,
    /// Listeners are attached; the task runs once the first gesture arrives.
    Armed(JoinHandle<()>),
}

pub struct SubscriptionLifecycle {
    platform: Arc<dyn PushPlatform>,
    registry: Arc<dyn RegistryEndpoint>,
    prompts: Arc<dyn PromptStore>,
    state: watch::Sender<LifecycleState>,
}

impl SubscriptionLifecycle {
    pub fn new(
        platform: Arc<dyn PushPlatform>,
        registry: Arc<dyn RegistryEndpoint>,
        prompts: Arc<dyn PromptStore>,
    ) -> Self {
        let (state, _) = watch::channel(LifecycleState::Unregistered);
        Self {
            platform,
            registry,
            prompts,
            state,
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: LifecycleState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "Lifecycle transition");
        }
    }

    /// Make sure this client holds a subscription and the registry knows it.
    ///
    /// An existing platform subscription is reused as-is. Safe to call on
    /// every page load: the registry upsert absorbs repeats.
    pub async fn ensure_subscribed(
        &self,
        vapid_public_key: &str,
    ) -> Result<SubscriptionPayload, ClientError> {
        if !self.platform.is_supported() {
            return Err(ClientError::Unsupported);
        }

        self.platform.ready().await?;
        self.set_state(self.platform.permission().into());

        let payload = match self.platform.current_subscription().await? {
            Some(existing) => {
                debug!("Reusing existing push subscription");
                existing
            }
            None => {
                let key = decode_application_server_key(vapid_public_key)?;
                self.require_permission().await?;
                self.platform.subscribe(&key).await?
            }
        };

        self.registry.upsert(&payload).await?;
        self.set_state(LifecycleState::Subscribed);
        info!(
            endpoint = %redact_endpoint(payload.endpoint().unwrap_or_default()),
            "Push subscription registered"
        );
        Ok(payload)
    }

    async fn require_permission(&self) -> Result<(), ClientError> {
        let permission = match self.platform.permission() {
            PermissionState::Prompt => {
                if let Err(e) = self.prompts.try_mark_asked().await {
                    warn!(error = %e, "Could not persist prompt flag");
                }
                self.platform.request_permission().await?
            }
            decided => decided,
        };
        self.set_state(permission.into());
        match permission {
            PermissionState::Granted => Ok(()),
            _ => Err(ClientError::PermissionDenied),
        }
    }

    /// Subscribe now if already permitted; otherwise arm a one-shot prompt on
    /// the first user gesture, unless this profile was asked before.
    ///
    /// Errors from the resulting subscription attempt are logged, not returned.
    pub async fn ask_on_first_interaction(
        self: &Arc<Self>,
        vapid_public_key: impl Into<String>,
        source: Arc<dyn InteractionSource>,
    ) -> FirstInteraction {
        let vapid_public_key = vapid_public_key.into();

        if !self.platform.is_supported() {
            return FirstInteraction::Unsupported;
        }

        match self.platform.permission() {
            PermissionState::Granted => {
                if let Err(e) = self.ensure_subscribed(&vapid_public_key).await {
                    warn!(error = %e, "Push subscription failed");
                }
                return FirstInteraction::AlreadyGranted;
            }
            PermissionState::Denied => {
                self.set_state(LifecycleState::PermissionDenied);
                return FirstInteraction::Denied;
            }
            PermissionState::Prompt => self.set_state(LifecycleState::PermissionUnknown),
        }

        match self.prompts.load().await {
            Ok(PromptState::Unasked) => {}
            Ok(PromptState::Asked) => return FirstInteraction::AlreadyAsked,
            Err(e) => {
                warn!(error = %e, "Could not read prompt flag; not prompting");
                return FirstInteraction::AlreadyAsked;
            }
        }

        let (gate, fired) = OnceGate::new();
        let listeners = ListenerGuard::attach_all(source, &gate);
        drop(gate);

        let lifecycle = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let Some(kind) = fired.wait().await else {
                return;
            };
            drop(listeners);
            debug!(?kind, "First interaction, requesting permission");

            if let Err(e) = lifecycle.prompt_then_subscribe(&vapid_public_key).await {
                warn!(error = %e, "Push subscription failed");
            }
        });

        FirstInteraction::Armed(handle)
    }

    async fn prompt_then_subscribe(&self, vapid_public_key: &str) -> Result<(), ClientError> {
        // Permission may have been decided since the listeners were armed.
        match self.platform.permission() {
            PermissionState::Granted => {
                return self.ensure_subscribed(vapid_public_key).await.map(|_| ());
            }
            PermissionState::Denied => {
                self.set_state(LifecycleState::PermissionDenied);
                return Err(ClientError::PermissionDenied);
            }
            PermissionState::Prompt => {}
        }

        match self.prompts.try_mark_asked().await {
            Ok(true) => {}
            Ok(false) => {
                debug!("Permission prompt already shown for this profile");
                return Ok(());
            }
            Err(e) => {
                warn!(error = %e, "Could not persist prompt flag; not prompting");
                return Ok(());
            }
        }

        let permission = self.platform.request_permission().await?;
        self.set_state(permission.into());
        if permission != PermissionState::Granted {
            return Err(ClientError::PermissionDenied);
        }

        self.ensure_subscribed(vapid_public_key).await.map(|_| ())
    }
}

/// Detaches every listener it holds when dropped, whichever way the
/// owning task ends.
struct ListenerGuard {
    source: Arc<dyn InteractionSource>,
    ids: Vec<ListenerId>,
}

impl ListenerGuard {
    fn attach_all(source: Arc<dyn InteractionSource>, gate: &OnceGate<InteractionKind>) -> Self {
        let ids = InteractionKind::ALL
            .iter()
            .map(|kind| {
                let gate = gate.clone();
                source.attach(
                    *kind,
                    Arc::new(move |fired: InteractionKind| {
                        gate.fire(fired);
                    }),
                )
            })
            .collect();
        Self { source, ids }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            self.source.detach(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use serde_json::json;

    use crate::platform::InteractionCallback;
    use crate::prompt_store::MemoryPromptStore;

    fn vapid_key() -> String {
        URL_SAFE_NO_PAD.encode([0x04u8; 65])
    }

    fn payload(endpoint: &str) -> SubscriptionPayload {
        SubscriptionPayload::new(json!({
            "endpoint": endpoint,
            "keys": {"p256dh": "BKey", "auth": "auth"}
        }))
    }

    struct FakePlatform {
        permission: Mutex<PermissionState>,
        answer: PermissionState,
        existing: Mutex<Option<SubscriptionPayload>>,
        subscribe_calls: AtomicUsize,
        request_calls: AtomicUsize,
    }

    impl FakePlatform {
        fn new(permission: PermissionState, answer: PermissionState) -> Arc<Self> {
            Arc::new(Self {
                permission: Mutex::new(permission),
                answer,
                existing: Mutex::new(None),
                subscribe_calls: AtomicUsize::new(0),
                request_calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PushPlatform for FakePlatform {
        fn is_supported(&self) -> bool {
            true
        }

        async fn ready(&self) -> Result<(), ClientError> {
            tokio::task::yield_now().await;
            Ok(())
        }

        async fn current_subscription(&self) -> Result<Option<SubscriptionPayload>, ClientError> {
            Ok(self.existing.lock().unwrap().clone())
        }

        async fn subscribe(&self, key: &[u8]) -> Result<SubscriptionPayload, ClientError> {
            assert_eq!(key.len(), 65);
            self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
            let created = payload("https://push.example/new");
            *self.existing.lock().unwrap() = Some(created.clone());
            Ok(created)
        }

        fn permission(&self) -> PermissionState {
            *self.permission.lock().unwrap()
        }

        async fn request_permission(&self) -> Result<PermissionState, ClientError> {
            self.request_calls.fetch_add(1, Ordering::SeqCst);
            *self.permission.lock().unwrap() = self.answer;
            Ok(self.answer)
        }
    }

    #[derive(Default)]
    struct FakeRegistry {
        received: Mutex<Vec<SubscriptionPayload>>,
        reject: Option<(u16, String)>,
    }

    #[async_trait]
    impl RegistryEndpoint for FakeRegistry {
        async fn upsert(&self, payload: &SubscriptionPayload) -> Result<(), ClientError> {
            if let Some((status, body)) = &self.reject {
                return Err(ClientError::RegistryRejected {
                    status: *status,
                    body: body.clone(),
                });
            }
            self.received.lock().unwrap().push(payload.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeSource {
        next_id: AtomicU64,
        listeners: Mutex<HashMap<ListenerId, (InteractionKind, InteractionCallback)>>,
    }

    impl FakeSource {
        fn emit(&self, kind: InteractionKind) {
            let callbacks: Vec<InteractionCallback> = self
                .listeners
                .lock()
                .unwrap()
                .values()
                .filter(|(k, _)| *k == kind)
                .map(|(_, cb)| Arc::clone(cb))
                .collect();
            for callback in callbacks {
                callback(kind);
            }
        }

        fn attached(&self) -> usize {
            self.listeners.lock().unwrap().len()
        }
    }

    impl InteractionSource for FakeSource {
        fn attach(&self, kind: InteractionKind, callback: InteractionCallback) -> ListenerId {
            let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
            self.listeners.lock().unwrap().insert(id, (kind, callback));
            id
        }

        fn detach(&self, id: ListenerId) {
            self.listeners.lock().unwrap().remove(&id);
        }
    }

    fn lifecycle(
        platform: &Arc<FakePlatform>,
        registry: &Arc<FakeRegistry>,
        prompts: Arc<dyn PromptStore>,
    ) -> Arc<SubscriptionLifecycle> {
        Arc::new(SubscriptionLifecycle::new(
            platform.clone(),
            registry.clone(),
            prompts,
        ))
    }

    #[tokio::test]
    async fn test_first_interaction_prompts_once() {
        let platform = FakePlatform::new(PermissionState::Prompt, PermissionState::Granted);
        let registry = Arc::new(FakeRegistry::default());
        let prompts = Arc::new(MemoryPromptStore::new());
        let lc = lifecycle(&platform, &registry, prompts.clone());
        let source = Arc::new(FakeSource::default());

        let handle = match lc.ask_on_first_interaction(vapid_key(), source.clone()).await {
            FirstInteraction::Armed(handle) => handle,
            other => panic!("expected Armed, got {other:?}"),
        };
        assert_eq!(source.attached(), InteractionKind::ALL.len());
        assert_eq!(lc.state(), LifecycleState::PermissionUnknown);

        source.emit(InteractionKind::Pointer);
        source.emit(InteractionKind::Key);
        handle.await.unwrap();
        source.emit(InteractionKind::Touch);

        assert_eq!(platform.request_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.attached(), 0);
        assert_eq!(prompts.load().await.unwrap(), PromptState::Asked);
        assert_eq!(registry.received.lock().unwrap().len(), 1);
        assert_eq!(lc.state(), LifecycleState::Subscribed);
    }

    #[tokio::test]
    async fn test_two_armings_share_one_prompt() {
        let platform = FakePlatform::new(PermissionState::Prompt, PermissionState::Granted);
        let registry = Arc::new(FakeRegistry::default());
        let lc = lifecycle(&platform, &registry, Arc::new(MemoryPromptStore::new()));
        let source = Arc::new(FakeSource::default());

        let mut handles = Vec::new();
        for _ in 0..2 {
            match lc.ask_on_first_interaction(vapid_key(), source.clone()).await {
                FirstInteraction::Armed(handle) => handles.push(handle),
                other => panic!("expected Armed, got {other:?}"),
            }
        }
        assert_eq!(source.attached(), 2 * InteractionKind::ALL.len());

        source.emit(InteractionKind::Pointer);
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(platform.request_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.attached(), 0);
        assert_eq!(lc.state(), LifecycleState::Subscribed);
    }

    #[tokio::test]
    async fn test_direct_subscribe_records_prompt() {
        let platform = FakePlatform::new(PermissionState::Prompt, PermissionState::Granted);
        let registry = Arc::new(FakeRegistry::default());
        let prompts = Arc::new(MemoryPromptStore::new());
        let lc = lifecycle(&platform, &registry, prompts.clone());

        lc.ensure_subscribed(&vapid_key()).await.unwrap();

        assert_eq!(platform.request_calls.load(Ordering::SeqCst), 1);
        assert_eq!(prompts.load().await.unwrap(), PromptState::Asked);
    }

    #[tokio::test]
    async fn test_reuses_existing_subscription() {
        let platform = FakePlatform::new(PermissionState::Granted, PermissionState::Granted);
        *platform.existing.lock().unwrap() = Some(payload("https://push.example/existing"));
        let registry = Arc::new(FakeRegistry::default());
        let lc = lifecycle(&platform, &registry, Arc::new(MemoryPromptStore::new()));

        let first = lc.ensure_subscribed(&vapid_key()).await.unwrap();
        let second = lc.ensure_subscribed(&vapid_key()).await.unwrap();

        assert_eq!(first.endpoint(), Some("https://push.example/existing"));
        assert_eq!(first, second);
        assert_eq!(platform.subscribe_calls.load(Ordering::SeqCst), 0);
        assert_eq!(registry.received.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_creates_subscription_when_absent() {
        let platform = FakePlatform::new(PermissionState::Granted, PermissionState::Granted);
        let registry = Arc::new(FakeRegistry::default());
        let lc = lifecycle(&platform, &registry, Arc::new(MemoryPromptStore::new()));
        let mut states = lc.watch_state();

        let created = lc.ensure_subscribed(&vapid_key()).await.unwrap();
        assert_eq!(created.endpoint(), Some("https://push.example/new"));
        assert_eq!(platform.subscribe_calls.load(Ordering::SeqCst), 1);
        assert_eq!(platform.request_calls.load(Ordering::SeqCst), 0);
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), LifecycleState::Subscribed);
    }

    #[tokio::test]
    async fn test_registry_rejection_is_raised_with_body() {
        let platform = FakePlatform::new(PermissionState::Granted, PermissionState::Granted);
        let registry = Arc::new(FakeRegistry {
            reject: Some((500, r#"{"error":"registry unavailable"}"#.into())),
            ..Default::default()
        });
        let lc = lifecycle(&platform, &registry, Arc::new(MemoryPromptStore::new()));

        let err = lc.ensure_subscribed(&vapid_key()).await.unwrap_err();
        match err {
            ClientError::RegistryRejected { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("registry unavailable"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_ne!(lc.state(), LifecycleState::Subscribed);
    }

    #[tokio::test]
    async fn test_denied_and_already_asked_never_prompt() {
        let denied = FakePlatform::new(PermissionState::Denied, PermissionState::Denied);
        let registry = Arc::new(FakeRegistry::default());
        let source = Arc::new(FakeSource::default());

        let lc = lifecycle(&denied, &registry, Arc::new(MemoryPromptStore::new()));
        let outcome = lc.ask_on_first_interaction(vapid_key(), source.clone()).await;
        assert!(matches!(outcome, FirstInteraction::Denied));
        assert_eq!(lc.state(), LifecycleState::PermissionDenied);

        let undecided = FakePlatform::new(PermissionState::Prompt, PermissionState::Granted);
        let asked = Arc::new(MemoryPromptStore::with_state(PromptState::Asked));
        let lc = lifecycle(&undecided, &registry, asked);
        let outcome = lc.ask_on_first_interaction(vapid_key(), source.clone()).await;
        assert!(matches!(outcome, FirstInteraction::AlreadyAsked));

        assert_eq!(source.attached(), 0);
        assert_eq!(denied.request_calls.load(Ordering::SeqCst), 0);
        assert_eq!(undecided.request_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_previously_granted_subscribes_immediately() {
        let platform = FakePlatform::new(PermissionState::Granted, PermissionState::Granted);
        let registry = Arc::new(FakeRegistry::default());
        let lc = lifecycle(&platform, &registry, Arc::new(MemoryPromptStore::new()));
        let source = Arc::new(FakeSource::default());

        let outcome = lc.ask_on_first_interaction(vapid_key(), source.clone()).await;
        assert!(matches!(outcome, FirstInteraction::AlreadyGranted));
        assert_eq!(source.attached(), 0);
        assert_eq!(registry.received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_listeners_detached_when_prompt_is_refused() {
        let platform = FakePlatform::new(PermissionState::Prompt, PermissionState::Denied);
        let registry = Arc::new(FakeRegistry::default());
        let lc = lifecycle(&platform, &registry, Arc::new(MemoryPromptStore::new()));
        let source = Arc::new(FakeSource::default());

        let FirstInteraction::Armed(handle) =
            lc.ask_on_first_interaction(vapid_key(), source.clone()).await
        else {
            panic!("expected Armed");
        };
        source.emit(InteractionKind::Scroll);
        handle.await.unwrap();

        assert_eq!(source.attached(), 0);
        assert_eq!(lc.state(), LifecycleState::PermissionDenied);
        assert!(registry.received.lock().unwrap().is_empty());
    }
}
