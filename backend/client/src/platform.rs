//! Platform primitives consumed by the lifecycle: the push registration
//! API, the permission API, and user interaction events.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use pushcast_core::SubscriptionPayload;

use crate::error::ClientError;

/// Notification permission as reported by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    /// Not yet decided; asking is allowed.
    #[default]
    Prompt,
}

#[async_trait]
pub trait PushPlatform: Send + Sync {
    /// Whether push messaging exists at all.
    fn is_supported(&self) -> bool;

    /// Suspend until the push handler (service worker) is active.
    async fn ready(&self) -> Result<(), ClientError>;

    /// The active subscription, if the platform already holds one.
    async fn current_subscription(&self) -> Result<Option<SubscriptionPayload>, ClientError>;

    /// Create a subscription bound to the raw application server key.
    async fn subscribe(&self, application_server_key: &[u8]) -> Result<SubscriptionPayload, ClientError>;

    fn permission(&self) -> PermissionState;

    /// Show the permission prompt and return the user's answer.
    async fn request_permission(&self) -> Result<PermissionState, ClientError>;
}

/// User gestures that may open the permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    Pointer,
    Key,
    Touch,
    Scroll,
}

impl InteractionKind {
    pub const ALL: [InteractionKind; 4] = [
        InteractionKind::Pointer,
        InteractionKind::Key,
        InteractionKind::Touch,
        InteractionKind::Scroll,
    ];
}

pub type InteractionCallback = Arc<dyn Fn(InteractionKind) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Source of user interaction events.
pub trait InteractionSource: Send + Sync {
    fn attach(&self, kind: InteractionKind, callback: InteractionCallback) -> ListenerId;
    fn detach(&self, id: ListenerId);
}
