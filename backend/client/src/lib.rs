//! Client side of Pushcast: obtains a push subscription from the platform,
//! asks for permission at most once, and reports the subscription to the
//! server registry.

pub mod error;
pub mod gate;
pub mod key;
pub mod lifecycle;
pub mod platform;
pub mod prompt_store;
pub mod registry_client;

pub use error::ClientError;
pub use gate::{GateReceiver, OnceGate};
pub use key::decode_application_server_key;
pub use lifecycle::{FirstInteraction, LifecycleState, SubscriptionLifecycle};
pub use platform::{
    InteractionCallback, InteractionKind, InteractionSource, ListenerId, PermissionState, PushPlatform,
};
pub use prompt_store::{FilePromptStore, MemoryPromptStore, PromptState, PromptStore};
pub use registry_client::{HttpRegistryClient, RegistryEndpoint};
