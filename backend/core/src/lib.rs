pub mod error;
pub mod traits;
pub mod types;

pub use error::{PushError, RegistryError};
pub use traits::{PushTransport, SubscriptionRegistry};
pub use types::{
    DeliveryError, DeliveryOutcome, DispatchReport, DispatchTarget, ListFilter, ListOrder,
    PruneOutcome, PruneResult, PushMessage, SubscriptionPayload, SubscriptionRecord,
    TargetResult,
};
