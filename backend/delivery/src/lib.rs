//! Push delivery: a one-shot transport adapter and the fan-out dispatcher
//! that drives it across the subscription registry.

pub mod dispatcher;
pub mod transport;

pub use dispatcher::{FanoutDispatcher, DEFAULT_CONCURRENCY};
pub use transport::{VapidCredentials, WebPushTransport};
