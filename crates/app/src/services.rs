//! Application services: use-case implementations.
//!
//! Each service accepts its collaborators through the constructor: the
//! registry takes a [`MessagePublisher`](crate::ports::MessagePublisher), and
//! the dispatcher and bus API share the registry behind an `Arc`.

pub mod bus_api;
pub mod dispatcher;
pub mod registry;

pub use bus_api::BusApi;
pub use dispatcher::{CommandDispatcher, Operation};
pub use registry::DeviceRegistry;

/// JSON form of a result payload. View types always serialize.
pub(crate) fn to_json(value: impl serde::Serialize) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_default()
}
