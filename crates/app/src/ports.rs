//! Port definitions: traits that adapters implement.
//!
//! Drivers and discovery backends live in adapter crates; the bus transport
//! lives wherever the daemon wires it. The application core only sees these
//! traits.

pub mod bus;
pub mod discovery;
pub mod driver;

pub use bus::{MessagePublisher, NoopPublisher};
pub use discovery::Discovery;
pub use driver::{DeviceDriver, PassiveDriver};
