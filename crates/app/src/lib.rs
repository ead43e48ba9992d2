//! # commoniot-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters implement:
//!   - `DeviceDriver`: the I/O half of a device
//!   - `Discovery`: one mechanism for finding devices
//!   - `MessagePublisher`: fire-and-forget outbound bus messages
//! - Wrap records and drivers into capability-checked [`IotDevice`](device::IotDevice)s,
//!   with per-device animations
//! - Run **scanners** that turn discovery answers into found/seen/lost notifications
//! - Define the use-cases:
//!   - `DeviceRegistry`: canonical device set and host-based merge hints
//!   - `CommandDispatcher`: named operations onto devices
//!   - `BusApi`: the `iot.*` request/response surface
//! - Provide **in-process infrastructure** (message bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `commoniot-domain` only (plus `tokio` for tasks and channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod animation;
pub mod device;
pub mod event_bus;
pub mod ports;
pub mod scanner;
pub mod services;
