//! # commoniot-domain
//!
//! Pure domain model for the commoniot device bridge.
//!
//! ## Responsibilities
//! - Foundational types: identifiers, error taxonomy, timestamps
//! - Define **Devices** as flat records: a [`DeviceType`](device::DeviceType)
//!   tag plus a [`Capability`](device::Capability) set
//! - Define **Colors** and their conversions (RGB, hex, HSV, names)
//! - Define **Messages** exchanged over the bus and the structured replies
//! - Define **display models** and their grouping for dashboard views
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod color;
pub mod device;
pub mod display;
pub mod message;
