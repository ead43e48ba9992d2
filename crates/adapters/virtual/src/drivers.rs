//! Simulated drivers. Each keeps its state in memory behind a lock or atomic
//! so the same instance can be shared by the registry and the network.

mod camera;
mod light;
mod media;
mod switch;

pub use camera::VirtualCamera;
pub use light::{LightState, VirtualLight};
pub use media::{Playback, PlayerState, VirtualMediaPlayer};
pub use switch::VirtualSwitch;
