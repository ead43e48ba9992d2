//! # commoniot-adapter-virtual
//!
//! Virtual/demo discovery backend over a simulated network of devices.
//!
//! ## Demo devices
//!
//! | Device id | Type | Area | Host |
//! |-----------|------|------|------|
//! | `virtual:living_room_lamp` | `rgb_bulb` | `living_room` | `192.0.2.10` |
//! | `virtual:desk_lamp` | `bulb` | `office` | `192.0.2.11` |
//! | `virtual:coffee_plug` | `plug` | `kitchen` | `192.0.2.12` |
//! | `virtual:hall_sensor` | `sensor` | - | `192.0.2.13` |
//! | `virtual:living_room_tv` | `tv` | `living_room` | `192.0.2.14` |
//! | `virtual:tv_plug` | `plug` | `living_room` | `192.0.2.14` |
//! | `virtual:door_camera` | `camera` | `entrance` | `192.0.2.15` |
//!
//! The TV and its plug share a host, so the registry links them.
//!
//! Tests and demos can drop devices off the network
//! ([`VirtualNetwork::set_visible`]) or take the whole network down
//! ([`VirtualNetwork::set_offline`]) to exercise lost-device and
//! discovery-failure handling.
//!
//! ## Dependency rule
//!
//! Depends on `commoniot-app` (port traits) and `commoniot-domain` only.

pub mod drivers;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use commoniot_app::device::IotDevice;
use commoniot_app::ports::{DeviceDriver, Discovery, PassiveDriver};
use commoniot_domain::device::{Device, DeviceType};
use commoniot_domain::error::{DiscoveryError, ValidationError};
use commoniot_domain::id::DeviceId;

use drivers::{VirtualCamera, VirtualLight, VirtualMediaPlayer, VirtualSwitch};

/// Scope used for the identifiers of demo devices.
pub const SCOPE: &str = "virtual";

struct Entry {
    record: Device,
    driver: Arc<dyn DeviceDriver>,
    visible: bool,
}

#[derive(Default)]
struct NetworkState {
    devices: BTreeMap<DeviceId, Entry>,
    offline: bool,
}

/// Shared, mutable set of simulated devices.
///
/// Clones observe the same network.
#[derive(Clone, Default)]
pub struct VirtualNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl VirtualNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A network populated with the demo devices listed in the crate docs.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if a demo record fails validation.
    pub fn demo() -> Result<Self, ValidationError> {
        let network = Self::new();
        let playlist = ["Morning News", "Nature Documentary", "Late Show"]
            .map(String::from)
            .to_vec();
        network.add(
            record(
                "living_room_lamp",
                "Living Room Lamp",
                DeviceType::RgbBulb,
                Some("living_room"),
                "192.0.2.10",
            )?,
            Arc::new(VirtualLight::rgb()),
        );
        network.add(
            record("desk_lamp", "Desk Lamp", DeviceType::Bulb, Some("office"), "192.0.2.11")?,
            Arc::new(VirtualLight::default()),
        );
        network.add(
            record(
                "coffee_plug",
                "Coffee Machine",
                DeviceType::Plug,
                Some("kitchen"),
                "192.0.2.12",
            )?,
            Arc::new(VirtualSwitch::default()),
        );
        network.add(
            record("hall_sensor", "Hall Motion Sensor", DeviceType::Sensor, None, "192.0.2.13")?,
            Arc::new(PassiveDriver),
        );
        network.add(
            record(
                "living_room_tv",
                "Living Room TV",
                DeviceType::Tv,
                Some("living_room"),
                "192.0.2.14",
            )?,
            Arc::new(VirtualMediaPlayer::new(playlist)),
        );
        network.add(
            record("tv_plug", "TV Plug", DeviceType::Plug, Some("living_room"), "192.0.2.14")?,
            Arc::new(VirtualSwitch::new(true)),
        );
        network.add(
            record(
                "door_camera",
                "Front Door Camera",
                DeviceType::Camera,
                Some("entrance"),
                "192.0.2.15",
            )?,
            Arc::new(VirtualCamera::default()),
        );
        Ok(network)
    }

    fn lock(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put a device on the network, replacing one with the same id.
    pub fn add(&self, record: Device, driver: Arc<dyn DeviceDriver>) {
        self.lock().devices.insert(
            record.id.clone(),
            Entry {
                record,
                driver,
                visible: true,
            },
        );
    }

    pub fn remove(&self, id: &DeviceId) -> bool {
        self.lock().devices.remove(id).is_some()
    }

    /// Hide or reveal a device without forgetting its driver state.
    pub fn set_visible(&self, id: &DeviceId, visible: bool) -> bool {
        match self.lock().devices.get_mut(id) {
            Some(entry) => {
                entry.visible = visible;
                true
            }
            None => false,
        }
    }

    /// While offline every scan fails with [`DiscoveryError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().devices.is_empty()
    }

    /// A discovery backend scanning this network.
    #[must_use]
    pub fn discovery(&self, name: impl Into<String>) -> VirtualDiscovery {
        VirtualDiscovery {
            name: name.into(),
            network: self.clone(),
        }
    }

    fn visible_devices(&self) -> Result<Vec<IotDevice>, DiscoveryError> {
        let state = self.lock();
        if state.offline {
            return Err(DiscoveryError::Unavailable);
        }
        Ok(state
            .devices
            .values()
            .filter(|entry| entry.visible)
            .map(|entry| IotDevice::new(entry.record.clone(), Arc::clone(&entry.driver)))
            .collect())
    }
}

/// [`Discovery`] backend over a [`VirtualNetwork`].
pub struct VirtualDiscovery {
    name: String,
    network: VirtualNetwork,
}

impl Discovery for VirtualDiscovery {
    fn name(&self) -> &str {
        &self.name
    }

    async fn scan(&self) -> Result<Vec<IotDevice>, DiscoveryError> {
        let devices = self.network.visible_devices()?;
        tracing::trace!(scanner = %self.name, count = devices.len(), "virtual scan");
        Ok(devices)
    }
}

fn record(
    key: &str,
    name: &str,
    device_type: DeviceType,
    area: Option<&str>,
    host: &str,
) -> Result<Device, ValidationError> {
    let builder = Device::builder()
        .id(DeviceId::scoped(SCOPE, key))
        .name(name)
        .host(host)
        .device_type(device_type)
        .raw("vendor", "commoniot")
        .raw("model", format!("virtual-{device_type}"));
    match area {
        Some(area) => builder.area(area).build(),
        None => builder.build(),
    }
}
