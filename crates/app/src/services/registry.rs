//! Device registry: the canonical set of known devices.
//!
//! Scanners report presence through [`PresenceListener`]; the registry keeps
//! one [`IotDevice`] per identifier and a table of host-based merge hints.
//! Devices sharing a host stay separately addressable; the mapping only
//! records that they are probably the same physical thing.
//!
//! Every identifier also remembers the scanners currently observing it. A
//! lost report only evicts the device once no observer is left.
//!
//! Every mutation publishes `iot.device.updated`. Publication happens after
//! the lock is released, so a slow bus never blocks scanners.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use commoniot_domain::display::DeviceView;
use commoniot_domain::error::{DeviceNotFound, IotError};
use commoniot_domain::id::DeviceId;
use commoniot_domain::message::{Change, Message};

use crate::device::IotDevice;
use crate::ports::MessagePublisher;
use crate::scanner::PresenceListener;

#[derive(Debug, Default)]
struct Inner {
    devices: HashMap<DeviceId, IotDevice>,
    mappings: HashMap<DeviceId, BTreeSet<DeviceId>>,
    observers: HashMap<DeviceId, BTreeSet<String>>,
}

impl Inner {
    fn link_same_host(&mut self, device: &IotDevice) {
        let new_id = device.id();
        let matches: Vec<DeviceId> = self
            .devices
            .values()
            .filter(|known| known.id() != new_id && known.record().same_host(device.record()))
            .map(|known| known.id().clone())
            .collect();
        for other in matches {
            self.mappings
                .entry(new_id.clone())
                .or_default()
                .insert(other.clone());
            self.mappings.entry(other).or_default().insert(new_id.clone());
        }
    }

    fn observed_elsewhere(&self, id: &DeviceId, scanner: &str) -> bool {
        self.observers
            .get(id)
            .is_some_and(|observers| observers.iter().any(|name| name != scanner))
    }

    fn observe(&mut self, id: &DeviceId, scanner: &str) {
        self.observers
            .entry(id.clone())
            .or_default()
            .insert(scanner.to_string());
    }

    /// Merge into the canonical entry, inserting when the id is unknown.
    fn merge(&mut self, device: IotDevice) -> Change {
        match self.devices.get_mut(device.id()) {
            Some(canonical) => {
                canonical.record_mut().absorb(device.record());
                Change::Updated
            }
            None => self.insert(device),
        }
    }

    fn insert(&mut self, device: IotDevice) -> Change {
        self.link_same_host(&device);
        match self.devices.insert(device.id().clone(), device) {
            Some(previous) => {
                previous.stop_animation();
                Change::Updated
            }
            None => Change::Added,
        }
    }
}

/// Canonical device set shared by scanners, the dispatcher and the bus API.
pub struct DeviceRegistry<P> {
    inner: Mutex<Inner>,
    publisher: P,
}

impl<P: MessagePublisher> DeviceRegistry<P> {
    pub fn new(publisher: P) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            publisher,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, device_id: &DeviceId, change: Change) {
        self.publisher.publish(Message::device_updated(device_id, change));
    }

    /// Register a device newly found by `scanner`, linking it to known
    /// devices on the same host.
    ///
    /// An existing entry with the same identifier is replaced, unless another
    /// scanner still observes it. In that case the record is merged.
    #[tracing::instrument(skip(self, device), fields(device_id = %device.id()))]
    pub fn on_new_device(&self, scanner: &str, device: IotDevice) {
        let id = device.id().clone();
        let change = {
            let mut inner = self.lock();
            let change = if inner.observed_elsewhere(&id, scanner) {
                inner.merge(device)
            } else {
                inner.observers.remove(&id);
                inner.insert(device)
            };
            inner.observe(&id, scanner);
            change
        };
        tracing::info!(?change, "device registered");
        self.notify(&id, change);
    }

    /// Merge a fresh observation by `scanner` into the canonical device.
    ///
    /// Unknown devices are registered as if newly found.
    #[tracing::instrument(skip(self, device), fields(device_id = %device.id()))]
    pub fn on_device_seen(&self, scanner: &str, device: IotDevice) {
        let id = device.id().clone();
        let change = {
            let mut inner = self.lock();
            inner.observe(&id, scanner);
            inner.merge(device)
        };
        tracing::trace!(?change, "device seen");
        self.notify(&id, change);
    }

    /// `scanner` stopped observing the device. It is forgotten once no other
    /// scanner observes it. Mapping entries referring to it are left in place.
    #[tracing::instrument(skip(self, device), fields(device_id = %device.id()))]
    pub fn on_lost_device(&self, scanner: &str, device: IotDevice) {
        let id = device.id();
        let removed = {
            let mut inner = self.lock();
            let remaining = inner.observers.get_mut(id).map_or(0, |observers| {
                observers.remove(scanner);
                observers.len()
            });
            if remaining > 0 {
                tracing::debug!(remaining, "device still observed by other scanners");
                return;
            }
            inner.observers.remove(id);
            inner.devices.remove(id)
        };
        if let Some(removed) = removed {
            removed.stop_animation();
            tracing::info!("device removed");
            self.notify(removed.id(), Change::Removed);
        }
    }

    /// Announce that a known device changed state outside of discovery.
    pub fn on_device_changed(&self, id: &DeviceId) {
        if self.lock().devices.contains_key(id) {
            self.notify(id, Change::Updated);
        }
    }

    /// Resolve an exact identifier, or else an exact display name.
    ///
    /// When several devices share the name, the lowest identifier wins.
    ///
    /// # Errors
    ///
    /// Returns [`IotError::NotFound`] when nothing matches.
    pub fn search_for_device(&self, query: &str) -> Result<IotDevice, IotError> {
        let inner = self.lock();
        if let Some(device) = inner.devices.get(&DeviceId::new(query)) {
            return Ok(device.clone());
        }
        inner
            .devices
            .values()
            .filter(|device| device.record().name == query)
            .min_by(|a, b| a.id().cmp(b.id()))
            .cloned()
            .ok_or_else(|| DeviceNotFound::new(query).into())
    }

    #[must_use]
    pub fn get(&self, id: &DeviceId) -> Option<IotDevice> {
        self.lock().devices.get(id).cloned()
    }

    /// Snapshot of every device, ordered by identifier.
    #[must_use]
    pub fn devices(&self) -> Vec<IotDevice> {
        let mut devices: Vec<IotDevice> = self.lock().devices.values().cloned().collect();
        devices.sort_by(|a, b| a.id().cmp(b.id()));
        devices
    }

    /// Display models of every device, ordered by identifier.
    ///
    /// Driver reads happen outside the registry lock.
    #[must_use]
    pub fn views(&self) -> Vec<DeviceView> {
        self.devices().iter().map(IotDevice::view).collect()
    }

    /// Names of the scanners currently observing `id`.
    #[must_use]
    pub fn observers_of(&self, id: &DeviceId) -> BTreeSet<String> {
        self.lock().observers.get(id).cloned().unwrap_or_default()
    }

    /// Identifiers believed to be the same physical device as `id`.
    #[must_use]
    pub fn mappings_for(&self, id: &DeviceId) -> BTreeSet<DeviceId> {
        self.lock().mappings.get(id).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().devices.is_empty()
    }
}

impl<P: MessagePublisher> PresenceListener for DeviceRegistry<P> {
    fn on_new_device(&self, scanner: &str, device: IotDevice) {
        DeviceRegistry::on_new_device(self, scanner, device);
    }

    fn on_device_seen(&self, scanner: &str, device: IotDevice) {
        DeviceRegistry::on_device_seen(self, scanner, device);
    }

    fn on_lost_device(&self, scanner: &str, device: IotDevice) {
        DeviceRegistry::on_lost_device(self, scanner, device);
    }
}
