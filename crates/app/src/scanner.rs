//! Scanners: presence tracking on top of a [`Discovery`] backend.
//!
//! A scanner repeatedly asks its backend for the devices visible right now
//! and turns the answers into three notifications:
//!
//! - **found**: a device absent from the tracked set (first sighting, or the
//!   first sighting after it was reported lost),
//! - **seen**: a device already tracked,
//! - **lost**: a tracked device silent for longer than the TTL. Reported once,
//!   after which the device is forgotten.
//!
//! The bookkeeping lives in [`PresenceTracker`], which is pure and takes the
//! current time as an argument. [`Scanner::spawn`] runs the tracker in a tokio
//! task cycling `Scanning → Sleeping` until stopped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use commoniot_domain::error::DiscoveryError;
use commoniot_domain::id::DeviceId;
use commoniot_domain::time::{Timestamp, is_expired, now};

use crate::device::IotDevice;
use crate::ports::Discovery;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Receiver of presence notifications, typically the device registry.
///
/// Every notification carries the name of the reporting scanner.
pub trait PresenceListener: Send + Sync {
    fn on_new_device(&self, scanner: &str, device: IotDevice);

    fn on_device_seen(&self, scanner: &str, device: IotDevice);

    fn on_lost_device(&self, scanner: &str, device: IotDevice);
}

impl<T: PresenceListener + ?Sized> PresenceListener for Arc<T> {
    fn on_new_device(&self, scanner: &str, device: IotDevice) {
        (**self).on_new_device(scanner, device);
    }

    fn on_device_seen(&self, scanner: &str, device: IotDevice) {
        (**self).on_device_seen(scanner, device);
    }

    fn on_lost_device(&self, scanner: &str, device: IotDevice) {
        (**self).on_lost_device(scanner, device);
    }
}

/// Outcome of one observation.
#[derive(Debug, Default)]
pub struct Presence {
    pub found: Vec<IotDevice>,
    pub seen: Vec<IotDevice>,
    pub lost: Vec<IotDevice>,
}

impl Presence {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.found.is_empty() && self.seen.is_empty() && self.lost.is_empty()
    }
}

/// Last snapshot of every device a scanner currently considers present.
#[derive(Debug)]
pub struct PresenceTracker {
    ttl: Duration,
    timestamps: HashMap<DeviceId, IotDevice>,
}

impl PresenceTracker {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            timestamps: HashMap::new(),
        }
    }

    /// Fold one discovery answer in, stamping every visible device with `at`.
    pub fn observe(&mut self, at: Timestamp, visible: Vec<IotDevice>) -> Presence {
        let mut presence = Presence::default();

        for mut device in visible {
            device.record_mut().mark_seen(at);
            let known = self.timestamps.contains_key(device.id());
            self.timestamps.insert(device.id().clone(), device.clone());
            if known {
                presence.seen.push(device);
            } else {
                presence.found.push(device);
            }
        }

        let expired: Vec<DeviceId> = self
            .timestamps
            .iter()
            .filter(|(_, device)| {
                device
                    .record()
                    .last_seen
                    .is_some_and(|last_seen| is_expired(last_seen, at, self.ttl))
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            if let Some(device) = self.timestamps.remove(&id) {
                presence.lost.push(device);
            }
        }

        presence
    }

    #[must_use]
    pub fn is_tracking(&self, id: &DeviceId) -> bool {
        self.timestamps.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerState {
    Idle,
    Scanning,
    Sleeping,
}

/// Timing of one scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannerConfig {
    pub interval: Duration,
    pub ttl: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            ttl: DEFAULT_TTL,
        }
    }
}

/// A discovery backend plus its presence policy.
pub struct Scanner<D> {
    discovery: Arc<D>,
    config: ScannerConfig,
    aliases: HashMap<DeviceId, String>,
}

impl<D: Discovery + 'static> Scanner<D> {
    pub fn new(discovery: D, config: ScannerConfig) -> Self {
        Self {
            discovery: Arc::new(discovery),
            config,
            aliases: HashMap::new(),
        }
    }

    /// Rename the device with `id` whenever this scanner yields it.
    #[must_use]
    pub fn with_alias(mut self, id: impl Into<DeviceId>, name: impl Into<String>) -> Self {
        self.aliases.insert(id.into(), name.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.discovery.name()
    }

    #[must_use]
    pub fn config(&self) -> ScannerConfig {
        self.config
    }

    /// Run one discovery and return the visible device at `host`.
    ///
    /// # Errors
    ///
    /// Propagates the backend's [`DiscoveryError`].
    pub async fn find_by_host(&self, host: &str) -> Result<Option<IotDevice>, DiscoveryError> {
        let devices = self.discovery.scan().await?;
        Ok(apply_aliases(&self.aliases, devices)
            .into_iter()
            .find(|device| device.record().host.as_deref() == Some(host)))
    }

    /// Start the scan loop, feeding notifications to `listener`.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn<L: PresenceListener + 'static>(&self, listener: L) -> ScannerHandle {
        let (state_tx, state_rx) = watch::channel(ScannerState::Idle);
        let token = CancellationToken::new();
        let name = self.name().to_string();

        let task = tokio::spawn(run(
            Arc::clone(&self.discovery),
            self.config,
            self.aliases.clone(),
            listener,
            state_tx,
            token.clone(),
        ));

        tracing::info!(
            scanner = %name,
            interval = ?self.config.interval,
            ttl = ?self.config.ttl,
            "scanner started"
        );
        ScannerHandle {
            name,
            state: state_rx,
            token,
            task,
        }
    }
}

/// Control handle of a running scanner.
#[derive(Debug)]
pub struct ScannerHandle {
    name: String,
    state: watch::Receiver<ScannerState>,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ScannerHandle {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn state(&self) -> ScannerState {
        *self.state.borrow()
    }

    /// Prevent the next cycle. A discovery already in flight runs to completion.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Stop and wait for the loop to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(err) = self.task.await {
            tracing::error!(scanner = %self.name, err = %err, "scanner task panicked");
        }
    }
}

fn apply_aliases(aliases: &HashMap<DeviceId, String>, devices: Vec<IotDevice>) -> Vec<IotDevice> {
    if aliases.is_empty() {
        return devices;
    }
    devices
        .into_iter()
        .map(|mut device| {
            if let Some(alias) = aliases.get(device.id()) {
                device.record_mut().name.clone_from(alias);
            }
            device
        })
        .collect()
}

/// Wall-clock time that advances with the tokio clock, so paused-time tests
/// see TTLs expire.
struct ScanClock {
    wall: Timestamp,
    started: tokio::time::Instant,
}

impl ScanClock {
    fn start() -> Self {
        Self {
            wall: now(),
            started: tokio::time::Instant::now(),
        }
    }

    fn now(&self) -> Timestamp {
        chrono::Duration::from_std(self.started.elapsed())
            .map_or(self.wall, |elapsed| self.wall + elapsed)
    }
}

async fn run<D: Discovery, L: PresenceListener>(
    discovery: Arc<D>,
    config: ScannerConfig,
    aliases: HashMap<DeviceId, String>,
    listener: L,
    state: watch::Sender<ScannerState>,
    token: CancellationToken,
) {
    let name = discovery.name().to_string();
    let clock = ScanClock::start();
    let mut tracker = PresenceTracker::new(config.ttl);

    while !token.is_cancelled() {
        state.send_replace(ScannerState::Scanning);
        match discovery.scan().await {
            Ok(devices) => {
                let presence = tracker.observe(clock.now(), apply_aliases(&aliases, devices));
                for device in presence.found {
                    tracing::debug!(scanner = %name, device_id = %device.id(), "device found");
                    listener.on_new_device(&name, device);
                }
                for device in presence.seen {
                    listener.on_device_seen(&name, device);
                }
                for device in presence.lost {
                    tracing::debug!(scanner = %name, device_id = %device.id(), "device lost");
                    listener.on_lost_device(&name, device);
                }
            }
            Err(err) => {
                tracing::warn!(scanner = %name, err = %err, "discovery failed");
            }
        }

        state.send_replace(ScannerState::Sleeping);
        tokio::select! {
            () = token.cancelled() => break,
            () = tokio::time::sleep(config.interval) => {}
        }
    }

    state.send_replace(ScannerState::Idle);
    tracing::info!(scanner = %name, "scanner stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use commoniot_domain::device::{Device, DeviceType};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn dev(id: &str, host: &str) -> IotDevice {
        IotDevice::passive(
            Device::builder()
                .id(id)
                .host(host)
                .device_type(DeviceType::Sensor)
                .build()
                .unwrap(),
        )
    }

    #[derive(Default)]
    struct FakeDiscovery {
        name: &'static str,
        visible: Mutex<Vec<IotDevice>>,
        failing: AtomicBool,
        scans: AtomicUsize,
    }

    impl FakeDiscovery {
        fn named(name: &'static str) -> Self {
            Self {
                name,
                ..Self::default()
            }
        }

        fn show(&self, devices: Vec<IotDevice>) {
            *self.visible.lock().unwrap() = devices;
        }
    }

    impl Discovery for FakeDiscovery {
        fn name(&self) -> &str {
            if self.name.is_empty() {
                "fake"
            } else {
                self.name
            }
        }

        async fn scan(&self) -> Result<Vec<IotDevice>, DiscoveryError> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(DiscoveryError::Unavailable);
            }
            Ok(self.visible.lock().unwrap().clone())
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn transitions(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter(|event| !event.starts_with("seen"))
                .collect()
        }
    }

    impl PresenceListener for Recorder {
        fn on_new_device(&self, _scanner: &str, device: IotDevice) {
            self.events.lock().unwrap().push(format!("new:{}", device.id()));
        }

        fn on_device_seen(&self, _scanner: &str, device: IotDevice) {
            self.events.lock().unwrap().push(format!("seen:{}", device.id()));
        }

        fn on_lost_device(&self, scanner: &str, device: IotDevice) {
            self.events
                .lock()
                .unwrap()
                .push(format!("lost:{}@{scanner}", device.id()));
        }
    }

    fn secs(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    #[test]
    fn should_report_first_sighting_as_found() {
        let mut tracker = PresenceTracker::new(Duration::from_secs(30));
        let t0 = now();

        let first = tracker.observe(t0, vec![dev("a", "h")]);
        let second = tracker.observe(t0 + secs(3), vec![dev("a", "h")]);

        assert_eq!(first.found.len(), 1);
        assert!(first.seen.is_empty());
        assert!(second.found.is_empty());
        assert_eq!(second.seen.len(), 1);
        assert_eq!(second.seen[0].record().last_seen, Some(t0 + secs(3)));
    }

    #[test]
    fn should_report_lost_once_then_found_again() {
        let mut tracker = PresenceTracker::new(Duration::from_secs(30));
        let t0 = now();
        tracker.observe(t0, vec![dev("a", "h")]);

        assert!(tracker.observe(t0 + secs(30), vec![]).is_empty());
        let lost = tracker.observe(t0 + secs(31), vec![]);
        assert_eq!(lost.lost.len(), 1);
        assert!(tracker.observe(t0 + secs(40), vec![]).is_empty());
        assert!(!tracker.is_tracking(&DeviceId::new("a")));

        let back = tracker.observe(t0 + secs(41), vec![dev("a", "h")]);
        assert_eq!(back.found.len(), 1);
        let again = tracker.observe(t0 + secs(44), vec![dev("a", "h")]);
        assert!(again.found.is_empty());
    }

    #[test]
    fn should_keep_devices_seen_within_ttl() {
        let mut tracker = PresenceTracker::new(Duration::from_secs(5));
        let t0 = now();
        tracker.observe(t0, vec![dev("a", "h"), dev("b", "h2")]);
        let presence = tracker.observe(t0 + secs(6), vec![dev("a", "h")]);

        assert_eq!(presence.lost.len(), 1);
        assert_eq!(presence.lost[0].id(), &DeviceId::new("b"));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn should_stamp_last_seen_into_raw_data() {
        let mut tracker = PresenceTracker::new(Duration::from_secs(5));
        let t0 = now();
        let presence = tracker.observe(t0, vec![dev("a", "h")]);
        assert_eq!(
            presence.found[0].record().raw_data["last_seen"],
            serde_json::Value::String(t0.to_rfc3339())
        );
    }

    fn scanner(discovery: &Arc<FakeDiscovery>) -> Scanner<Arc<FakeDiscovery>> {
        Scanner::new(
            Arc::clone(discovery),
            ScannerConfig {
                interval: Duration::from_secs(3),
                ttl: Duration::from_secs(5),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn should_emit_found_lost_found_across_a_gap() {
        let discovery = Arc::new(FakeDiscovery::default());
        discovery.show(vec![dev("a", "h")]);
        let recorder = Arc::new(Recorder::default());
        let handle = scanner(&discovery).spawn(Arc::clone(&recorder));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(recorder.transitions(), vec!["new:a"]);

        discovery.show(vec![]);
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(recorder.transitions(), vec!["new:a", "lost:a@fake"]);

        discovery.show(vec![dev("a", "h")]);
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(recorder.transitions(), vec!["new:a", "lost:a@fake", "new:a"]);
        assert!(recorder.events().contains(&"seen:a".to_string()));

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_scanning_after_discovery_failure() {
        let discovery = Arc::new(FakeDiscovery::default());
        discovery.failing.store(true, Ordering::SeqCst);
        discovery.show(vec![dev("a", "h")]);
        let recorder = Arc::new(Recorder::default());
        let handle = scanner(&discovery).spawn(Arc::clone(&recorder));

        tokio::time::sleep(Duration::from_millis(6100)).await;
        assert_eq!(discovery.scans.load(Ordering::SeqCst), 3);
        assert!(recorder.events().is_empty());

        discovery.failing.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(recorder.transitions(), vec!["new:a"]);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_start_another_cycle_after_stop() {
        let discovery = Arc::new(FakeDiscovery::default());
        let handle = scanner(&discovery).spawn(Arc::new(Recorder::default()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.state(), ScannerState::Sleeping);
        handle.stop();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(discovery.scans.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state(), ScannerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_device_seen_by_a_second_scanner() {
        use crate::event_bus::InProcessBus;
        use crate::services::DeviceRegistry;
        use std::collections::BTreeSet;

        let bus = InProcessBus::new(256);
        let mut rx = bus.subscribe();
        let registry = Arc::new(DeviceRegistry::new(bus));
        let wifi = Arc::new(FakeDiscovery::named("wifi"));
        let upnp = Arc::new(FakeDiscovery::named("upnp"));
        wifi.show(vec![dev("tv", "10.0.0.9"), dev("wifi:plug", "10.0.0.9")]);
        upnp.show(vec![dev("tv", "10.0.0.9")]);
        let handles = [
            scanner(&wifi).spawn(Arc::clone(&registry)),
            scanner(&upnp).spawn(Arc::clone(&registry)),
        ];

        tokio::time::sleep(Duration::from_millis(100)).await;
        let tv = DeviceId::new("tv");
        let plug = DeviceId::new("wifi:plug");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.mappings_for(&tv), BTreeSet::from([plug.clone()]));
        assert_eq!(registry.mappings_for(&plug), BTreeSet::from([tv.clone()]));

        wifi.show(vec![dev("wifi:plug", "10.0.0.9")]);
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert!(registry.get(&tv).is_some());
        assert_eq!(registry.observers_of(&tv), BTreeSet::from(["upnp".to_string()]));

        upnp.show(vec![]);
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert!(registry.get(&tv).is_none());
        assert!(registry.get(&plug).is_some());

        let mut removed = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if message.str_field("change") == Some("removed") {
                removed.push(message.str_field("device_id").unwrap().to_string());
            }
        }
        assert_eq!(removed, vec!["tv"]);

        for handle in handles {
            handle.shutdown().await;
        }
    }

    #[tokio::test]
    async fn should_apply_aliases_to_yielded_devices() {
        let discovery = Arc::new(FakeDiscovery::default());
        discovery.show(vec![dev("a", "10.0.0.2"), dev("b", "10.0.0.3")]);
        let scanner = scanner(&discovery).with_alias("b", "Hallway Sensor");

        let found = scanner.find_by_host("10.0.0.3").await.unwrap().unwrap();
        assert_eq!(found.id(), &DeviceId::new("b"));
        assert_eq!(found.record().name, "Hallway Sensor");
        assert!(scanner.find_by_host("10.0.0.9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_propagate_discovery_error_from_find_by_host() {
        let discovery = Arc::new(FakeDiscovery::default());
        discovery.failing.store(true, Ordering::SeqCst);
        let result = scanner(&discovery).find_by_host("h").await;
        assert!(matches!(result, Err(DiscoveryError::Unavailable)));
    }
}
