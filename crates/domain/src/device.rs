//! Device: one controllable or observable physical thing.
//!
//! A device is a flat record: a [`DeviceType`] tag, a [`Capability`] set, and
//! free-form `raw_data` reported by its transport. Behaviour is keyed off
//! capability membership; the default capability set of every type comes from
//! [`DeviceType::default_capabilities`].

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::id::DeviceId;
use crate::time::Timestamp;

/// Recognised device types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Sensor,
    Plug,
    Switch,
    Bulb,
    RgbBulb,
    RgbwBulb,
    Tv,
    Radio,
    Heater,
    Ac,
    Vent,
    Humidifier,
    Camera,
    MediaPlayer,
    Vacuum,
}

/// Operations a device may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    ReportStatus,
    TurnOn,
    TurnOff,
    BlinkLight,
    BeaconLight,
    ReportColor,
    ChangeColor,
    ReportBrightness,
    ChangeBrightness,
    GetPicture,
    PausePlayback,
    ResumePlayback,
    StopPlayback,
    NextPlayback,
    PrevPlayback,
    ReportVolume,
    ChangeVolume,
}

const SENSOR: &[Capability] = &[Capability::ReportStatus];

const SWITCH: &[Capability] = &[
    Capability::ReportStatus,
    Capability::TurnOn,
    Capability::TurnOff,
];

const LIGHT: &[Capability] = &[
    Capability::ReportBrightness,
    Capability::ChangeBrightness,
    Capability::BlinkLight,
    Capability::BeaconLight,
];

const COLOR: &[Capability] = &[Capability::ReportColor, Capability::ChangeColor];

const PLAYBACK: &[Capability] = &[
    Capability::PausePlayback,
    Capability::ResumePlayback,
    Capability::StopPlayback,
    Capability::NextPlayback,
    Capability::PrevPlayback,
    Capability::ReportVolume,
    Capability::ChangeVolume,
];

impl DeviceType {
    pub const ALL: [Self; 15] = [
        Self::Sensor,
        Self::Plug,
        Self::Switch,
        Self::Bulb,
        Self::RgbBulb,
        Self::RgbwBulb,
        Self::Tv,
        Self::Radio,
        Self::Heater,
        Self::Ac,
        Self::Vent,
        Self::Humidifier,
        Self::Camera,
        Self::MediaPlayer,
        Self::Vacuum,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::Plug => "plug",
            Self::Switch => "switch",
            Self::Bulb => "bulb",
            Self::RgbBulb => "rgb_bulb",
            Self::RgbwBulb => "rgbw_bulb",
            Self::Tv => "tv",
            Self::Radio => "radio",
            Self::Heater => "heater",
            Self::Ac => "ac",
            Self::Vent => "vent",
            Self::Humidifier => "humidifier",
            Self::Camera => "camera",
            Self::MediaPlayer => "media_player",
            Self::Vacuum => "vacuum",
        }
    }

    /// Name given to devices that report none, e.g. `generic_rgb_bulb`.
    #[must_use]
    pub fn default_name(self) -> String {
        format!("generic_{}", self.as_str())
    }

    /// Capability table replacing the `Sensor → Switch → Plug → Bulb` chain.
    #[must_use]
    pub fn default_capabilities(self) -> BTreeSet<Capability> {
        let parts: &[&[Capability]] = match self {
            Self::Sensor => &[SENSOR],
            Self::Plug
            | Self::Switch
            | Self::Heater
            | Self::Ac
            | Self::Vent
            | Self::Humidifier
            | Self::Vacuum => &[SWITCH],
            Self::Bulb => &[SWITCH, LIGHT],
            Self::RgbBulb | Self::RgbwBulb => &[SWITCH, LIGHT, COLOR],
            Self::Tv | Self::Radio | Self::MediaPlayer => &[SWITCH, PLAYBACK],
            Self::Camera => &[SENSOR, &[Capability::GetPicture]],
        };
        parts.iter().flat_map(|caps| caps.iter().copied()).collect()
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The string is not one of the recognised device types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown device type {0:?}")]
pub struct UnknownDeviceType(pub String);

impl FromStr for DeviceType {
    type Err = UnknownDeviceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| UnknownDeviceType(s.to_string()))
    }
}

/// Clamp a requested brightness or volume level into `0..=100`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn clamp_level(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

/// A discovered device record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub host: Option<String>,
    pub name: String,
    pub device_type: DeviceType,
    pub area: Option<String>,
    pub capabilities: BTreeSet<Capability>,
    pub raw_data: Map<String, Value>,
    pub last_seen: Option<Timestamp>,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyId`] when the identifier is empty and
    /// [`ValidationError::EmptyName`] when the name is blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.as_str().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(())
    }

    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Record an observation at `ts`, mirrored into `raw_data["last_seen"]`.
    pub fn mark_seen(&mut self, ts: Timestamp) {
        self.last_seen = Some(ts);
        self.raw_data
            .insert("last_seen".to_string(), Value::String(ts.to_rfc3339()));
    }

    /// Fold a newer observation of the same device into this record.
    ///
    /// `raw_data` is merged recursively (newer keys win), `last_seen` moves
    /// forward, and transport-level fields (`host`, `name`, `area`) follow the
    /// newer observation. Identity and capabilities are left untouched.
    pub fn absorb(&mut self, newer: &Self) {
        merge_json(&mut self.raw_data, &newer.raw_data);
        if newer.last_seen > self.last_seen {
            self.last_seen = newer.last_seen;
        }
        if newer.host.is_some() {
            self.host.clone_from(&newer.host);
        }
        if newer.area.is_some() {
            self.area.clone_from(&newer.area);
        }
        self.name.clone_from(&newer.name);
    }

    /// Whether this device and `other` share a transport address.
    #[must_use]
    pub fn same_host(&self, other: &Self) -> bool {
        matches!((&self.host, &other.host), (Some(a), Some(b)) if a == b)
    }
}

fn merge_json(base: &mut Map<String, Value>, newer: &Map<String, Value>) {
    for (key, value) in newer {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_json(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    id: Option<DeviceId>,
    host: Option<String>,
    name: Option<String>,
    device_type: Option<DeviceType>,
    area: Option<String>,
    capabilities: Option<BTreeSet<Capability>>,
    raw_data: Map<String, Value>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<DeviceId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = Some(device_type);
        self
    }

    #[must_use]
    pub fn area(mut self, area: impl Into<String>) -> Self {
        self.area = Some(area.into());
        self
    }

    /// Replace the type's default capability set.
    #[must_use]
    pub fn capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities = Some(capabilities.into_iter().collect());
        self
    }

    #[must_use]
    pub fn raw(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.raw_data.insert(key.into(), value.into());
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// Missing names default to [`DeviceType::default_name`]; an empty
    /// `raw_data` is seeded with the identifying fields.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the identifier is missing or empty.
    pub fn build(self) -> Result<Device, ValidationError> {
        let id = self.id.ok_or(ValidationError::EmptyId)?;
        let device_type = self.device_type.unwrap_or(DeviceType::Sensor);
        let name = self.name.unwrap_or_else(|| device_type.default_name());

        let mut raw_data = self.raw_data;
        if raw_data.is_empty() {
            raw_data.insert("device_id".to_string(), Value::String(id.to_string()));
            raw_data.insert("name".to_string(), Value::String(name.clone()));
            raw_data.insert(
                "host".to_string(),
                self.host.clone().map_or(Value::Null, Value::String),
            );
            raw_data.insert(
                "area".to_string(),
                self.area.clone().map_or(Value::Null, Value::String),
            );
        }

        let device = Device {
            id,
            host: self.host,
            name,
            device_type,
            area: self.area,
            capabilities: self
                .capabilities
                .unwrap_or_else(|| device_type.default_capabilities()),
            raw_data,
            last_seen: None,
        };
        device.validate()?;
        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now;

    #[test]
    fn should_default_name_from_device_type() {
        let device = Device::builder()
            .id("a")
            .device_type(DeviceType::RgbBulb)
            .build()
            .unwrap();
        assert_eq!(device.name, "generic_rgb_bulb");
    }

    #[test]
    fn should_reject_missing_id() {
        let result = Device::builder().name("Lamp").build();
        assert!(matches!(result, Err(ValidationError::EmptyId)));
    }

    #[test]
    fn should_reject_blank_name() {
        let result = Device::builder().id("a").name("  ").build();
        assert!(matches!(result, Err(ValidationError::EmptyName)));
    }

    #[test]
    fn should_seed_raw_data_with_identifying_fields() {
        let device = Device::builder()
            .id("plug-1")
            .host("10.0.0.4")
            .device_type(DeviceType::Plug)
            .build()
            .unwrap();
        assert_eq!(device.raw_data["device_id"], "plug-1");
        assert_eq!(device.raw_data["host"], "10.0.0.4");
        assert_eq!(device.raw_data["area"], Value::Null);
    }

    #[test]
    fn should_give_color_bulbs_every_light_capability() {
        let caps = DeviceType::RgbwBulb.default_capabilities();
        for cap in [
            Capability::TurnOn,
            Capability::TurnOff,
            Capability::ChangeBrightness,
            Capability::BlinkLight,
            Capability::ChangeColor,
            Capability::ReportColor,
        ] {
            assert!(caps.contains(&cap), "{cap:?}");
        }
    }

    #[test]
    fn should_keep_sensors_read_only() {
        let caps = DeviceType::Sensor.default_capabilities();
        assert_eq!(caps.into_iter().collect::<Vec<_>>(), vec![Capability::ReportStatus]);
    }

    #[test]
    fn should_give_cameras_pictures_but_no_power_control() {
        let caps = DeviceType::Camera.default_capabilities();
        assert!(caps.contains(&Capability::GetPicture));
        assert!(!caps.contains(&Capability::TurnOn));
    }

    #[test]
    fn should_allow_overriding_capabilities() {
        let device = Device::builder()
            .id("b")
            .device_type(DeviceType::Bulb)
            .capabilities([Capability::TurnOn])
            .build()
            .unwrap();
        assert!(device.supports(Capability::TurnOn));
        assert!(!device.supports(Capability::TurnOff));
    }

    #[test]
    fn should_parse_and_display_device_types() {
        for ty in DeviceType::ALL {
            assert_eq!(ty.to_string().parse::<DeviceType>().unwrap(), ty);
        }
        assert!("toaster".parse::<DeviceType>().is_err());
    }

    #[test]
    fn should_serialize_device_type_in_snake_case() {
        let json = serde_json::to_string(&DeviceType::MediaPlayer).unwrap();
        assert_eq!(json, "\"media_player\"");
    }

    #[test]
    fn should_mirror_last_seen_into_raw_data() {
        let mut device = Device::builder().id("s").build().unwrap();
        let ts = now();
        device.mark_seen(ts);
        assert_eq!(device.last_seen, Some(ts));
        assert_eq!(device.raw_data["last_seen"], Value::String(ts.to_rfc3339()));
    }

    #[test]
    fn should_absorb_newer_observation_without_changing_identity() {
        let mut canonical = Device::builder()
            .id("s")
            .device_type(DeviceType::Sensor)
            .raw("meta", serde_json::json!({"fw": "1.0", "rssi": -70}))
            .build()
            .unwrap();
        let mut newer = Device::builder()
            .id("s")
            .host("10.0.0.9")
            .raw("meta", serde_json::json!({"rssi": -40}))
            .raw("battery", 80)
            .build()
            .unwrap();
        newer.mark_seen(now());

        canonical.absorb(&newer);

        assert_eq!(canonical.id, DeviceId::new("s"));
        assert_eq!(canonical.host.as_deref(), Some("10.0.0.9"));
        assert_eq!(canonical.raw_data["meta"]["fw"], "1.0");
        assert_eq!(canonical.raw_data["meta"]["rssi"], -40);
        assert_eq!(canonical.raw_data["battery"], 80);
        assert_eq!(canonical.last_seen, newer.last_seen);
    }

    #[test]
    fn should_only_match_hosts_when_both_present() {
        let a = Device::builder().id("a").host("h").build().unwrap();
        let b = Device::builder().id("b").host("h").build().unwrap();
        let c = Device::builder().id("c").build().unwrap();
        assert!(a.same_host(&b));
        assert!(!a.same_host(&c));
        assert!(!c.same_host(&c.clone()));
    }

    #[test]
    fn should_clamp_levels() {
        assert_eq!(clamp_level(-5), 0);
        assert_eq!(clamp_level(42), 42);
        assert_eq!(clamp_level(250), 100);
    }
}
