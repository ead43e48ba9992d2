//! Display models consumed by dashboards.
//!
//! A [`DeviceView`] is a read-only snapshot of one device and its live state.
//! Grouping is an explicit switch on [`DeviceType`] or on the `area` field;
//! devices without an area land in the `"unknown"` bucket.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::color::ColorView;
use crate::device::{Capability, DeviceType};
use crate::id::DeviceId;

/// Area name used for devices that report none.
pub const UNKNOWN_AREA: &str = "unknown";

/// Snapshot of a device as shown to users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceView {
    pub device_id: DeviceId,
    pub host: Option<String>,
    pub name: String,
    pub area: Option<String>,
    pub device_type: DeviceType,
    pub capabilities: Vec<Capability>,
    pub is_on: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    pub raw_data: Map<String, Value>,
}

impl DeviceView {
    #[must_use]
    pub fn area_or_unknown(&self) -> &str {
        self.area.as_deref().unwrap_or(UNKNOWN_AREA)
    }
}

/// A titled section of the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayGroup {
    #[serde(rename = "type")]
    pub group_type: String,
    pub icon: String,
    pub name: String,
    pub devices: Vec<DeviceView>,
}

/// `"living_room"` → `"Living Room"`.
#[must_use]
pub fn title_case(value: &str) -> String {
    value
        .split(['_', ' ', '-'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// One group per device type present, in [`DeviceType::ALL`] order.
#[must_use]
pub fn group_by_type(views: &[DeviceView]) -> Vec<DisplayGroup> {
    DeviceType::ALL
        .into_iter()
        .filter_map(|device_type| {
            let devices = devices_of_type(views, device_type);
            if devices.is_empty() {
                return None;
            }
            Some(DisplayGroup {
                group_type: device_type.as_str().to_string(),
                icon: format!("mdi:{device_type}"),
                name: title_case(device_type.as_str()),
                devices,
            })
        })
        .collect()
}

/// One group per area, the unknown bucket first and the rest sorted by name.
#[must_use]
pub fn group_by_area(views: &[DeviceView]) -> Vec<DisplayGroup> {
    let mut areas: BTreeMap<&str, Vec<DeviceView>> = BTreeMap::new();
    let mut unknown = Vec::new();
    for view in views {
        match view.area.as_deref() {
            Some(area) if area != UNKNOWN_AREA => {
                areas.entry(area).or_default().push(view.clone());
            }
            _ => unknown.push(view.clone()),
        }
    }

    let mut groups = Vec::with_capacity(areas.len() + 1);
    if !unknown.is_empty() {
        groups.push(DisplayGroup {
            group_type: UNKNOWN_AREA.to_string(),
            icon: "mdi:ungrouped".to_string(),
            name: "Unknown Location".to_string(),
            devices: unknown,
        });
    }
    groups.extend(areas.into_iter().map(|(area, devices)| DisplayGroup {
        group_type: area.to_string(),
        icon: "mdi:grouped".to_string(),
        name: title_case(area),
        devices,
    }));
    groups
}

#[must_use]
pub fn devices_of_type(views: &[DeviceView], device_type: DeviceType) -> Vec<DeviceView> {
    views
        .iter()
        .filter(|view| view.device_type == device_type)
        .cloned()
        .collect()
}

/// Devices located in `area`; `"unknown"` selects devices without one.
#[must_use]
pub fn devices_in_area(views: &[DeviceView], area: &str) -> Vec<DeviceView> {
    views
        .iter()
        .filter(|view| view.area_or_unknown() == area)
        .cloned()
        .collect()
}
