//! Bus API: the inbound `iot.*` message surface.
//!
//! [`BusApi::handle`] answers one request with its `<type>.response`
//! message, whose payload is a [`Reply`]. Requests for other namespaces yield
//! `None`. [`BusApi::serve`] does the same for every request arriving on an
//! in-process bus.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Value, json};
use tokio::sync::broadcast;

use commoniot_domain::device::DeviceType;
use commoniot_domain::display::{self, DisplayGroup};
use commoniot_domain::error::{InvalidArgument, IotError};
use commoniot_domain::message::{Message, Reply};

use crate::ports::MessagePublisher;
use crate::services::dispatcher::{CommandDispatcher, DEFAULT_STEP};
use crate::services::registry::DeviceRegistry;
use crate::services::to_json;

pub const GET_DEVICES: &str = "iot.get_devices";
pub const GET_DEVICE: &str = "iot.get_device";
pub const GET_DEVICE_DISPLAY_MODEL: &str = "iot.get_device_display_model";
pub const TURN_ON: &str = "iot.device.turn_on";
pub const TURN_OFF: &str = "iot.device.turn_off";
pub const TOGGLE: &str = "iot.device.toggle";
pub const CALL_FUNCTION: &str = "iot.call_function";
pub const GET_BRIGHTNESS: &str = "iot.device.get_brightness";
pub const SET_BRIGHTNESS: &str = "iot.device.set_brightness";
pub const INCREASE_BRIGHTNESS: &str = "iot.device.increase_brightness";
pub const DECREASE_BRIGHTNESS: &str = "iot.device.decrease_brightness";
pub const GET_COLOR: &str = "iot.device.get_color";
pub const SET_COLOR: &str = "iot.device.set_color";
pub const GET_VOLUME: &str = "iot.device.get_volume";
pub const SET_VOLUME: &str = "iot.device.set_volume";
pub const INCREASE_VOLUME: &str = "iot.device.increase_volume";
pub const DECREASE_VOLUME: &str = "iot.device.decrease_volume";
pub const GET_DASHBOARD: &str = "iot.get_dashboard";
pub const GET_DEVICE_TYPE_DASHBOARD: &str = "iot.get_device_type_dashboard";
pub const GET_AREA_DASHBOARD: &str = "iot.get_area_dashboard";
pub const SET_GROUP_DISPLAY: &str = "iot.set_group_display";

/// Every request type [`BusApi::handle`] answers.
pub const REQUEST_TYPES: &[&str] = &[
    GET_DEVICES,
    GET_DEVICE,
    GET_DEVICE_DISPLAY_MODEL,
    TURN_ON,
    TURN_OFF,
    TOGGLE,
    CALL_FUNCTION,
    GET_BRIGHTNESS,
    SET_BRIGHTNESS,
    INCREASE_BRIGHTNESS,
    DECREASE_BRIGHTNESS,
    GET_COLOR,
    SET_COLOR,
    GET_VOLUME,
    SET_VOLUME,
    INCREASE_VOLUME,
    DECREASE_VOLUME,
    GET_DASHBOARD,
    GET_DEVICE_TYPE_DASHBOARD,
    GET_AREA_DASHBOARD,
    SET_GROUP_DISPLAY,
];

/// Request handler over a shared registry.
pub struct BusApi<P> {
    registry: Arc<DeviceRegistry<P>>,
    dispatcher: CommandDispatcher<P>,
    use_group_display: AtomicBool,
}

impl<P: MessagePublisher> BusApi<P> {
    pub fn new(registry: Arc<DeviceRegistry<P>>, use_group_display: bool) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(Arc::clone(&registry)),
            registry,
            use_group_display: AtomicBool::new(use_group_display),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<DeviceRegistry<P>> {
        &self.registry
    }

    #[must_use]
    pub fn dispatcher(&self) -> &CommandDispatcher<P> {
        &self.dispatcher
    }

    #[must_use]
    pub fn use_group_display(&self) -> bool {
        self.use_group_display.load(Ordering::Relaxed)
    }

    pub fn set_group_display(&self, enabled: bool) {
        self.use_group_display.store(enabled, Ordering::Relaxed);
    }

    /// Answer `message`, or `None` when its type is not part of the surface.
    #[tracing::instrument(skip(self, message), fields(msg_type = %message.msg_type))]
    pub fn handle(&self, message: &Message) -> Option<Message> {
        let result = self.route(message)?;
        if let Err(err) = &result {
            tracing::debug!(err = %err, kind = err.kind(), "request failed");
        }
        Some(message.response(Reply::from(result).into_value()))
    }

    fn route(&self, message: &Message) -> Option<Result<Value, IotError>> {
        let data = &message.data;
        let result = match message.msg_type.as_str() {
            GET_DEVICES => Ok(to_json(self.registry.views())),
            GET_DEVICE | GET_DEVICE_DISPLAY_MODEL => target(data, "device_id")
                .and_then(|device| self.dispatcher.dispatch(&device, "as_dict", None)),
            TURN_ON => self.call(data, "turn_on", None),
            TURN_OFF => self.call(data, "turn_off", None),
            TOGGLE => self.call(data, "toggle", None),
            CALL_FUNCTION => self.call_function(data),
            GET_BRIGHTNESS => self.call(data, "brightness", None),
            SET_BRIGHTNESS => value_field(data, &["brightness", "amount"])
                .and_then(|value| self.call(data, "change_brightness", Some(&json!([value])))),
            INCREASE_BRIGHTNESS => {
                let amount = amount(data);
                self.call(data, "increase_brightness", Some(&json!([amount])))
            }
            DECREASE_BRIGHTNESS => {
                let amount = amount(data);
                self.call(data, "decrease_brightness", Some(&json!([amount])))
            }
            GET_COLOR => self.call(data, "color", None),
            SET_COLOR => value_field(data, &["color"])
                .and_then(|color| self.call(data, "change_color", Some(&json!([color])))),
            GET_VOLUME => self.call(data, "volume", None),
            SET_VOLUME => value_field(data, &["volume", "amount"])
                .and_then(|value| self.call(data, "set_volume", Some(&json!([value])))),
            INCREASE_VOLUME => {
                let amount = amount(data);
                self.call(data, "increase_volume", Some(&json!([amount])))
            }
            DECREASE_VOLUME => {
                let amount = amount(data);
                self.call(data, "decrease_volume", Some(&json!([amount])))
            }
            GET_DASHBOARD => Ok(to_json(self.dashboard())),
            GET_DEVICE_TYPE_DASHBOARD => self.device_type_dashboard(data),
            GET_AREA_DASHBOARD => self.area_dashboard(data),
            SET_GROUP_DISPLAY => match data.get("use_group_display").and_then(Value::as_bool) {
                Some(enabled) => {
                    self.set_group_display(enabled);
                    Ok(Value::Bool(enabled))
                }
                None => Err(invalid(SET_GROUP_DISPLAY, "use_group_display must be a boolean")),
            },
            _ => return None,
        };
        Some(result)
    }

    fn call(&self, data: &Value, operation: &str, args: Option<&Value>) -> Result<Value, IotError> {
        let device = target(data, "device")?;
        self.dispatcher.dispatch(&device, operation, args)
    }

    fn call_function(&self, data: &Value) -> Result<Value, IotError> {
        let device = target(data, "device_id")?;
        let function = data
            .get("function_name")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid(CALL_FUNCTION, "function_name must be a string"))?;
        self.dispatcher
            .dispatch(&device, function, data.get("function_args"))
    }

    /// Groups for the main dashboard, by area or by type.
    #[must_use]
    pub fn dashboard(&self) -> Vec<DisplayGroup> {
        let views = self.registry.views();
        if self.use_group_display() {
            display::group_by_area(&views)
        } else {
            display::group_by_type(&views)
        }
    }

    fn device_type_dashboard(&self, data: &Value) -> Result<Value, IotError> {
        let device_type = data
            .get("device_type")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid(GET_DEVICE_TYPE_DASHBOARD, "device_type must be a string"))?
            .parse::<DeviceType>()
            .map_err(|err| invalid(GET_DEVICE_TYPE_DASHBOARD, err.to_string()))?;
        Ok(to_json(display::devices_of_type(
            &self.registry.views(),
            device_type,
        )))
    }

    fn area_dashboard(&self, data: &Value) -> Result<Value, IotError> {
        let area = data
            .get("area")
            .and_then(Value::as_str)
            .unwrap_or(display::UNKNOWN_AREA);
        Ok(to_json(display::devices_in_area(&self.registry.views(), area)))
    }

    /// Answer every request arriving on `requests`, publishing responses
    /// through `responses`. Returns when the channel closes.
    pub async fn serve(
        &self,
        mut requests: broadcast::Receiver<Message>,
        responses: impl MessagePublisher,
    ) {
        loop {
            match requests.recv().await {
                Ok(message) if !message.is_response() => {
                    if let Some(response) = self.handle(&message) {
                        responses.publish(response);
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "bus api lagging, requests dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

fn invalid(operation: &str, reason: impl Into<String>) -> IotError {
    InvalidArgument::new(operation, reason).into()
}

/// The device a request targets.
///
/// `key` (`device` or `device_id`) may hold the identifier or exact name as a
/// string, or an object carrying `device_id` or `name`. Both keys are tried.
fn target(data: &Value, key: &str) -> Result<String, IotError> {
    let field = data
        .get(key)
        .or_else(|| data.get("device"))
        .or_else(|| data.get("device_id"));
    let query = match field {
        Some(Value::String(query)) => Some(query.as_str()),
        Some(Value::Object(object)) => object
            .get("device_id")
            .or_else(|| object.get("name"))
            .and_then(Value::as_str),
        _ => None,
    };
    query
        .map(str::to_string)
        .ok_or_else(|| invalid(key, "missing device identifier or name"))
}

fn value_field<'a>(data: &'a Value, keys: &[&str]) -> Result<&'a Value, IotError> {
    keys.iter()
        .find_map(|key| data.get(*key).filter(|value| !value.is_null()))
        .ok_or_else(|| invalid(keys[0], format!("missing {:?}", keys[0])))
}

fn amount(data: &Value) -> Value {
    data.get("amount")
        .filter(|value| !value.is_null())
        .cloned()
        .unwrap_or_else(|| Value::from(DEFAULT_STEP))
}
