//! Bus messages.
//!
//! A [`Message`] is a typed envelope around a JSON payload. Requests are
//! answered with a message of type `<request type>.response` that carries a
//! [`Reply`] payload and points back at the request via `in_reply_to`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::IotError;
use crate::id::{DeviceId, MessageId};
use crate::time::{Timestamp, now};

/// Message type published whenever the registry mutates a device.
pub const DEVICE_UPDATED: &str = "iot.device.updated";

const RESPONSE_SUFFIX: &str = ".response";

/// A message flowing over the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: MessageId,
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<MessageId>,
    #[serde(default = "now")]
    pub timestamp: Timestamp,
}

impl Message {
    #[must_use]
    pub fn new(msg_type: impl Into<String>, data: Value) -> Self {
        Self {
            id: MessageId::new(),
            msg_type: msg_type.into(),
            data,
            in_reply_to: None,
            timestamp: now(),
        }
    }

    /// Build the response to this message.
    #[must_use]
    pub fn response(&self, data: Value) -> Self {
        Self {
            in_reply_to: Some(self.id),
            ..Self::new(format!("{}{RESPONSE_SUFFIX}", self.msg_type), data)
        }
    }

    #[must_use]
    pub fn is_response(&self) -> bool {
        self.msg_type.ends_with(RESPONSE_SUFFIX)
    }

    /// `iot.device.updated` notification for one device.
    #[must_use]
    pub fn device_updated(device_id: &DeviceId, change: Change) -> Self {
        Self::new(
            DEVICE_UPDATED,
            json!({ "device_id": device_id, "change": change }),
        )
    }

    /// Look up a string field in the payload.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

/// What happened to a device in an `iot.device.updated` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    Added,
    Updated,
    Removed,
}

/// Structured outcome carried by every response payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Ok { ok: bool, result: Value },
    Err { ok: bool, error: ReplyError },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyError {
    pub kind: String,
    pub message: String,
}

impl Reply {
    #[must_use]
    pub fn ok(result: impl Into<Value>) -> Self {
        Self::Ok {
            ok: true,
            result: result.into(),
        }
    }

    #[must_use]
    pub fn error(err: &IotError) -> Self {
        Self::Err {
            ok: false,
            error: ReplyError {
                kind: err.kind().to_string(),
                message: err.to_string(),
            },
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    /// The JSON form carried in response payloads.
    #[must_use]
    pub fn into_value(self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

impl From<Result<Value, IotError>> for Reply {
    fn from(result: Result<Value, IotError>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(err) => Self::error(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeviceNotFound;

    #[test]
    fn should_build_response_with_suffix_and_correlation() {
        let request = Message::new("iot.get_devices", Value::Null);
        let response = request.response(json!([]));
        assert_eq!(response.msg_type, "iot.get_devices.response");
        assert_eq!(response.in_reply_to, Some(request.id));
        assert!(response.is_response());
        assert!(!request.is_response());
    }

    #[test]
    fn should_deserialize_request_with_only_type() {
        let message: Message = serde_json::from_str(r#"{"type":"iot.get_devices"}"#).unwrap();
        assert_eq!(message.msg_type, "iot.get_devices");
        assert_eq!(message.data, Value::Null);
        assert!(message.in_reply_to.is_none());
    }

    #[test]
    fn should_describe_device_update() {
        let message = Message::device_updated(&DeviceId::new("bulb-1"), Change::Removed);
        assert_eq!(message.msg_type, DEVICE_UPDATED);
        assert_eq!(message.str_field("device_id"), Some("bulb-1"));
        assert_eq!(message.str_field("change"), Some("removed"));
    }

    #[test]
    fn should_render_ok_reply() {
        let value = Reply::ok(42).into_value();
        assert_eq!(value, json!({"ok": true, "result": 42}));
    }

    #[test]
    fn should_render_error_reply_with_kind() {
        let err: IotError = DeviceNotFound::new("missing").into();
        let value = Reply::from(Err(err)).into_value();
        assert_eq!(value["ok"], false);
        assert_eq!(value["error"]["kind"], "device_not_found");
        assert_eq!(value["error"]["message"], "no device matches \"missing\"");
    }

    #[test]
    fn should_render_error_reply_without_extra_fields() {
        let err: IotError = DeviceNotFound::new("lamp").into();
        let reply = Reply::error(&err);
        assert_eq!(
            reply.clone().into_value(),
            json!({
                "ok": false,
                "error": {"kind": "device_not_found", "message": "no device matches \"lamp\""},
            })
        );
        assert_eq!(reply.clone().into_value(), serde_json::to_value(reply).unwrap());
    }

    #[test]
    fn should_deserialize_reply_variants() {
        let ok: Reply = serde_json::from_value(json!({"ok": true, "result": "x"})).unwrap();
        assert!(ok.is_ok());
        let err: Reply = serde_json::from_value(
            json!({"ok": false, "error": {"kind": "invalid_argument", "message": "m"}}),
        )
        .unwrap();
        assert!(!err.is_ok());
    }
}
