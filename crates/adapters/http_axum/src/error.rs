//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use commoniot_domain::error::{InvalidArgument, IotError};
use commoniot_domain::message::Reply;

/// Errors surfaced by the API endpoints.
///
/// The body has the same shape as a failed bus reply:
/// `{"ok": false, "error": {"kind": "...", "message": "..."}}`.
#[derive(Debug)]
pub enum ApiError {
    Iot(IotError),
    /// `POST /api/bus` got a message type outside the request surface.
    UnknownMessageType(String),
}

impl From<IotError> for ApiError {
    fn from(err: IotError) -> Self {
        Self::Iot(err)
    }
}

impl From<InvalidArgument> for ApiError {
    fn from(err: InvalidArgument) -> Self {
        Self::Iot(err.into())
    }
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Iot(IotError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Iot(IotError::Unsupported(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Iot(IotError::InvalidArgument(_)) | Self::UnknownMessageType(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Iot(IotError::OperationFailed(_)) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Iot(err) => {
                if status == StatusCode::BAD_GATEWAY {
                    tracing::warn!(err = %err, "device operation failed");
                }
                Reply::error(err).into_value()
            }
            Self::UnknownMessageType(msg_type) => json!({
                "ok": false,
                "error": {
                    "kind": "unknown_message_type",
                    "message": format!("no handler for message type {msg_type:?}"),
                },
            }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commoniot_domain::error::{DeviceNotFound, DriverError, UnsupportedOperation};
    use commoniot_domain::id::DeviceId;

    #[test]
    fn should_map_error_kinds_to_status_codes() {
        let id = DeviceId::new("lamp");
        let cases = [
            (ApiError::from(IotError::from(DeviceNotFound::new("x"))), StatusCode::NOT_FOUND),
            (
                ApiError::from(IotError::from(UnsupportedOperation::new(&id, "blink"))),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::from(InvalidArgument::new("set_volume", "not a number")),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(IotError::from_driver(
                    &id,
                    "turn_on",
                    DriverError::Rejected("offline".into()),
                )),
                StatusCode::BAD_GATEWAY,
            ),
            (ApiError::UnknownMessageType("x".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status(), expected);
        }
    }

    #[test]
    fn should_treat_unimplemented_driver_call_as_unsupported() {
        let err =
            IotError::from_driver(&DeviceId::new("lamp"), "color", DriverError::NotImplemented);
        assert_eq!(ApiError::from(err).status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
