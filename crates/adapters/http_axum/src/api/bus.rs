//! `POST /api/bus`: the bus request surface over HTTP.

use axum::Json;
use axum::extract::State;

use commoniot_app::ports::MessagePublisher;
use commoniot_domain::message::Message;

use crate::error::ApiError;
use crate::state::AppState;

/// Answer one request message.
///
/// The body is a bus [`Message`]; only `type` is mandatory. Failures of the
/// request itself (unknown device, bad arguments) are carried inside the
/// response envelope with status `200`, exactly as on the bus.
pub async fn request<P>(
    State(state): State<AppState<P>>,
    Json(message): Json<Message>,
) -> Result<Json<Message>, ApiError>
where
    P: MessagePublisher + 'static,
{
    state
        .api
        .handle(&message)
        .map(Json)
        .ok_or(ApiError::UnknownMessageType(message.msg_type))
}
