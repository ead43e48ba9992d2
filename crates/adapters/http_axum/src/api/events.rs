//! Server-Sent Events (SSE) stream of bus traffic.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use commoniot_app::ports::MessagePublisher;
use commoniot_domain::message::Message;

use crate::state::AppState;

/// `GET /api/events`: every message published on the bus.
///
/// Each message is sent as an SSE frame whose `event` is the message type and
/// whose `data` is the JSON-encoded message. The stream continues until the
/// client disconnects or the bus is dropped.
pub async fn stream<P>(
    State(state): State<AppState<P>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>
where
    P: MessagePublisher + 'static,
{
    let messages = BroadcastStream::new(state.bus.subscribe()).filter_map(|result| match result {
        Ok(message) => frame(&message).map(Ok::<_, Infallible>),
        Err(BroadcastStreamRecvError::Lagged(n)) => {
            tracing::warn!(skipped = n, "SSE subscriber lagged, some messages were dropped");
            None
        }
    });

    Sse::new(messages).keep_alive(KeepAlive::default())
}

fn frame(message: &Message) -> Option<Event> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Event::default().event(&message.msg_type).data(json)),
        Err(err) => {
            tracing::warn!(%err, "failed to serialize message for SSE stream");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use commoniot_app::ports::MessagePublisher;
    use commoniot_domain::id::DeviceId;
    use commoniot_domain::message::{Change, Message};

    use crate::router::build;
    use crate::testing::state;

    #[tokio::test]
    async fn should_stream_bus_messages_as_events() {
        let state = state();
        let bus = state.bus.clone();
        let app = build(state);

        let response = app
            .oneshot(Request::builder().uri("/api/events").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );

        bus.publish(Message::device_updated(&DeviceId::new("lamp"), Change::Updated));

        let mut body = response.into_body();
        let frame = tokio::time::timeout(Duration::from_secs(1), body.frame())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
        assert!(text.starts_with("event: iot.device.updated\n"));
        assert!(text.contains("\"device_id\":\"lamp\""));
    }

    #[tokio::test]
    async fn should_subscribe_when_stream_opened() {
        let state = state();
        let bus = state.bus.clone();
        let before = bus.subscriber_count();

        let _response = build(state)
            .oneshot(Request::builder().uri("/api/events").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(bus.subscriber_count(), before + 1);
    }
}
