//! JSON handlers for devices.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::Value;

use commoniot_app::ports::MessagePublisher;
use commoniot_domain::display::DeviceView;
use commoniot_domain::message::Reply;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for calling a device operation.
#[derive(Debug, Deserialize)]
pub struct CallRequest {
    pub function_name: String,
    #[serde(default)]
    pub function_args: Option<Value>,
}

/// `GET /api/devices`
pub async fn list<P>(State(state): State<AppState<P>>) -> Json<Vec<DeviceView>>
where
    P: MessagePublisher + 'static,
{
    Json(state.api.registry().views())
}

/// `GET /api/devices/{device}`
pub async fn get<P>(
    State(state): State<AppState<P>>,
    Path(device): Path<String>,
) -> Result<Json<Value>, ApiError>
where
    P: MessagePublisher + 'static,
{
    let view = state.api.dispatcher().dispatch(&device, "as_dict", None)?;
    Ok(Json(view))
}

/// `POST /api/devices/{device}/call`
pub async fn call<P>(
    State(state): State<AppState<P>>,
    Path(device): Path<String>,
    Json(req): Json<CallRequest>,
) -> Result<Json<Reply>, ApiError>
where
    P: MessagePublisher + 'static,
{
    let result = state.api.dispatcher().dispatch(
        &device,
        &req.function_name,
        req.function_args.as_ref(),
    )?;
    Ok(Json(Reply::ok(result)))
}

/// `GET /api/devices/{device}/picture`: the raw frame as returned by the camera.
pub async fn picture<P>(
    State(state): State<AppState<P>>,
    Path(device): Path<String>,
) -> Result<Response, ApiError>
where
    P: MessagePublisher + 'static,
{
    let frame = state.api.registry().search_for_device(&device)?.get_picture()?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], frame).into_response())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::router::build;
    use crate::testing::{json, state};

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn call(device: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/api/devices/{device}/call"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn should_list_device_views_sorted_by_id() {
        let app = build(state());

        let response = app.oneshot(get("/api/devices")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        let ids: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|view| view["device_id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, ["camera", "lamp", "plug"]);
    }

    #[tokio::test]
    async fn should_get_device_by_name() {
        let app = build(state());

        let response = app.oneshot(get("/api/devices/Desk%20Lamp")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["device_id"], "lamp");
        assert_eq!(body["device_type"], "rgb_bulb");
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_device() {
        let app = build(state());

        let response = app.oneshot(get("/api/devices/ghost")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json(response).await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"]["kind"], "device_not_found");
    }

    #[tokio::test]
    async fn should_call_function_with_args() {
        let app = build(state());

        let response = app
            .oneshot(call(
                "lamp",
                &json!({"function_name": "change_brightness", "function_args": [150]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body, json!({"ok": true, "result": 100}));
    }

    #[tokio::test]
    async fn should_reject_unsupported_function() {
        let app = build(state());

        let response = app
            .oneshot(call(
                "plug",
                &json!({"function_name": "change_color", "function_args": ["red"]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json(response).await;
        assert_eq!(body["error"]["kind"], "unsupported_operation");
    }

    #[tokio::test]
    async fn should_return_camera_frame() {
        let app = build(state());

        let response = app.oneshot(get("/api/devices/camera/picture")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.starts_with(b"P6\n"));
    }

    #[tokio::test]
    async fn should_refuse_picture_from_non_camera() {
        let app = build(state());

        let response = app.oneshot(get("/api/devices/lamp/picture")).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
