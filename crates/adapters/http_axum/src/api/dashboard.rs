//! JSON handlers for dashboard list models.

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use commoniot_app::ports::MessagePublisher;
use commoniot_domain::device::DeviceType;
use commoniot_domain::display::{self, DeviceView, DisplayGroup};
use commoniot_domain::error::InvalidArgument;

use crate::error::ApiError;
use crate::state::AppState;

/// Body of `PUT /api/dashboard/group_display`, also its answer.
#[derive(Debug, Serialize, Deserialize)]
pub struct GroupDisplay {
    pub use_group_display: bool,
}

/// `GET /api/dashboard`: grouped by area when group display is enabled,
/// by device type otherwise.
pub async fn groups<P>(State(state): State<AppState<P>>) -> Json<Vec<DisplayGroup>>
where
    P: MessagePublisher + 'static,
{
    Json(state.api.dashboard())
}

/// `GET /api/dashboard/types/{device_type}`
pub async fn by_type<P>(
    State(state): State<AppState<P>>,
    Path(device_type): Path<String>,
) -> Result<Json<Vec<DeviceView>>, ApiError>
where
    P: MessagePublisher + 'static,
{
    let device_type = device_type
        .parse::<DeviceType>()
        .map_err(|err| InvalidArgument::new("device_type", err.to_string()))?;
    let views = state.api.registry().views();
    Ok(Json(display::devices_of_type(&views, device_type)))
}

/// `GET /api/dashboard/areas/{area}`; `unknown` lists devices without an area.
pub async fn by_area<P>(
    State(state): State<AppState<P>>,
    Path(area): Path<String>,
) -> Json<Vec<DeviceView>>
where
    P: MessagePublisher + 'static,
{
    let views = state.api.registry().views();
    Json(display::devices_in_area(&views, &area))
}

/// `PUT /api/dashboard/group_display`
pub async fn set_group_display<P>(
    State(state): State<AppState<P>>,
    Json(req): Json<GroupDisplay>,
) -> Json<GroupDisplay>
where
    P: MessagePublisher + 'static,
{
    state.api.set_group_display(req.use_group_display);
    tracing::info!(enabled = req.use_group_display, "dashboard grouping changed");
    Json(GroupDisplay {
        use_group_display: state.api.use_group_display(),
    })
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::router::build;
    use crate::testing::{json, state};

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn should_group_by_type_by_default() {
        let app = build(state());

        let response = app.oneshot(get("/api/dashboard")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        let groups: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|group| group["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(groups, ["plug", "rgb_bulb", "camera"]);
    }

    #[tokio::test]
    async fn should_group_by_area_once_enabled() {
        let state = state();
        let app = build(state.clone());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/dashboard/group_display")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json!({"use_group_display": true}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(json(response).await, json!({"use_group_display": true}));
        assert!(state.api.use_group_display());

        let body = json(app.oneshot(get("/api/dashboard")).await.unwrap()).await;
        assert_eq!(body[0]["type"], "entrance");
        assert_eq!(body[1]["name"], "Kitchen");
        assert_eq!(body[2]["icon"], "mdi:grouped");
    }

    #[tokio::test]
    async fn should_filter_by_device_type() {
        let app = build(state());

        let body = json(app.oneshot(get("/api/dashboard/types/plug")).await.unwrap()).await;

        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["device_id"], "plug");
    }

    #[tokio::test]
    async fn should_reject_unknown_device_type() {
        let app = build(state());

        let response = app.oneshot(get("/api/dashboard/types/toaster")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"]["kind"], "invalid_argument");
    }

    #[tokio::test]
    async fn should_filter_by_area() {
        let app = build(state());

        let body = json(app.oneshot(get("/api/dashboard/areas/kitchen")).await.unwrap()).await;

        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["name"], "Kettle");
    }
}
