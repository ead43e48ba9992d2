//! JSON API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod bus;
#[allow(clippy::missing_errors_doc)]
pub mod dashboard;
#[allow(clippy::missing_errors_doc)]
pub mod devices;
pub mod events;

use axum::Router;
use axum::routing::{get, post, put};

use commoniot_app::ports::MessagePublisher;

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<P>() -> Router<AppState<P>>
where
    P: MessagePublisher + 'static,
{
    Router::new()
        .route("/bus", post(bus::request::<P>))
        // Devices
        .route("/devices", get(devices::list::<P>))
        .route("/devices/{device}", get(devices::get::<P>))
        .route("/devices/{device}/call", post(devices::call::<P>))
        .route("/devices/{device}/picture", get(devices::picture::<P>))
        // Dashboard
        .route("/dashboard", get(dashboard::groups::<P>))
        .route("/dashboard/types/{device_type}", get(dashboard::by_type::<P>))
        .route("/dashboard/areas/{area}", get(dashboard::by_area::<P>))
        .route("/dashboard/group_display", put(dashboard::set_group_display::<P>))
        // Notifications
        .route("/events", get(events::stream::<P>))
}
