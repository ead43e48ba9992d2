//! Shared application state for axum handlers.

use std::sync::Arc;

use commoniot_app::event_bus::InProcessBus;
use commoniot_app::ports::MessagePublisher;
use commoniot_app::services::BusApi;

/// Application state shared across all axum handlers.
///
/// Generic over the registry's publisher to avoid dynamic dispatch.
/// `Clone` is implemented manually so `P` itself does not need to be `Clone`.
pub struct AppState<P> {
    /// Request handler over the device registry.
    pub api: Arc<BusApi<P>>,
    /// Bus whose traffic is streamed to SSE clients.
    pub bus: InProcessBus,
}

impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            bus: self.bus.clone(),
        }
    }
}

impl<P> AppState<P>
where
    P: MessagePublisher + 'static,
{
    pub fn new(api: Arc<BusApi<P>>, bus: InProcessBus) -> Self {
        Self { api, bus }
    }
}
