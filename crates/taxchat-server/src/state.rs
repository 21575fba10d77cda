use std::sync::Arc;
use taxchat::router::ModelRouter;

/// Shared application state
///
/// Requests share nothing mutable; the router only holds provider clients.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ModelRouter>,
}

impl AppState {
    pub fn new(router: ModelRouter) -> Self {
        Self {
            router: Arc::new(router),
        }
    }
}
