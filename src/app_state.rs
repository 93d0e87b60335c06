//! Shared application state handed to every route handler.

use std::sync::Arc;

use crate::api;
use crate::auth::AuthGate;
use crate::config::GatewayConfig;
use crate::domain::EventBus;
use crate::routing::{CorsPolicy, RouteTable};
use crate::store::DocumentStore;

/// Cheap to clone; every field is shared.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Runtime configuration.
    pub config: Arc<GatewayConfig>,
    /// Document storage backend.
    pub store: Arc<dyn DocumentStore>,
    /// Credential verification.
    pub auth: AuthGate,
    /// In-process event bus feeding the event streams.
    pub event_bus: EventBus,
    /// The ordered route table consulted by the dispatcher.
    pub routes: Arc<RouteTable<Self>>,
    /// Cross-origin headers policy.
    pub cors: Arc<CorsPolicy>,
}

impl AppState {
    /// Assembles state with the gateway's standard route table.
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        store: Arc<dyn DocumentStore>,
        auth: AuthGate,
        event_bus: EventBus,
    ) -> Self {
        let cors = CorsPolicy::new(&config.cors_allowed_origins);
        Self {
            config: Arc::new(config),
            store,
            auth,
            event_bus,
            routes: Arc::new(api::route_table()),
            cors: Arc::new(cors),
        }
    }
}
