// Application state module
// Everything a request needs, built once at startup and shared read-only

use std::sync::Arc;

use super::types::Config;
use crate::cloud::CloudRegistry;
use crate::routing::RouteTable;
use crate::store::ObjectStore;

/// Application state
///
/// Immutable after construction; shared between connections by `Arc`.
pub struct AppState {
    pub config: Config,
    /// Functions and triggers registered at startup
    pub registry: Arc<CloudRegistry>,
    /// Custom routes, evaluated after the data API
    pub routes: RouteTable,
    /// External data store the trigger pipeline writes through
    pub store: Arc<dyn ObjectStore>,
    /// Cached config values for fast access
    pub access_log: bool,
}

impl AppState {
    pub fn new(
        config: Config,
        registry: Arc<CloudRegistry>,
        routes: RouteTable,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        let access_log = config.logging.access_log;
        Self {
            config,
            registry,
            routes,
            store,
            access_log,
        }
    }
}
