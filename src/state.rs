//! Shared application state for all routes.

use crate::config::{Catalog, TableDescriptor};
use crate::error::AppError;
use crate::service::{Adapter, TableService};
use crate::session::{Session, SessionRegistry};
use crate::store::RemoteStore;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub adapter: Adapter,
    pub catalog: Arc<Catalog>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(store: Arc<dyn RemoteStore>, catalog: Catalog) -> Self {
        AppState {
            adapter: Adapter::new(store),
            catalog: Arc::new(catalog),
            sessions: Arc::new(SessionRegistry::new()),
        }
    }

    /// Replaces the session registry with one bounded by `capacity` and `idle`.
    pub fn with_session_limits(mut self, capacity: usize, idle: Duration) -> Self {
        self.sessions = Arc::new(SessionRegistry::with_limits(capacity, idle));
        self
    }

    pub fn session(&self, id: &str) -> Arc<Session> {
        self.sessions.get_or_create(id)
    }

    /// Descriptor for a table named in a request path.
    pub fn descriptor(&self, table: &str) -> Result<&TableDescriptor, AppError> {
        self.catalog
            .table(table)
            .ok_or_else(|| AppError::NotFound(format!("table {}", table)))
    }

    pub fn table<'a>(&'a self, descriptor: &'a TableDescriptor) -> TableService<'a> {
        TableService::new(&self.adapter, descriptor)
    }
}
