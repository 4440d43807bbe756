//! Hospital admin: HTML dashboard over a hospital-management database with descriptor-driven
//! table CRUD, SQL reference pages and transaction demos.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod render;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod session;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

pub use config::Catalog;
pub use error::{AppError, ConfigError, StoreError};
pub use routes::{admin_routes, common_routes};
pub use settings::{Settings, StoreKind};
pub use state::AppState;
pub use store::{ensure_database_exists, MemoryStore, PgStore, RemoteStore};

use axum::Router;
use sqlx::Executor;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

/// All routes with the request body limit applied.
pub fn app(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .merge(common_routes(state.clone()))
        .merge(admin_routes(state))
        .layer(RequestBodyLimitLayer::new(body_limit))
}

/// Builds the store selected by `settings`. For Postgres: creates the database if missing,
/// opens the pool with `search_path` set to the configured schema on every connection, and
/// applies the schema when asked to.
pub async fn connect_store(settings: &Settings) -> Result<Arc<dyn RemoteStore>, AppError> {
    match settings.store {
        StoreKind::Memory => {
            tracing::info!("using in-memory store");
            Ok(Arc::new(MemoryStore::hospital()))
        }
        StoreKind::Postgres => {
            ensure_database_exists(&settings.database_url).await?;
            let search_path = schema::search_path_sql(&settings.db_schema);
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(settings.max_connections)
                .after_connect(move |conn, _meta| {
                    let sql = search_path.clone();
                    Box::pin(async move {
                        conn.execute(sql.as_str()).await?;
                        Ok(())
                    })
                })
                .connect(&settings.database_url)
                .await?;
            if settings.apply_schema {
                schema::apply_schema(&pool, &settings.db_schema).await?;
            }
            Ok(Arc::new(PgStore::new(pool, settings.db_schema.clone())))
        }
    }
}
