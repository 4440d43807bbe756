//! Dashboard routes: shell, page fragments, record CRUD, canned queries, demos, theme.

use crate::handlers::{demos, pages, queries, records, theme};
use crate::state::AppState;
use axum::{routing::get, routing::post, Router};

pub fn admin_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::shell))
        .route("/pages/:page", get(pages::page))
        .route("/tables/:table", post(records::create))
        .route("/tables/:table/new", get(records::new_form))
        .route("/tables/:table/:id", post(records::update))
        .route("/tables/:table/:id/edit", get(records::edit_form))
        .route(
            "/tables/:table/:id/delete",
            get(records::confirm_delete).post(records::delete),
        )
        .route("/queries/:index/run", post(queries::run))
        .route("/demos/appointment-flow", post(demos::appointment_flow))
        .route("/demos/rollback", post(demos::rollback))
        .route("/demos/restock", post(demos::restock))
        .route("/theme", post(theme::toggle))
        .with_state(state)
}
