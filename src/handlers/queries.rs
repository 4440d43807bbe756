use crate::error::AppError;
use crate::handlers::today;
use crate::render::renderer;
use crate::response;
use crate::service::run_query;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::Response,
};

/// POST /queries/:index/run: Result table, or the store's message in its place.
pub async fn run(State(state): State<AppState>, Path(index): Path<usize>) -> Result<Response, AppError> {
    match run_query(&state.adapter, index, today()).await {
        Ok((query, result)) => {
            tracing::debug!(query = %query.name, rows = result.total, "canned query ran");
            Ok(response::ok(&[&renderer().query_result(Ok(&result))?]))
        }
        Err(e @ AppError::NotFound(_)) => Err(e),
        Err(e) => {
            tracing::warn!(index, error = %e, "canned query failed");
            let html = renderer().query_result(Err(&e.to_string()))?;
            Ok(response::fragment(e.status(), &[&html]))
        }
    }
}
