//! Shell and page navigation.

use crate::error::AppError;
use crate::extractors::{SessionId, ThemeCookie};
use crate::handlers::today;
use crate::render::renderer;
use crate::response;
use crate::service::{canned_queries, load_dashboard};
use crate::session::{Page, Session};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::{Html, Response},
};

/// Content fragment for `page`.
pub(crate) async fn render_page(state: &AppState, page: &Page) -> Result<String, AppError> {
    let r = renderer();
    match page {
        Page::Dashboard => {
            let data = load_dashboard(&state.adapter, &state.catalog, today()).await;
            r.dashboard(&state.catalog, &data)
        }
        Page::Table(slug) => {
            let descriptor = state
                .catalog
                .table_for_page(slug)
                .ok_or_else(|| AppError::NotFound(format!("page {}", slug)))?;
            let rows = state.table(descriptor).list().await?;
            r.list(descriptor, &rows, None)
        }
        Page::Queries => r.queries_page(&canned_queries(today())),
        Page::Triggers => r.triggers_page(),
        Page::Transactions => r.transactions_page(),
    }
}

/// Loads `page` under a fresh ticket. `None` when a newer load superseded this one.
pub(crate) async fn load(state: &AppState, session: &Session, page: Page) -> Option<Result<String, AppError>> {
    let ticket = session.begin_load(page.clone());
    let result = render_page(state, &page).await;
    let outcome = result.as_ref().map(|_| ()).map_err(|e| e.to_string());
    if !session.finish_load(ticket, outcome) {
        tracing::warn!(session = %session.id(), page = %page, "discarding stale page load");
        return None;
    }
    Some(result)
}

/// GET /: Full page with the dashboard. Issues a session id when the request carries none.
pub async fn shell(
    State(state): State<AppState>,
    SessionId(id): SessionId,
    ThemeCookie(theme): ThemeCookie,
) -> Result<Html<String>, AppError> {
    let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let session = state.session(&id);
    let page = Page::Dashboard;
    let content = match load(&state, &session, page.clone()).await {
        Some(Ok(html)) => html,
        Some(Err(e)) => crate::render::error_fragment(e.code(), &e.to_string()),
        None => String::new(),
    };
    let html = renderer().shell(&state.catalog, &page, theme, &id, &content)?;
    Ok(Html(html))
}

/// GET /pages/:page: Page content plus the sidebar with the new active item.
pub async fn page(
    State(state): State<AppState>,
    session_id: SessionId,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let page = Page::parse(&slug, &state.catalog).ok_or_else(|| AppError::NotFound(format!("page {}", slug)))?;
    let session = state.session(session_id.or_default());
    let Some(result) = load(&state, &session, page.clone()).await else {
        return Ok(response::stale());
    };
    let content = result?;
    let nav = renderer().nav(&state.catalog, &page, true)?;
    Ok(response::ok(&[&content, &nav]))
}
