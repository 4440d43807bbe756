//! Add, edit and delete for any catalog table.
//!
//! Form posts target `#content`. A successful write answers with the reloaded list, a
//! modal-close swap and a success toast; a rejected write re-renders the form inside the
//! modal with the error, so the user's input survives.

use crate::config::TableDescriptor;
use crate::error::AppError;
use crate::extractors::SessionId;
use crate::handlers::pages;
use crate::render::{renderer, FormTarget, NoticeKind, CLOSE_MODAL};
use crate::response;
use crate::service::FormValidator;
use crate::session::{MutationKey, Page, Session};
use crate::state::AppState;
use crate::store::Row;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, Response},
    Form,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

const MODAL: &str = "#modal";

type Fields = HashMap<String, String>;

fn submitted(form: &Fields) -> Row {
    form.iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect()
}

/// Refused duplicate submission: only the warning toast is applied.
fn conflict(e: AppError) -> Result<Response, AppError> {
    let notice = renderer().notice(NoticeKind::Warning, &e.to_string())?;
    Ok(response::out_of_band(e.status(), &[&notice]))
}

/// Reloads the table page after a write and appends the modal close and a toast.
async fn reload(
    state: &AppState,
    session: &Session,
    descriptor: &TableDescriptor,
    message: &str,
) -> Result<Response, AppError> {
    let notice = renderer().notice(NoticeKind::Success, message)?;
    match pages::load(state, session, Page::Table(descriptor.page.clone())).await {
        Some(Ok(list)) => Ok(response::ok(&[&list, CLOSE_MODAL, &notice])),
        Some(Err(e)) => {
            let block = crate::render::error_fragment(e.code(), &e.to_string());
            Ok(response::fragment(e.status(), &[&block, CLOSE_MODAL, &notice]))
        }
        None => Ok(response::out_of_band(StatusCode::OK, &[CLOSE_MODAL, &notice])),
    }
}

/// Form re-rendered in the modal with `error`; status from the error.
fn rejected_form(
    descriptor: &TableDescriptor,
    target: FormTarget<'_>,
    form: &Fields,
    error: &AppError,
) -> Result<Response, AppError> {
    let message = error.to_string();
    let html = renderer().form(descriptor, target, Some(&submitted(form)), Some(&message))?;
    let notice = renderer().notice(NoticeKind::Error, &message)?;
    Ok(response::retarget(error.status(), MODAL, &[&html, &notice]))
}

fn session_for(state: &AppState, id: &SessionId) -> Arc<Session> {
    state.session(id.or_default())
}

/// GET /tables/:table/new
pub async fn new_form(State(state): State<AppState>, Path(table): Path<String>) -> Result<Html<String>, AppError> {
    let descriptor = state.descriptor(&table)?;
    Ok(Html(renderer().form(descriptor, FormTarget::Create, None, None)?))
}

/// POST /tables/:table
pub async fn create(
    State(state): State<AppState>,
    session_id: SessionId,
    Path(table): Path<String>,
    Form(form): Form<Fields>,
) -> Result<Response, AppError> {
    let descriptor = state.descriptor(&table)?;
    let session = session_for(&state, &session_id);
    let guard = match session.begin_mutation(MutationKey::new(&table, "create", None)) {
        Ok(g) => g,
        Err(e) => return conflict(e),
    };
    let result = match FormValidator::parse_create(descriptor, &form) {
        Ok(values) => state.table(descriptor).create(&values).await,
        Err(e) => Err(e),
    };
    drop(guard);
    match result {
        Ok(row) => {
            tracing::info!(table = %table, id = ?row.get(&descriptor.primary_key), "record created");
            reload(&state, &session, descriptor, "Record added successfully!").await
        }
        Err(e) => {
            tracing::warn!(table = %table, error = %e, "create rejected");
            rejected_form(descriptor, FormTarget::Create, &form, &e)
        }
    }
}

/// GET /tables/:table/:id/edit: Form pre-filled with the current row.
pub async fn edit_form(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> Result<Html<String>, AppError> {
    let descriptor = state.descriptor(&table)?;
    let row = state.table(descriptor).get(&id).await?;
    Ok(Html(renderer().form(descriptor, FormTarget::Edit { id: &id }, Some(&row), None)?))
}

/// POST /tables/:table/:id: Blank fields keep their stored value.
pub async fn update(
    State(state): State<AppState>,
    session_id: SessionId,
    Path((table, id)): Path<(String, String)>,
    Form(form): Form<Fields>,
) -> Result<Response, AppError> {
    let descriptor = state.descriptor(&table)?;
    let session = session_for(&state, &session_id);
    let guard = match session.begin_mutation(MutationKey::new(&table, "update", Some(&id))) {
        Ok(g) => g,
        Err(e) => return conflict(e),
    };
    let result = match FormValidator::parse_update(descriptor, &form) {
        Ok(values) => state.table(descriptor).update(&id, &values).await,
        Err(e) => Err(e),
    };
    drop(guard);
    match result {
        Ok(_) => {
            tracing::info!(table = %table, id = %id, "record updated");
            reload(&state, &session, descriptor, "Record updated successfully!").await
        }
        Err(e) => {
            tracing::warn!(table = %table, id = %id, error = %e, "update rejected");
            rejected_form(descriptor, FormTarget::Edit { id: &id }, &form, &e)
        }
    }
}

/// GET /tables/:table/:id/delete: Confirmation dialog.
pub async fn confirm_delete(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> Result<Html<String>, AppError> {
    let descriptor = state.descriptor(&table)?;
    Ok(Html(renderer().confirm_delete(descriptor, &id)?))
}

/// POST /tables/:table/:id/delete: Requires `confirm=yes`. A refused delete keeps the
/// list on screen with the store's message above it.
pub async fn delete(
    State(state): State<AppState>,
    session_id: SessionId,
    Path((table, id)): Path<(String, String)>,
    Form(form): Form<Fields>,
) -> Result<Response, AppError> {
    let descriptor = state.descriptor(&table)?;
    if form.get("confirm").map(String::as_str) != Some("yes") {
        return Err(AppError::BadRequest("delete was not confirmed".into()));
    }
    let session = session_for(&state, &session_id);
    let guard = match session.begin_mutation(MutationKey::new(&table, "delete", Some(&id))) {
        Ok(g) => g,
        Err(e) => return conflict(e),
    };
    let service = state.table(descriptor);
    let result = service.delete(&id).await;
    drop(guard);
    match result {
        Ok(()) => {
            tracing::info!(table = %table, id = %id, "record deleted");
            reload(&state, &session, descriptor, "Record deleted successfully!").await
        }
        Err(e) => {
            tracing::warn!(table = %table, id = %id, error = %e, "delete rejected");
            let message = e.to_string();
            let notice = renderer().notice(NoticeKind::Error, &message)?;
            let body = match service.list().await {
                Ok(rows) => renderer().list(descriptor, &rows, Some((NoticeKind::Error, &message)))?,
                Err(list_err) => crate::render::error_fragment(list_err.code(), &list_err.to_string()),
            };
            Ok(response::fragment(e.status(), &[&body, CLOSE_MODAL, &notice]))
        }
    }
}
