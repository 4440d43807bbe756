//! Transaction demo endpoints. Each answers with a result panel for its card plus a toast.

use crate::error::AppError;
use crate::extractors::SessionId;
use crate::handlers::today;
use crate::render::{renderer, NoticeKind};
use crate::response;
use crate::service::demos::{self, AppointmentFlow, RollbackOutcome};
use crate::session::MutationKey;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::Response, Form};
use std::collections::HashMap;

type Fields = HashMap<String, String>;

/// Integer form field within the `integer` column range; blank or absent falls back to `default`.
fn int_field(form: &Fields, name: &str, default: i64) -> Result<i64, AppError> {
    match form.get(name).map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<i32>()
            .map(i64::from)
            .map_err(|_| AppError::BadRequest(format!("{} must be a whole number", name))),
    }
}

fn panel(
    status: StatusCode,
    kind: NoticeKind,
    title: &str,
    lines: &[String],
    toast: &str,
) -> Result<Response, AppError> {
    let r = renderer();
    let body = r.demo_result(kind, title, lines)?;
    let notice = r.notice(kind, toast)?;
    Ok(response::fragment(status, &[&body, &notice]))
}

/// POST /demos/appointment-flow
pub async fn appointment_flow(
    State(state): State<AppState>,
    session_id: SessionId,
    Form(form): Form<Fields>,
) -> Result<Response, AppError> {
    let defaults = AppointmentFlow::default();
    let input = AppointmentFlow {
        patient_id: int_field(&form, "patient_id", defaults.patient_id)?,
        doctor_id: int_field(&form, "doctor_id", defaults.doctor_id)?,
        medicine_id: int_field(&form, "medicine_id", defaults.medicine_id)?,
    };
    let session = state.session(session_id.or_default());
    let _guard = session.begin_mutation(MutationKey::new("appointments", "appointment flow", None))?;
    match demos::appointment_flow(&state.adapter, input, today()).await {
        Ok(appointment_id) => panel(
            StatusCode::OK,
            NoticeKind::Success,
            "Transaction Committed Successfully!",
            &[format!(
                "Created: Appointment #{}, Prescription, and Bill",
                crate::render::value_text(&appointment_id).unwrap_or_default()
            )],
            "Transaction completed!",
        ),
        Err(failed) => {
            tracing::warn!(step = failed.step, error = %failed.error, "appointment flow failed");
            let mut lines = vec![
                format!("Failed at step: {}", failed.step),
                format!("Error: {}", failed.error),
            ];
            if failed.step != "appointment" {
                lines.push("Rows written by earlier steps were kept.".to_string());
            }
            panel(
                failed.error.status(),
                NoticeKind::Error,
                "Transaction Failed!",
                &lines,
                "Transaction failed",
            )
        }
    }
}

/// POST /demos/rollback
pub async fn rollback(State(state): State<AppState>) -> Result<Response, AppError> {
    match demos::rollback(&state.adapter, today()).await {
        RollbackOutcome::Rejected(message) => panel(
            StatusCode::OK,
            NoticeKind::Warning,
            "Transaction Rolled Back!",
            &[
                format!("Error: {}", message),
                "No appointment was created for patient 9999.".to_string(),
            ],
            "Rollback demonstrated!",
        ),
        RollbackOutcome::UnexpectedSuccess(id) => panel(
            StatusCode::OK,
            NoticeKind::Info,
            "Unexpected Success",
            &[format!(
                "The store accepted appointment #{}.",
                crate::render::value_text(&id).unwrap_or_default()
            )],
            "Write was not rejected",
        ),
    }
}

/// POST /demos/restock
pub async fn restock(
    State(state): State<AppState>,
    session_id: SessionId,
    Form(form): Form<Fields>,
) -> Result<Response, AppError> {
    let medicine_id = int_field(&form, "medicine_id", 1)?;
    let quantity = int_field(&form, "quantity", 50)?;
    let session = state.session(session_id.or_default());
    let id = medicine_id.to_string();
    let _guard = session.begin_mutation(MutationKey::new("medicines", "restock", Some(&id)))?;
    match demos::restock(&state.adapter, medicine_id, quantity).await {
        Ok(r) => panel(
            StatusCode::OK,
            NoticeKind::Success,
            "Stock Updated!",
            &[format!("{}: {} → {} (+{})", r.medicine_name, r.before, r.after, r.added)],
            "Stock updated!",
        ),
        Err(e) => {
            tracing::warn!(medicine_id, error = %e, "restock failed");
            panel(
                e.status(),
                NoticeKind::Error,
                "Update Failed!",
                &[format!("Error: {}", e)],
                "Restock failed",
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_fields_default_when_blank() {
        let mut form = Fields::new();
        form.insert("patient_id".into(), " ".into());
        form.insert("doctor_id".into(), "7".into());
        form.insert("medicine_id".into(), "x".into());
        assert_eq!(int_field(&form, "patient_id", 1).unwrap(), 1);
        assert_eq!(int_field(&form, "doctor_id", 1).unwrap(), 7);
        assert!(matches!(int_field(&form, "medicine_id", 1), Err(AppError::BadRequest(_))));
        assert_eq!(int_field(&form, "quantity", 50).unwrap(), 50);
        form.insert("quantity".into(), "9223372036854775807".into());
        assert!(matches!(int_field(&form, "quantity", 50), Err(AppError::BadRequest(_))));
    }
}
