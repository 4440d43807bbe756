//! The transaction demonstrations. Each runs its steps as separate store calls in
//! sequence: a failing step leaves the earlier steps' rows in place.

use crate::error::AppError;
use crate::service::Adapter;
use crate::store::Row;
use chrono::NaiveDate;
use serde_json::{json, Value};

#[derive(Clone, Copy, Debug)]
pub struct AppointmentFlow {
    pub patient_id: i64,
    pub doctor_id: i64,
    pub medicine_id: i64,
}

impl Default for AppointmentFlow {
    fn default() -> Self {
        AppointmentFlow {
            patient_id: 1,
            doctor_id: 1,
            medicine_id: 1,
        }
    }
}

/// Which step of the appointment flow failed, and why.
#[derive(Debug)]
pub struct StepFailed {
    pub step: &'static str,
    pub error: AppError,
}

#[derive(Debug)]
pub enum RollbackOutcome {
    /// The store refused the write; nothing was created.
    Rejected(String),
    /// The store accepted a row it should have refused.
    UnexpectedSuccess(Value),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Restocked {
    pub medicine_name: String,
    pub before: i64,
    pub after: i64,
    pub added: i64,
}

fn fields(v: Value) -> Row {
    match v {
        Value::Object(m) => m,
        _ => Row::new(),
    }
}

fn day(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Appointment (completed, 10:00) then prescription then bill. Returns the new
/// appointment id.
pub async fn appointment_flow(adapter: &Adapter, input: AppointmentFlow, today: NaiveDate) -> Result<Value, StepFailed> {
    let appointment = adapter
        .create(
            "appointments",
            &fields(json!({
                "date": day(today),
                "timeslot": "10:00",
                "status": "completed",
                "patient_id": input.patient_id,
                "doctor_id": input.doctor_id,
            })),
        )
        .await
        .map_err(|error| StepFailed { step: "appointment", error })?;
    let appointment_id = appointment.get("appointment_id").cloned().unwrap_or(Value::Null);

    adapter
        .create(
            "prescriptions",
            &fields(json!({
                "appointment_id": appointment_id,
                "medicine_id": input.medicine_id,
                "dosage": "500mg twice daily",
                "duration": "7 days",
            })),
        )
        .await
        .map_err(|error| StepFailed { step: "prescription", error })?;

    adapter
        .create(
            "bills",
            &fields(json!({
                "appointment_id": appointment_id,
                "consultant_charge": 1000,
                "medicine_charge": 250,
                "bill_date": day(today),
            })),
        )
        .await
        .map_err(|error| StepFailed { step: "bill", error })?;

    tracing::info!(appointment_id = %appointment_id, "appointment flow committed");
    Ok(appointment_id)
}

/// Books an appointment for patient 9999, which the foreign key should refuse.
pub async fn rollback(adapter: &Adapter, today: NaiveDate) -> RollbackOutcome {
    let result = adapter
        .create(
            "appointments",
            &fields(json!({
                "date": day(today),
                "timeslot": "12:00",
                "status": "scheduled",
                "patient_id": 9999,
                "doctor_id": 1,
            })),
        )
        .await;
    match result {
        Ok(row) => {
            tracing::warn!("rollback demo write was accepted");
            RollbackOutcome::UnexpectedSuccess(row.get("appointment_id").cloned().unwrap_or(Value::Null))
        }
        Err(AppError::ConstraintViolation(msg)) => RollbackOutcome::Rejected(msg),
        Err(other) => RollbackOutcome::Rejected(other.to_string()),
    }
}

/// Reads the current stock, writes stock + `quantity`, and reports both.
pub async fn restock(adapter: &Adapter, medicine_id: i64, quantity: i64) -> Result<Restocked, AppError> {
    let id = Value::from(medicine_id);
    let before = adapter.get_by_id("medicines", &id, "medicine_id").await?;
    let medicine_name = before
        .get("medicine_name")
        .and_then(Value::as_str)
        .unwrap_or("-")
        .to_string();
    let current = before.get("stock_quantity").and_then(Value::as_i64).unwrap_or(0);
    let target = current
        .checked_add(quantity)
        .filter(|n| i32::try_from(*n).is_ok())
        .ok_or_else(|| AppError::Validation(format!("stock of {} cannot grow by {}", medicine_name, quantity)))?;
    let after = adapter
        .update(
            "medicines",
            &id,
            "medicine_id",
            &fields(json!({ "stock_quantity": target })),
        )
        .await?;
    let after = after.get("stock_quantity").and_then(Value::as_i64).unwrap_or(current);
    Ok(Restocked {
        medicine_name,
        before: current,
        after,
        added: quantity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::dashboard::tests::seed;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    async fn adapter() -> Adapter {
        let store = MemoryStore::hospital();
        seed(&store).await;
        Adapter::new(Arc::new(store))
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 2).unwrap()
    }

    #[tokio::test]
    async fn appointment_flow_creates_all_three_rows() {
        let a = adapter().await;
        let id = appointment_flow(&a, AppointmentFlow::default(), today()).await.unwrap();
        assert_eq!(id, json!(2));
        let bill = a.get_by_id("bills", &json!(2), "bill_id").await.unwrap();
        assert_eq!(bill["appointment_id"], json!(2));
        assert_eq!(bill["total_amount"].as_f64(), Some(1250.0));
        let med = a.get_by_id("medicines", &json!(1), "medicine_id").await.unwrap();
        assert_eq!(med["stock_quantity"], json!(3));
    }

    #[tokio::test]
    async fn failing_step_keeps_earlier_rows() {
        let a = adapter().await;
        let input = AppointmentFlow {
            medicine_id: 77,
            ..AppointmentFlow::default()
        };
        let failed = appointment_flow(&a, input, today()).await.unwrap_err();
        assert_eq!(failed.step, "prescription");
        assert!(matches!(failed.error, AppError::ConstraintViolation(_)));
        assert_eq!(a.count("appointments").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn rollback_demo_is_refused() {
        let a = adapter().await;
        match rollback(&a, today()).await {
            RollbackOutcome::Rejected(msg) => assert!(msg.contains("foreign key")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(a.count("appointments").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn restock_reports_before_and_after() {
        let a = adapter().await;
        let r = restock(&a, 1, 50).await.unwrap();
        assert_eq!(
            r,
            Restocked {
                medicine_name: "Amoxicillin".into(),
                before: 4,
                after: 54,
                added: 50
            }
        );
        assert!(matches!(restock(&a, 99, 5).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn restock_past_the_column_range_is_refused_without_a_write() {
        let a = adapter().await;
        assert!(matches!(restock(&a, 1, i64::MAX).await, Err(AppError::Validation(_))));
        assert!(matches!(restock(&a, 1, i64::from(i32::MAX)).await, Err(AppError::Validation(_))));
        let row = a.get_by_id("medicines", &json!(1), "medicine_id").await.unwrap();
        assert_eq!(row["stock_quantity"], json!(4));
    }
}
