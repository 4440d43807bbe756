//! Uniform data-access operations over a [`RemoteStore`], with error classification.

use crate::error::AppError;
use crate::sql::is_identifier;
use crate::store::{ListOptions, RemoteStore, Row};
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone)]
pub struct Adapter {
    store: Arc<dyn RemoteStore>,
}

fn check_identifier(kind: &str, name: &str) -> Result<(), AppError> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("invalid {} name: {:?}", kind, name)))
    }
}

fn check_fields(fields: &Row) -> Result<(), AppError> {
    fields.keys().try_for_each(|k| check_identifier("column", k))
}

/// Drops empty-string and null values so they never reach the store.
pub fn strip_empty(fields: &Row) -> Row {
    fields
        .iter()
        .filter(|(_, v)| match v {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

impl Adapter {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Adapter { store }
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    pub async fn list_all(&self, table: &str, options: &ListOptions) -> Result<Vec<Row>, AppError> {
        check_identifier("table", table)?;
        for name in options.identifiers() {
            check_identifier("column", name)?;
        }
        self.store.select(table, options).await.map_err(AppError::from_read)
    }

    /// Exactly one row must match; zero or several is `NotFound`.
    pub async fn get_by_id(&self, table: &str, id: &Value, id_column: &str) -> Result<Row, AppError> {
        check_identifier("table", table)?;
        check_identifier("column", id_column)?;
        let mut rows = self
            .store
            .select_by_key(table, id_column, id)
            .await
            .map_err(AppError::from_read)?;
        match rows.len() {
            1 => Ok(rows.remove(0)),
            0 => Err(AppError::NotFound(format!("{} with {} = {}", table, id_column, id))),
            n => Err(AppError::NotFound(format!(
                "{} with {} = {} is not unique ({} rows)",
                table, id_column, id, n
            ))),
        }
    }

    pub async fn create(&self, table: &str, fields: &Row) -> Result<Row, AppError> {
        check_identifier("table", table)?;
        check_fields(fields)?;
        let row = self.store.insert(table, fields).await.map_err(AppError::from_write)?;
        tracing::info!(table = %table, "row created");
        Ok(row)
    }

    /// Partial update. Empty and null fields are stripped first; when nothing remains the
    /// current row is returned untouched.
    pub async fn update(&self, table: &str, id: &Value, id_column: &str, fields: &Row) -> Result<Row, AppError> {
        check_identifier("table", table)?;
        check_identifier("column", id_column)?;
        let fields = strip_empty(fields);
        check_fields(&fields)?;
        if fields.is_empty() {
            return self.get_by_id(table, id, id_column).await;
        }
        let mut rows = self
            .store
            .update(table, id_column, id, &fields)
            .await
            .map_err(AppError::from_write)?;
        if rows.is_empty() {
            return Err(AppError::NotFound(format!("{} with {} = {}", table, id_column, id)));
        }
        tracing::info!(table = %table, id = %id, fields = fields.len(), "row updated");
        Ok(rows.remove(0))
    }

    /// Deleting a row that does not exist is `NotFound`, never a silent success.
    pub async fn delete(&self, table: &str, id: &Value, id_column: &str) -> Result<(), AppError> {
        check_identifier("table", table)?;
        check_identifier("column", id_column)?;
        let removed = self
            .store
            .delete(table, id_column, id)
            .await
            .map_err(AppError::from_write)?;
        if removed == 0 {
            return Err(AppError::NotFound(format!("{} with {} = {}", table, id_column, id)));
        }
        tracing::info!(table = %table, id = %id, "row deleted");
        Ok(())
    }

    pub async fn count(&self, table: &str) -> Result<u64, AppError> {
        check_identifier("table", table)?;
        self.store.count(table).await.map_err(AppError::from_read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn adapter() -> Adapter {
        Adapter::new(Arc::new(MemoryStore::hospital()))
    }

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn strip_empty_drops_blank_and_null() {
        let stripped = strip_empty(&row(json!({"name": "", "age": null, "gender": "Male", "zero": 0})));
        assert_eq!(Value::Object(stripped), json!({"gender": "Male", "zero": 0}));
    }

    #[tokio::test]
    async fn create_then_get_round_trips_through_the_store() {
        let a = adapter();
        let created = a
            .create("departments", &row(json!({"department_name": "Oncology"})))
            .await
            .unwrap();
        let id = created["department_id"].clone();
        let fetched = a.get_by_id("departments", &id, "department_id").await.unwrap();
        assert_eq!(fetched["department_name"], json!("Oncology"));
        assert_eq!(a.count("departments").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_with_only_empty_fields_changes_nothing() {
        let a = adapter();
        a.create("patients", &row(json!({"name": "Ravi", "age": 40, "contact_no": "555"})))
            .await
            .unwrap();
        let unchanged = a
            .update("patients", &json!(1), "patient_id", &row(json!({"name": "", "age": null})))
            .await
            .unwrap();
        assert_eq!(unchanged["name"], json!("Ravi"));
        assert_eq!(unchanged["age"], json!(40));

        let changed = a
            .update("patients", &json!(1), "patient_id", &row(json!({"name": "", "age": 41})))
            .await
            .unwrap();
        assert_eq!(changed["name"], json!("Ravi"));
        assert_eq!(changed["age"], json!(41));
    }

    #[tokio::test]
    async fn missing_rows_are_not_found() {
        let a = adapter();
        assert!(matches!(
            a.delete("patients", &json!(42), "patient_id").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            a.get_by_id("patients", &json!(42), "patient_id").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            a.update("patients", &json!(42), "patient_id", &row(json!({"age": 3}))).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn failures_are_classified_by_operation() {
        let a = adapter();
        let err = a.list_all("wards", &ListOptions::default()).await.unwrap_err();
        assert!(matches!(err, AppError::RemoteQuery(_)));
        let err = a.create("patients", &row(json!({"name": "No Contact"}))).await.unwrap_err();
        assert!(matches!(err, AppError::ConstraintViolation(_)));
        let err = a.create("patients; drop", &Row::new()).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        let err = a
            .create("patients", &row(json!({"name) values": "x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
