//! Form validation: typed parsing of submitted form text per field kind.

use crate::config::{FormField, InputKind, TableDescriptor};
use crate::error::AppError;
use crate::store::Row;
use chrono::{NaiveDate, NaiveTime};
use serde_json::{Number, Value};
use std::collections::HashMap;

pub struct FormValidator;

impl FormValidator {
    /// Parse a create form. Required fields must be present and non-empty; blank optional
    /// fields take the field default or are omitted so the store default applies.
    pub fn parse_create(descriptor: &TableDescriptor, form: &HashMap<String, String>) -> Result<Row, AppError> {
        let mut row = Row::new();
        for field in &descriptor.form {
            match submitted(form, field) {
                Some(raw) => {
                    row.insert(field.name.clone(), parse_field(field, raw)?);
                }
                None if field.required => {
                    return Err(AppError::Validation(format!("{} is required", field.label)));
                }
                None => {
                    if let Some(default) = &field.default {
                        row.insert(field.name.clone(), parse_field(field, default)?);
                    }
                }
            }
        }
        Ok(row)
    }

    /// Parse an edit form. Blank fields are left out so the stored value stays as it is.
    pub fn parse_update(descriptor: &TableDescriptor, form: &HashMap<String, String>) -> Result<Row, AppError> {
        let mut row = Row::new();
        for field in &descriptor.form {
            if let Some(raw) = submitted(form, field) {
                row.insert(field.name.clone(), parse_field(field, raw)?);
            }
        }
        Ok(row)
    }
}

fn submitted<'f>(form: &'f HashMap<String, String>, field: &FormField) -> Option<&'f str> {
    form.get(&field.name).map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn parse_field(field: &FormField, raw: &str) -> Result<Value, AppError> {
    let invalid = |what: &str| AppError::Validation(format!("{} must be {}, got {:?}", field.label, what, raw));
    match &field.kind {
        InputKind::Text | InputKind::TextArea => Ok(Value::String(raw.to_string())),
        InputKind::Integer => raw.parse::<i32>().map(Value::from).map_err(|_| invalid("a whole number")),
        InputKind::Decimal => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| invalid("a number")),
        InputKind::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .map_err(|_| invalid("a date (YYYY-MM-DD)")),
        InputKind::Time => NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .map(|t| Value::String(t.format("%H:%M").to_string()))
            .map_err(|_| invalid("a time (HH:MM)")),
        InputKind::Select(options) => {
            if options.iter().any(|o| o.value == raw) {
                Ok(Value::String(raw.to_string()))
            } else {
                let allowed: Vec<&str> = options.iter().map(|o| o.value.as_str()).collect();
                Err(AppError::Validation(format!(
                    "{} must be one of: {}",
                    field.label,
                    allowed.join(", ")
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Catalog;
    use serde_json::json;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn create_parses_each_kind_and_applies_defaults() {
        let catalog = Catalog::hospital().unwrap();
        let appointments = catalog.table("appointments").unwrap();
        let row = FormValidator::parse_create(
            appointments,
            &form(&[
                ("patient_id", " 3 "),
                ("doctor_id", "1"),
                ("date", "2024-07-15"),
                ("timeslot", "14:30"),
                ("diagnosis", ""),
                ("unrelated", "ignored"),
            ]),
        )
        .unwrap();
        assert_eq!(row["patient_id"], json!(3));
        assert_eq!(row["timeslot"], json!("14:30"));
        assert_eq!(row["status"], json!("scheduled"));
        assert!(!row.contains_key("diagnosis"));
        assert!(!row.contains_key("unrelated"));
    }

    #[test]
    fn required_fields_only_on_create() {
        let catalog = Catalog::hospital().unwrap();
        let patients = catalog.table("patients").unwrap();
        let err = FormValidator::parse_create(patients, &form(&[("name", "Asha"), ("age", "30")])).unwrap_err();
        assert_eq!(err.to_string(), "validation: Contact is required");

        let row = FormValidator::parse_update(patients, &form(&[("name", ""), ("age", "31")])).unwrap();
        assert_eq!(Value::Object(row), json!({"age": 31}));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let catalog = Catalog::hospital().unwrap();
        let medicines = catalog.table("medicines").unwrap();
        assert!(FormValidator::parse_update(medicines, &form(&[("stock_quantity", "ten")])).is_err());
        assert!(FormValidator::parse_update(medicines, &form(&[("stock_quantity", "3000000000")])).is_err());
        assert!(FormValidator::parse_update(medicines, &form(&[("price_per_unit", "NaN")])).is_err());
        let row = FormValidator::parse_update(medicines, &form(&[("price_per_unit", "12.50")])).unwrap();
        assert_eq!(row["price_per_unit"].as_f64(), Some(12.5));

        let appointments = catalog.table("appointments").unwrap();
        assert!(FormValidator::parse_update(appointments, &form(&[("status", "pending")])).is_err());
        assert!(FormValidator::parse_update(appointments, &form(&[("date", "15/07/2024")])).is_err());
        assert!(FormValidator::parse_update(appointments, &form(&[("timeslot", "25:00")])).is_err());
    }
}
