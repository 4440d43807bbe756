//! Canned sample queries and their tabular results.

use crate::config::LOW_STOCK_THRESHOLD;
use crate::error::AppError;
use crate::service::Adapter;
use crate::store::{Expansion, Filter, ListOptions, Row, Selection};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

/// Rows shown per result; the rest are counted but not rendered.
pub const RESULT_ROWS: usize = 10;

#[derive(Clone, Debug)]
pub struct CannedQuery {
    pub name: String,
    pub description: &'static str,
    pub table: &'static str,
    pub options: ListOptions,
}

impl CannedQuery {
    /// Display form, e.g. `SELECT *, patients(name) FROM appointments LIMIT 5;`.
    pub fn sql(&self) -> String {
        let limit = self.options.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
        format!("SELECT {} FROM {}{};", self.options.selection, self.table, limit)
    }
}

fn rel(table: &str, key: &str, columns: &[&str]) -> Expansion {
    Expansion::new(table, key, key, columns)
}

fn query(n: usize, name: &str, description: &'static str, table: &'static str, options: ListOptions) -> CannedQuery {
    CannedQuery {
        name: format!("{}. {}", n, name),
        description,
        table,
        options,
    }
}

fn with(selection: Selection) -> ListOptions {
    ListOptions {
        selection,
        ..ListOptions::default()
    }
}

/// The fifteen sample queries. `today` feeds the date filter of "Today's Appointments".
pub fn canned_queries(today: NaiveDate) -> Vec<CannedQuery> {
    let patient = || rel("patients", "patient_id", &["name"]);
    let doctor = || rel("doctors", "doctor_id", &["doctor_name"]);
    let department = || rel("departments", "department_id", &["department_name"]);
    let medicine = || rel("medicines", "medicine_id", &["medicine_name"]);
    let with_people = || Selection::all().expand(patient()).expand(doctor());

    let todays = ListOptions {
        filters: vec![Filter::eq("date", today.format("%Y-%m-%d").to_string())],
        ..with(with_people())
    };
    let low_stock = ListOptions {
        filters: vec![Filter::lt("stock_quantity", LOW_STOCK_THRESHOLD)],
        ..with(Selection::columns(&["medicine_name", "stock_quantity", "price_per_unit"]))
    };
    let recent = ListOptions {
        limit: Some(5),
        ..with(with_people())
    };
    let by_stock = ListOptions {
        order_by: Some("stock_quantity".into()),
        ascending: false,
        ..with(Selection::columns(&["medicine_name", "stock_quantity", "category"]))
    };

    let mut visit_history = Selection::columns(&["date", "status"]);
    visit_history.expand = vec![patient(), doctor()];
    let mut doctors_by_department = Selection::columns(&["doctor_name", "specialization"]);
    doctors_by_department.expand = vec![department()];
    let mut available_doctors =
        Selection::columns(&["doctor_name", "specialization", "availability", "consultation_fee"]);
    available_doctors.expand = vec![department()];

    let defs: Vec<(&str, &'static str, &'static str, ListOptions)> = vec![
        ("List All Patients", "Basic SELECT", "patients", ListOptions::default()),
        ("Doctors by Department", "JOIN", "doctors", with(doctors_by_department)),
        ("Today's Appointments", "WHERE with DATE", "appointments", todays),
        ("Patient Visit History", "Multiple JOINs", "appointments", with(visit_history)),
        ("Low Stock Medicines", "WHERE", "medicines", low_stock),
        (
            "All Medicines",
            "Inventory",
            "medicines",
            with(Selection::columns(&[
                "medicine_name",
                "category",
                "manufacturer",
                "stock_quantity",
                "price_per_unit",
            ])),
        ),
        ("All Appointments", "Full list", "appointments", with(with_people())),
        (
            "Prescriptions with Details",
            "Multiple JOINs",
            "prescriptions",
            with(
                Selection::all()
                    .expand(medicine())
                    .expand(rel("appointments", "appointment_id", &["date"]).nest(patient())),
            ),
        ),
        ("Vendor List", "Basic SELECT", "vendors", ListOptions::default()),
        (
            "Supply Records",
            "JOINs",
            "supplies",
            with(
                Selection::all()
                    .expand(rel("vendors", "vendor_id", &["vendor_name"]))
                    .expand(medicine()),
            ),
        ),
        (
            "All Bills",
            "Complex JOIN",
            "bills",
            with(Selection::all().expand(
                rel("appointments", "appointment_id", &["date"]).nest(patient()).nest(doctor()),
            )),
        ),
        ("Departments", "Basic SELECT", "departments", ListOptions::default()),
        ("Available Doctors", "JOIN", "doctors", with(available_doctors)),
        ("Recent Appointments", "LIMIT", "appointments", recent),
        ("Top Medicines by Stock", "ORDER BY", "medicines", by_stock),
    ];

    defs.into_iter()
        .enumerate()
        .map(|(i, (name, description, table, options))| query(i + 1, name, description, table, options))
        .collect()
}

/// Result grid: scalar columns plus one level of `relation.field` columns.
#[derive(Clone, Debug, Default, Serialize)]
pub struct QueryResult {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub total: usize,
    pub truncated: bool,
}

impl QueryResult {
    /// Columns are taken from the first row: its scalar fields, then each nested object's
    /// scalar fields. Deeper nesting is not shown.
    pub fn from_rows(rows: &[Row]) -> Self {
        let Some(first) = rows.first() else {
            return QueryResult::default();
        };
        let scalar = |v: &Value| !v.is_object() && !v.is_array();
        let mut columns: Vec<(String, Option<String>)> = first
            .iter()
            .filter(|(_, v)| scalar(v))
            .map(|(k, _)| (k.clone(), None))
            .collect();
        for (k, v) in first.iter() {
            if let Value::Object(nested) = v {
                for (sub, sv) in nested {
                    if scalar(sv) {
                        columns.push((k.clone(), Some(sub.clone())));
                    }
                }
            }
        }

        let headers = columns
            .iter()
            .map(|(k, sub)| match sub {
                Some(s) => format!("{}.{}", k, s),
                None => k.clone(),
            })
            .collect();
        let grid = rows
            .iter()
            .take(RESULT_ROWS)
            .map(|row| {
                columns
                    .iter()
                    .map(|(k, sub)| {
                        let v = match sub {
                            Some(s) => row.get(k).and_then(|n| n.get(s)),
                            None => row.get(k),
                        };
                        v.cloned().unwrap_or(Value::Null)
                    })
                    .collect()
            })
            .collect();
        QueryResult {
            headers,
            rows: grid,
            total: rows.len(),
            truncated: rows.len() > RESULT_ROWS,
        }
    }
}

/// Runs query `index` (zero-based).
pub async fn run_query(adapter: &Adapter, index: usize, today: NaiveDate) -> Result<(CannedQuery, QueryResult), AppError> {
    let q = canned_queries(today)
        .into_iter()
        .nth(index)
        .ok_or_else(|| AppError::NotFound(format!("query {}", index)))?;
    let rows = adapter.list_all(q.table, &q.options).await?;
    tracing::debug!(query = %q.name, rows = rows.len(), "canned query ran");
    let result = QueryResult::from_rows(&rows);
    Ok((q, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::dashboard::tests::seed;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn fifteen_queries_with_display_sql() {
        let qs = canned_queries(day());
        assert_eq!(qs.len(), 15);
        assert_eq!(qs[0].name, "1. List All Patients");
        assert_eq!(qs[0].sql(), "SELECT * FROM patients;");
        assert_eq!(
            qs[7].sql(),
            "SELECT *, medicines(medicine_name), appointments(date, patients(name)) FROM prescriptions;"
        );
        assert_eq!(
            qs[13].sql(),
            "SELECT *, patients(name), doctors(doctor_name) FROM appointments LIMIT 5;"
        );
    }

    #[test]
    fn result_grid_flattens_one_level() {
        let rows: Vec<Row> = (0..12)
            .map(|i| {
                json!({"date": "2024-06-01", "n": i, "patients": {"name": "Asha", "x": {"deep": 1}}})
                    .as_object()
                    .cloned()
                    .unwrap()
            })
            .collect();
        let r = QueryResult::from_rows(&rows);
        assert!(r.headers.contains(&"patients.name".to_string()));
        assert!(!r.headers.iter().any(|h| h.contains("deep") || h == "patients.x"));
        assert_eq!(r.rows.len(), RESULT_ROWS);
        assert_eq!(r.total, 12);
        assert!(r.truncated);
        assert!(QueryResult::from_rows(&[]).headers.is_empty());
    }

    #[tokio::test]
    async fn queries_run_against_the_store() {
        let store = MemoryStore::hospital();
        seed(&store).await;
        let adapter = Adapter::new(Arc::new(store));
        let (_, todays) = run_query(&adapter, 2, day()).await.unwrap();
        assert_eq!(todays.total, 1);
        let (_, low) = run_query(&adapter, 4, day()).await.unwrap();
        assert_eq!(low.total, 1);
        for i in 0..15 {
            assert!(run_query(&adapter, i, day()).await.is_ok(), "query {}", i + 1);
        }
        assert!(matches!(run_query(&adapter, 15, day()).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn headers_follow_column_order() {
        let store = MemoryStore::hospital();
        seed(&store).await;
        let adapter = Adapter::new(Arc::new(store));

        let (_, patients) = run_query(&adapter, 0, day()).await.unwrap();
        assert_eq!(patients.headers, ["patient_id", "name", "age", "gender", "address", "contact_no"]);

        let (_, low) = run_query(&adapter, 4, day()).await.unwrap();
        assert_eq!(low.headers, ["medicine_name", "stock_quantity", "price_per_unit"]);

        let (_, appointments) = run_query(&adapter, 6, day()).await.unwrap();
        assert_eq!(appointments.headers.first().map(String::as_str), Some("appointment_id"));
        assert_eq!(
            &appointments.headers[appointments.headers.len() - 2..],
            ["patients.name", "doctors.doctor_name"]
        );
    }
}
