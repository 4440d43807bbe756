//! Per-table service driven by a [`TableDescriptor`]: fixed id column and ordering,
//! relation expansion on list, and flattening of related fields into display keys.

use crate::config::{PkType, RelationSpec, TableDescriptor};
use crate::error::AppError;
use crate::service::Adapter;
use crate::store::{Expansion, Filter, ListOptions, Row, Selection};
use chrono::NaiveDate;
use serde_json::Value;

pub struct TableService<'a> {
    adapter: &'a Adapter,
    descriptor: &'a TableDescriptor,
}

/// Turns declared relations into store expansions.
pub fn expansions(relations: &[RelationSpec]) -> Vec<Expansion> {
    relations
        .iter()
        .map(|r| {
            let columns: Vec<&str> = r.fields.iter().map(|f| f.column.as_str()).collect();
            let mut e = Expansion::new(&r.table, &r.foreign_key, &r.references, &columns);
            e.nested = expansions(&r.nested);
            e
        })
        .collect()
}

/// Moves expanded related fields onto the row under their display keys and drops the
/// nested objects. A missing related row flattens to nulls.
pub fn flatten(row: &mut Row, relations: &[RelationSpec]) {
    for r in relations {
        let related = match row.remove(&r.table) {
            Some(Value::Object(m)) => m,
            _ => Row::new(),
        };
        lift(row, &related, r);
    }
}

fn lift(target: &mut Row, related: &Row, relation: &RelationSpec) {
    for f in &relation.fields {
        let v = related.get(&f.column).cloned().unwrap_or(Value::Null);
        target.insert(f.display_as.clone(), v);
    }
    for nested in &relation.nested {
        let inner = match related.get(&nested.table) {
            Some(Value::Object(m)) => m.clone(),
            _ => Row::new(),
        };
        lift(target, &inner, nested);
    }
}

/// Validates a path id against the key type and converts it to the value sent to the store.
pub fn parse_id(pk_type: PkType, raw: &str) -> Result<Value, AppError> {
    let raw = raw.trim();
    match pk_type {
        PkType::Int => raw
            .parse::<i32>()
            .map(Value::from)
            .map_err(|_| AppError::BadRequest(format!("id must be an integer: {:?}", raw))),
        PkType::BigInt => raw
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| AppError::BadRequest(format!("id must be an integer: {:?}", raw))),
        PkType::Uuid => uuid::Uuid::parse_str(raw)
            .map(|u| Value::String(u.to_string()))
            .map_err(|_| AppError::BadRequest(format!("id must be a UUID: {:?}", raw))),
        PkType::Text if raw.is_empty() => Err(AppError::BadRequest("id must not be empty".into())),
        PkType::Text => Ok(Value::String(raw.to_string())),
    }
}

impl<'a> TableService<'a> {
    pub fn new(adapter: &'a Adapter, descriptor: &'a TableDescriptor) -> Self {
        TableService { adapter, descriptor }
    }

    pub fn descriptor(&self) -> &TableDescriptor {
        self.descriptor
    }

    fn table(&self) -> &str {
        &self.descriptor.name
    }

    fn options(&self) -> ListOptions {
        let d = self.descriptor;
        let mut selection = Selection::all();
        selection.expand = expansions(&d.relations);
        ListOptions {
            selection,
            ..ListOptions::ordered(&d.order_by, d.ascending)
        }
    }

    async fn fetch(&self, options: &ListOptions) -> Result<Vec<Row>, AppError> {
        let mut rows = self.adapter.list_all(self.table(), options).await?;
        for row in rows.iter_mut() {
            flatten(row, &self.descriptor.relations);
        }
        Ok(rows)
    }

    /// All rows in default order with related fields flattened.
    pub async fn list(&self) -> Result<Vec<Row>, AppError> {
        self.fetch(&self.options()).await
    }

    pub async fn get(&self, id: &str) -> Result<Row, AppError> {
        let id = parse_id(self.descriptor.pk_type, id)?;
        self.adapter.get_by_id(self.table(), &id, &self.descriptor.primary_key).await
    }

    pub async fn create(&self, fields: &Row) -> Result<Row, AppError> {
        self.adapter.create(self.table(), fields).await
    }

    pub async fn update(&self, id: &str, fields: &Row) -> Result<Row, AppError> {
        let id = parse_id(self.descriptor.pk_type, id)?;
        self.adapter
            .update(self.table(), &id, &self.descriptor.primary_key, fields)
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let id = parse_id(self.descriptor.pk_type, id)?;
        self.adapter.delete(self.table(), &id, &self.descriptor.primary_key).await
    }

    pub async fn count(&self) -> Result<u64, AppError> {
        self.adapter.count(self.table()).await
    }

    /// Medicines with `stock_quantity` below `threshold`, lowest first.
    pub async fn low_stock(&self, threshold: i64) -> Result<Vec<Row>, AppError> {
        let mut options = ListOptions::ordered("stock_quantity", true);
        options.filters.push(Filter::lt("stock_quantity", threshold));
        self.fetch(&options).await
    }

    /// Appointments on `date`, earliest slot first.
    pub async fn on_date(&self, date: NaiveDate) -> Result<Vec<Row>, AppError> {
        let mut options = self.options();
        options.order_by = Some("timeslot".into());
        options.ascending = true;
        options.filters.push(Filter::eq("date", date.format("%Y-%m-%d").to_string()));
        self.fetch(&options).await
    }

    /// Sum of bill totals; null totals count as zero.
    pub async fn total_revenue(&self) -> Result<f64, AppError> {
        let options = ListOptions {
            selection: Selection::columns(&["total_amount"]),
            ..ListOptions::default()
        };
        let rows = self.adapter.list_all(self.table(), &options).await?;
        Ok(rows.iter().filter_map(|r| r.get("total_amount").and_then(amount)).sum())
    }
}

/// Numeric value of a JSON number or numeric string (PostgreSQL may send decimals either way).
pub fn amount(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Catalog;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    async fn seeded() -> (Adapter, Catalog) {
        let adapter = Adapter::new(Arc::new(MemoryStore::hospital()));
        for (table, fields) in [
            ("patients", json!({"name": "Asha", "age": 30, "contact_no": "1"})),
            ("doctors", json!({"doctor_name": "Dr. Mehta", "consultation_fee": 400})),
            ("medicines", json!({"medicine_name": "Amoxicillin", "price_per_unit": 3, "stock_quantity": 5})),
            ("medicines", json!({"medicine_name": "Cetirizine", "price_per_unit": 1, "stock_quantity": 40})),
            ("appointments", json!({"date": "2024-06-01", "timeslot": "09:30", "patient_id": 1, "doctor_id": 1})),
            ("prescriptions", json!({"appointment_id": 1, "medicine_id": 2, "dosage": "10mg", "duration": "5 days"})),
            ("bills", json!({"appointment_id": 1, "consultant_charge": 400, "medicine_charge": 50, "bill_date": "2024-06-01"})),
        ] {
            adapter.create(table, &row(fields)).await.unwrap();
        }
        (adapter, Catalog::hospital().unwrap())
    }

    #[test]
    fn relations_become_nested_expansions() {
        let catalog = Catalog::hospital().unwrap();
        let bills = catalog.table("bills").unwrap();
        let e = expansions(&bills.relations);
        assert_eq!(e[0].to_string(), "appointments(date, patients(name), doctors(doctor_name))");
    }

    #[test]
    fn flatten_lifts_nested_fields_and_nulls_missing_relations() {
        let catalog = Catalog::hospital().unwrap();
        let relations = &catalog.table("prescriptions").unwrap().relations;
        let mut r = row(json!({
            "prescription_id": 1,
            "appointments": {"date": "2024-06-01", "patients": {"name": "Asha"}},
            "medicines": null
        }));
        flatten(&mut r, relations);
        assert_eq!(r["patient_name"], json!("Asha"));
        assert_eq!(r["date"], json!("2024-06-01"));
        assert_eq!(r["medicine_name"], Value::Null);
        assert!(!r.contains_key("appointments"));
    }

    #[test]
    fn ids_are_checked_against_the_key_type() {
        assert_eq!(parse_id(PkType::Int, " 7 ").unwrap(), json!(7));
        assert!(matches!(parse_id(PkType::Int, "7; drop"), Err(AppError::BadRequest(_))));
        assert!(parse_id(PkType::Uuid, "not-a-uuid").is_err());
        assert_eq!(parse_id(PkType::Text, "abc").unwrap(), json!("abc"));
    }

    #[tokio::test]
    async fn list_flattens_relations_in_default_order() {
        let (adapter, catalog) = seeded().await;
        let svc = TableService::new(&adapter, catalog.table("prescriptions").unwrap());
        let rows = svc.list().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["patient_name"], json!("Asha"));
        assert_eq!(rows[0]["medicine_name"], json!("Cetirizine"));
    }

    #[tokio::test]
    async fn per_table_queries() {
        let (adapter, catalog) = seeded().await;
        let low = TableService::new(&adapter, catalog.table("medicines").unwrap())
            .low_stock(10)
            .await
            .unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0]["medicine_name"], json!("Amoxicillin"));

        let appointments = TableService::new(&adapter, catalog.table("appointments").unwrap());
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(appointments.on_date(date).await.unwrap().len(), 1);
        assert!(appointments.on_date(date.succ_opt().unwrap()).await.unwrap().is_empty());

        let revenue = TableService::new(&adapter, catalog.table("bills").unwrap())
            .total_revenue()
            .await
            .unwrap();
        assert_eq!(revenue, 450.0);
    }

    #[tokio::test]
    async fn every_table_accepts_a_submitted_form() {
        use crate::config::hospital_tables;
        use crate::service::FormValidator;
        use std::collections::HashMap;

        let (adapter, _) = seeded().await;
        let forms: &[(&str, &[(&str, &str)])] = &[
            ("patients", &[("name", "Meera"), ("age", "41"), ("gender", "Female"), ("contact_no", "555"), ("address", "12 Hill Rd")]),
            ("doctors", &[("doctor_name", "Dr. Rao"), ("specialization", "Neurology"), ("consultation_fee", "650"), ("availability", "Mon-Fri")]),
            ("departments", &[("department_name", "Neurology")]),
            ("appointments", &[("patient_id", "2"), ("doctor_id", "1"), ("date", "2024-07-01"), ("timeslot", "14:30"), ("status", "completed"), ("diagnosis", "Flu")]),
            ("medicines", &[("medicine_name", "Ibuprofen"), ("category", "Analgesic"), ("manufacturer", "Acme"), ("price_per_unit", "1.75"), ("stock_quantity", "120")]),
            ("vendors", &[("vendor_name", "MedSupply"), ("license_no", "LIC-9"), ("contact_details", "ops@medsupply.test")]),
            ("supplies", &[("vendor_id", "1"), ("medicine_id", "1"), ("quantity_supplied", "30"), ("purchase_cost", "900"), ("supply_date", "2024-07-02")]),
            ("prescriptions", &[("appointment_id", "1"), ("medicine_id", "1"), ("dosage", "250mg"), ("duration", "3 days")]),
            ("bills", &[("appointment_id", "2"), ("consultant_charge", "650"), ("medicine_charge", "80"), ("total_amount", "1"), ("bill_date", "2024-07-03")]),
        ];

        for descriptor in hospital_tables() {
            let (_, pairs) = forms
                .iter()
                .find(|(name, _)| *name == descriptor.name)
                .unwrap_or_else(|| panic!("no form for {}", descriptor.name));
            let form: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
            let svc = TableService::new(&adapter, &descriptor);
            let before = svc.list().await.unwrap().len();

            let fields = FormValidator::parse_create(&descriptor, &form).unwrap();
            let created = svc.create(&fields).await.unwrap();
            assert_eq!(svc.list().await.unwrap().len(), before + 1, "{}", descriptor.name);

            let id = created[&descriptor.primary_key].to_string();
            let stored = svc.get(&id).await.unwrap();
            for (column, submitted) in &fields {
                if column == "total_amount" {
                    continue;
                }
                let got = &stored[column];
                match submitted {
                    Value::String(text) => {
                        let got = got.as_str().unwrap_or_default();
                        assert!(got.starts_with(text.as_str()), "{}.{}: {:?}", descriptor.name, column, got);
                    }
                    _ => assert_eq!(got.as_f64(), submitted.as_f64(), "{}.{}", descriptor.name, column),
                }
            }
        }

        let bills = Catalog::hospital().unwrap();
        let bill = TableService::new(&adapter, bills.table("bills").unwrap()).get("2").await.unwrap();
        assert_eq!(amount(&bill["total_amount"]), Some(730.0));
    }
}
