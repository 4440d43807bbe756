//! Dashboard figures. Every figure is advisory: a failing source shows as 0 or empty.

use crate::config::{Catalog, LOW_STOCK_THRESHOLD};
use crate::error::AppError;
use crate::service::{Adapter, TableService};
use crate::store::Row;
use chrono::NaiveDate;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dashboard {
    pub patients: u64,
    pub doctors: u64,
    pub appointments: u64,
    pub medicines: u64,
    pub revenue: f64,
    pub low_stock: Vec<Row>,
    pub today: Vec<Row>,
}

fn or_zero(table: &str, r: Result<u64, AppError>) -> u64 {
    r.unwrap_or_else(|e| {
        tracing::warn!(table = %table, error = %e, "count failed, showing 0");
        0
    })
}

fn or_empty<T: Default>(what: &str, r: Result<T, AppError>) -> T {
    r.unwrap_or_else(|e| {
        tracing::warn!(source = %what, error = %e, "dashboard figure unavailable");
        T::default()
    })
}

/// Runs the four counts concurrently, then the advisory extras.
pub async fn load_dashboard(adapter: &Adapter, catalog: &Catalog, today: NaiveDate) -> Dashboard {
    let (patients, doctors, appointments, medicines) = tokio::join!(
        adapter.count("patients"),
        adapter.count("doctors"),
        adapter.count("appointments"),
        adapter.count("medicines"),
    );

    let revenue = async {
        match catalog.table("bills") {
            Some(d) => TableService::new(adapter, d).total_revenue().await,
            None => Ok(0.0),
        }
    };
    let low_stock = async {
        match catalog.table("medicines") {
            Some(d) => TableService::new(adapter, d).low_stock(LOW_STOCK_THRESHOLD).await,
            None => Ok(Vec::new()),
        }
    };
    let todays = async {
        match catalog.table("appointments") {
            Some(d) => TableService::new(adapter, d).on_date(today).await,
            None => Ok(Vec::new()),
        }
    };
    let (revenue, low_stock, todays) = tokio::join!(revenue, low_stock, todays);

    Dashboard {
        patients: or_zero("patients", patients),
        doctors: or_zero("doctors", doctors),
        appointments: or_zero("appointments", appointments),
        medicines: or_zero("medicines", medicines),
        revenue: or_empty("revenue", revenue),
        low_stock: or_empty("low stock", low_stock),
        today: or_empty("today's appointments", todays),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{ListOptions, MemoryStore, RemoteStore};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashSet;
    use std::sync::Arc;

    /// Delegates to a [`MemoryStore`] but fails every call touching the named tables.
    pub struct FailingStore {
        pub inner: MemoryStore,
        pub broken: HashSet<String>,
    }

    impl FailingStore {
        pub fn new(inner: MemoryStore, broken: &[&str]) -> Self {
            FailingStore {
                inner,
                broken: broken.iter().map(|s| s.to_string()).collect(),
            }
        }

        fn guard(&self, table: &str) -> Result<(), StoreError> {
            if self.broken.contains(table) {
                Err(StoreError::Unavailable(format!("{} is offline", table)))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl RemoteStore for FailingStore {
        async fn select(&self, table: &str, options: &ListOptions) -> Result<Vec<Row>, StoreError> {
            self.guard(table)?;
            self.inner.select(table, options).await
        }
        async fn select_by_key(&self, table: &str, column: &str, key: &Value) -> Result<Vec<Row>, StoreError> {
            self.guard(table)?;
            self.inner.select_by_key(table, column, key).await
        }
        async fn insert(&self, table: &str, fields: &Row) -> Result<Row, StoreError> {
            self.guard(table)?;
            self.inner.insert(table, fields).await
        }
        async fn update(&self, table: &str, column: &str, key: &Value, fields: &Row) -> Result<Vec<Row>, StoreError> {
            self.guard(table)?;
            self.inner.update(table, column, key, fields).await
        }
        async fn delete(&self, table: &str, column: &str, key: &Value) -> Result<u64, StoreError> {
            self.guard(table)?;
            self.inner.delete(table, column, key).await
        }
        async fn count(&self, table: &str) -> Result<u64, StoreError> {
            self.guard(table)?;
            self.inner.count(table).await
        }
        async fn ping(&self) -> Result<(), StoreError> {
            self.inner.ping().await
        }
    }

    pub async fn seed(store: &MemoryStore) {
        let rows = [
            ("patients", json!({"name": "Asha", "age": 30, "contact_no": "1"})),
            ("patients", json!({"name": "Ravi", "age": 52, "contact_no": "2"})),
            ("doctors", json!({"doctor_name": "Dr. Mehta", "consultation_fee": 400})),
            ("medicines", json!({"medicine_name": "Amoxicillin", "price_per_unit": 3, "stock_quantity": 4})),
            ("appointments", json!({"date": "2024-06-01", "timeslot": "09:30", "patient_id": 1, "doctor_id": 1})),
            ("bills", json!({"appointment_id": 1, "consultant_charge": 400, "medicine_charge": 50, "bill_date": "2024-06-01"})),
        ];
        for (table, fields) in rows {
            store.insert(table, fields.as_object().unwrap()).await.unwrap();
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[tokio::test]
    async fn counts_and_extras_reflect_the_store() {
        let store = MemoryStore::hospital();
        seed(&store).await;
        let adapter = Adapter::new(Arc::new(store));
        let d = load_dashboard(&adapter, &Catalog::hospital().unwrap(), day()).await;
        assert_eq!((d.patients, d.doctors, d.appointments, d.medicines), (2, 1, 1, 1));
        assert_eq!(d.revenue, 450.0);
        assert_eq!(d.low_stock.len(), 1);
        assert_eq!(d.today[0]["patient_name"], json!("Asha"));
    }

    #[tokio::test]
    async fn one_failing_count_shows_zero_and_others_stay_accurate() {
        let store = MemoryStore::hospital();
        seed(&store).await;
        let adapter = Adapter::new(Arc::new(FailingStore::new(store, &["doctors"])));
        let d = load_dashboard(&adapter, &Catalog::hospital().unwrap(), day()).await;
        assert_eq!(d.doctors, 0);
        assert_eq!((d.patients, d.appointments, d.medicines), (2, 1, 1));
    }
}
