//! In-process store enforcing the hospital schema's NOT NULL, UNIQUE, CHECK and FOREIGN KEY
//! constraints and its two triggers. Rejections carry PostgreSQL-style messages.
//!
//! Every write runs against a copy of the tables and is committed only when all
//! constraints and triggers pass, so a rejected statement leaves no trace.

use crate::error::StoreError;
use crate::store::{Expansion, FilterOp, ListOptions, RemoteStore, Row};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Clone, Debug, PartialEq)]
pub enum ColumnKind {
    Serial,
    Integer,
    Decimal,
    Text { max_len: Option<usize> },
    Date,
    Time,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Check {
    Positive,
    NonNegative,
    /// Exclusive bounds.
    Between(f64, f64),
    OneOf(Vec<String>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnDelete {
    Cascade,
    SetNull,
    Restrict,
}

#[derive(Clone, Debug)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
    pub not_null: bool,
    pub unique: bool,
    pub default: Option<Value>,
    pub check: Option<Check>,
}

impl ColumnDef {
    pub fn new(name: &str, kind: ColumnKind) -> Self {
        ColumnDef {
            name: name.to_string(),
            kind,
            not_null: false,
            unique: false,
            default: None,
            check: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, v: Value) -> Self {
        self.default = Some(v);
        self
    }

    pub fn check(mut self, check: Check) -> Self {
        self.check = Some(check);
        self
    }
}

#[derive(Clone, Debug)]
pub struct ForeignKey {
    pub column: String,
    pub table: String,
    pub references: String,
    pub on_delete: OnDelete,
}

type Tables = HashMap<String, TableData>;
type BeforeWrite = fn(&mut Row);
type AfterInsert = fn(&mut Tables, &Row) -> Result<(), StoreError>;

#[derive(Clone)]
pub struct TableDef {
    pub name: String,
    pub primary_key: String,
    pub columns: Vec<ColumnDef>,
    pub foreign_keys: Vec<ForeignKey>,
    before_write: Option<BeforeWrite>,
    after_insert: Option<AfterInsert>,
}

impl TableDef {
    pub fn new(name: &str, primary_key: &str) -> Self {
        TableDef {
            name: name.to_string(),
            primary_key: primary_key.to_string(),
            columns: vec![ColumnDef::new(primary_key, ColumnKind::Serial)],
            foreign_keys: Vec::new(),
            before_write: None,
            after_insert: None,
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn references(mut self, column: &str, table: &str, references: &str, on_delete: OnDelete) -> Self {
        self.foreign_keys.push(ForeignKey {
            column: column.to_string(),
            table: table.to_string(),
            references: references.to_string(),
            on_delete,
        });
        self
    }

    fn column_def(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Clone)]
struct TableData {
    def: TableDef,
    rows: Vec<Row>,
    next_id: i64,
}

pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new(defs: Vec<TableDef>) -> Self {
        let tables = defs
            .into_iter()
            .map(|def| {
                (
                    def.name.clone(),
                    TableData {
                        def,
                        rows: Vec::new(),
                        next_id: 1,
                    },
                )
            })
            .collect();
        MemoryStore {
            tables: RwLock::new(tables),
        }
    }

    /// The hospital schema, mirroring `schema::SCHEMA_SQL` and its two triggers.
    pub fn hospital() -> Self {
        use ColumnKind::*;
        let text = |n: usize| Text { max_len: Some(n) };
        let long_text = Text { max_len: None };
        Self::new(vec![
            TableDef::new("departments", "department_id")
                .column(ColumnDef::new("department_name", text(100)).not_null().unique()),
            TableDef::new("patients", "patient_id")
                .column(ColumnDef::new("name", text(100)).not_null())
                .column(ColumnDef::new("age", Integer).check(Check::Between(0.0, 150.0)))
                .column(ColumnDef::new("gender", text(10)))
                .column(ColumnDef::new("address", long_text.clone()))
                .column(ColumnDef::new("contact_no", text(15)).not_null()),
            TableDef::new("doctors", "doctor_id")
                .column(ColumnDef::new("doctor_name", text(100)).not_null())
                .column(ColumnDef::new("specialization", text(100)))
                .column(ColumnDef::new("consultation_fee", Decimal).check(Check::Positive))
                .column(ColumnDef::new("availability", text(100)))
                .column(ColumnDef::new("department_id", Integer))
                .references("department_id", "departments", "department_id", OnDelete::SetNull),
            TableDef::new("appointments", "appointment_id")
                .column(ColumnDef::new("date", Date).not_null())
                .column(ColumnDef::new("timeslot", Time).not_null())
                .column(
                    ColumnDef::new("status", text(20))
                        .default_value(Value::from("scheduled"))
                        .check(Check::OneOf(vec!["scheduled".into(), "completed".into(), "cancelled".into()])),
                )
                .column(ColumnDef::new("diagnosis", long_text.clone()))
                .column(ColumnDef::new("patient_id", Integer).not_null())
                .column(ColumnDef::new("doctor_id", Integer).not_null())
                .references("patient_id", "patients", "patient_id", OnDelete::Cascade)
                .references("doctor_id", "doctors", "doctor_id", OnDelete::Cascade),
            TableDef::new("medicines", "medicine_id")
                .column(ColumnDef::new("medicine_name", text(100)).not_null())
                .column(ColumnDef::new("category", text(50)))
                .column(ColumnDef::new("manufacturer", text(100)))
                .column(ColumnDef::new("price_per_unit", Decimal).check(Check::Positive))
                .column(
                    ColumnDef::new("stock_quantity", Integer)
                        .default_value(Value::from(0))
                        .check(Check::NonNegative),
                ),
            TableDef {
                after_insert: Some(decrement_medicine_stock),
                ..TableDef::new("prescriptions", "prescription_id")
                    .column(ColumnDef::new("appointment_id", Integer).not_null())
                    .column(ColumnDef::new("medicine_id", Integer).not_null())
                    .column(ColumnDef::new("dosage", text(100)))
                    .column(ColumnDef::new("duration", text(50)))
                    .references("appointment_id", "appointments", "appointment_id", OnDelete::Cascade)
                    .references("medicine_id", "medicines", "medicine_id", OnDelete::Cascade)
            },
            TableDef::new("vendors", "vendor_id")
                .column(ColumnDef::new("vendor_name", text(100)).not_null())
                .column(ColumnDef::new("license_no", text(50)).not_null().unique())
                .column(ColumnDef::new("contact_details", long_text)),
            TableDef::new("supplies", "supply_id")
                .column(ColumnDef::new("vendor_id", Integer).not_null())
                .column(ColumnDef::new("medicine_id", Integer).not_null())
                .column(ColumnDef::new("quantity_supplied", Integer).check(Check::Positive))
                .column(ColumnDef::new("purchase_cost", Decimal))
                .column(ColumnDef::new("supply_date", Date).not_null())
                .references("vendor_id", "vendors", "vendor_id", OnDelete::Cascade)
                .references("medicine_id", "medicines", "medicine_id", OnDelete::Cascade),
            TableDef {
                before_write: Some(calculate_bill_total),
                ..TableDef::new("bills", "bill_id")
                    .column(ColumnDef::new("consultant_charge", Decimal).default_value(Value::from(0)))
                    .column(ColumnDef::new("medicine_charge", Decimal).default_value(Value::from(0)))
                    .column(ColumnDef::new("total_amount", Decimal))
                    .column(ColumnDef::new("bill_date", Date).not_null())
                    .column(ColumnDef::new("appointment_id", Integer).not_null().unique())
                    .references("appointment_id", "appointments", "appointment_id", OnDelete::Cascade)
            },
        ])
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    /// Runs `f` on a copy of the tables and commits the copy only on success.
    fn write<T>(&self, f: impl FnOnce(&mut Tables) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let mut guard = self
            .tables
            .write()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        *guard = next;
        Ok(out)
    }
}

/// `trg_bill_calculate`: total_amount := consultant_charge + medicine_charge.
fn calculate_bill_total(row: &mut Row) {
    let consult = row.get("consultant_charge").and_then(Value::as_f64);
    let medicine = row.get("medicine_charge").and_then(Value::as_f64);
    let total = match (consult, medicine) {
        (Some(a), Some(b)) => number(a + b),
        _ => Value::Null,
    };
    row.insert("total_amount".into(), total);
}

/// `trg_prescription_insert`: one unit of the prescribed medicine leaves stock.
fn decrement_medicine_stock(tables: &mut Tables, prescription: &Row) -> Result<(), StoreError> {
    let Some(medicine_id) = prescription.get("medicine_id").cloned() else {
        return Ok(());
    };
    let medicines = table_mut(tables, "medicines")?;
    let check = medicines.def.column_def("stock_quantity").and_then(|c| c.check.clone());
    for row in medicines.rows.iter_mut() {
        if values_equal(row.get("medicine_id").unwrap_or(&Value::Null), &medicine_id) {
            if let Some(stock) = row.get("stock_quantity").and_then(Value::as_i64) {
                let next = Value::from(stock - 1);
                if let Some(check) = &check {
                    if !check.passes(&next) {
                        return Err(check_violation("medicines", "stock_quantity"));
                    }
                }
                row.insert("stock_quantity".into(), next);
            }
        }
    }
    Ok(())
}

fn table<'a>(tables: &'a Tables, name: &str) -> Result<&'a TableData, StoreError> {
    tables.get(name).ok_or_else(|| StoreError::UnknownTable(name.to_string()))
}

fn table_mut<'a>(tables: &'a mut Tables, name: &str) -> Result<&'a mut TableData, StoreError> {
    tables.get_mut(name).ok_or_else(|| StoreError::UnknownTable(name.to_string()))
}

fn number(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn check_violation(table: &str, column: &str) -> StoreError {
    StoreError::Rejected(format!(
        "new row for relation \"{}\" violates check constraint \"{}_{}_check\"",
        table, table, column
    ))
}

fn invalid_input(type_name: &str, v: &Value) -> StoreError {
    let shown = match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    StoreError::Rejected(format!("invalid input syntax for type {}: \"{}\"", type_name, shown))
}

impl Check {
    fn passes(&self, v: &Value) -> bool {
        if v.is_null() {
            return true;
        }
        match self {
            Check::Positive => v.as_f64().map(|n| n > 0.0).unwrap_or(false),
            Check::NonNegative => v.as_f64().map(|n| n >= 0.0).unwrap_or(false),
            Check::Between(lo, hi) => v.as_f64().map(|n| n > *lo && n < *hi).unwrap_or(false),
            Check::OneOf(allowed) => v.as_str().map(|s| allowed.iter().any(|a| a == s)).unwrap_or(false),
        }
    }
}

impl ColumnKind {
    /// Coerce a JSON value the way the column's SQL type would accept it.
    fn coerce(&self, v: &Value) -> Result<Value, StoreError> {
        if v.is_null() {
            return Ok(Value::Null);
        }
        match self {
            ColumnKind::Serial | ColumnKind::Integer => {
                let n = match v {
                    Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                        (Some(i), _) => i128::from(i),
                        (None, Some(f)) if f.fract() == 0.0 && f.is_finite() => f as i128,
                        _ => return Err(invalid_input("integer", v)),
                    },
                    Value::String(s) => s.trim().parse::<i128>().map_err(|_| invalid_input("integer", v))?,
                    _ => return Err(invalid_input("integer", v)),
                };
                i32::try_from(n)
                    .map(Value::from)
                    .map_err(|_| StoreError::Rejected(format!("value \"{}\" is out of range for type integer", n)))
            }
            ColumnKind::Decimal => match v {
                Value::Number(n) => n.as_f64().map(number).ok_or_else(|| invalid_input("numeric", v)),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(number)
                    .ok_or_else(|| invalid_input("numeric", v)),
                _ => Err(invalid_input("numeric", v)),
            },
            ColumnKind::Text { max_len } => {
                let s = match v {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => return Err(invalid_input("text", v)),
                };
                if let Some(max) = max_len {
                    if s.chars().count() > *max {
                        return Err(StoreError::Rejected(format!(
                            "value too long for type character varying({})",
                            max
                        )));
                    }
                }
                Ok(Value::String(s))
            }
            ColumnKind::Date => v
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
                .ok_or_else(|| invalid_input("date", v)),
            ColumnKind::Time => v
                .as_str()
                .and_then(|s| {
                    let s = s.trim();
                    NaiveTime::parse_from_str(s, "%H:%M:%S")
                        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                        .ok()
                })
                .map(|t| Value::String(t.format("%H:%M:%S").to_string()))
                .ok_or_else(|| invalid_input("time without time zone", v)),
        }
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    compare(a, b) == Some(Ordering::Equal)
}

fn coerce_for(def: &TableDef, column: &str, v: &Value) -> Result<Value, StoreError> {
    let col = def.column_def(column).ok_or_else(|| {
        StoreError::Rejected(format!("column {}.{} does not exist", def.name, column))
    })?;
    col.kind.coerce(v)
}

/// Builds the stored row from `base` (existing row or empty) and `fields`, then checks
/// column-level constraints.
fn build_row(data: &mut TableData, base: Option<&Row>, fields: &Row) -> Result<Row, StoreError> {
    let def = &data.def;
    for key in fields.keys() {
        if def.column_def(key).is_none() {
            return Err(StoreError::Rejected(format!(
                "column \"{}\" of relation \"{}\" does not exist",
                key, def.name
            )));
        }
    }
    let mut row = Row::new();
    for col in &def.columns {
        let value = match (fields.get(&col.name), base) {
            (Some(v), _) => col.kind.coerce(v)?,
            (None, Some(existing)) => existing.get(&col.name).cloned().unwrap_or(Value::Null),
            (None, None) if col.kind == ColumnKind::Serial => Value::Null,
            (None, None) => col.default.clone().unwrap_or(Value::Null),
        };
        row.insert(col.name.clone(), value);
    }
    if base.is_none() && row.get(&def.primary_key).map(Value::is_null).unwrap_or(true) {
        row.insert(def.primary_key.clone(), Value::from(data.next_id));
        data.next_id += 1;
    }
    if let Some(trigger) = data.def.before_write {
        trigger(&mut row);
    }
    let def = &data.def;
    for col in &def.columns {
        let v = row.get(&col.name).unwrap_or(&Value::Null);
        if col.not_null && v.is_null() {
            return Err(StoreError::Rejected(format!(
                "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                col.name, def.name
            )));
        }
        if let Some(check) = &col.check {
            if !check.passes(v) {
                return Err(check_violation(&def.name, &col.name));
            }
        }
    }
    Ok(row)
}

/// Unique and foreign-key checks for `row`, ignoring the row at `skip` (its old version).
fn check_relations(tables: &Tables, table_name: &str, row: &Row, skip: Option<usize>) -> Result<(), StoreError> {
    let data = table(tables, table_name)?;
    let def = &data.def;
    for col in def.columns.iter().filter(|c| c.unique || c.name == def.primary_key) {
        let v = row.get(&col.name).unwrap_or(&Value::Null);
        if v.is_null() {
            continue;
        }
        let clash = data
            .rows
            .iter()
            .enumerate()
            .any(|(i, r)| Some(i) != skip && values_equal(r.get(&col.name).unwrap_or(&Value::Null), v));
        if clash {
            let constraint = if col.name == def.primary_key {
                format!("{}_pkey", def.name)
            } else {
                format!("{}_{}_key", def.name, col.name)
            };
            return Err(StoreError::Rejected(format!(
                "duplicate key value violates unique constraint \"{}\"",
                constraint
            )));
        }
    }
    for fk in &def.foreign_keys {
        let v = row.get(&fk.column).unwrap_or(&Value::Null);
        if v.is_null() {
            continue;
        }
        let parent = table(tables, &fk.table)?;
        let found = parent
            .rows
            .iter()
            .any(|r| values_equal(r.get(&fk.references).unwrap_or(&Value::Null), v));
        if !found {
            return Err(StoreError::Rejected(format!(
                "insert or update on table \"{}\" violates foreign key constraint \"{}_{}_fkey\"",
                def.name, def.name, fk.column
            )));
        }
    }
    Ok(())
}

/// Deletes rows of `table_name` whose `column` equals one of `keys`, applying each
/// referencing foreign key's ON DELETE action first.
fn delete_where(tables: &mut Tables, table_name: &str, column: &str, keys: &[Value]) -> Result<u64, StoreError> {
    let (doomed, pk) = {
        let data = table(tables, table_name)?;
        let pk = data.def.primary_key.clone();
        let doomed: Vec<Value> = data
            .rows
            .iter()
            .filter(|r| {
                let v = r.get(column).unwrap_or(&Value::Null);
                keys.iter().any(|k| values_equal(v, k))
            })
            .map(|r| r.get(&pk).cloned().unwrap_or(Value::Null))
            .collect();
        (doomed, pk)
    };
    if doomed.is_empty() {
        return Ok(0);
    }

    let children: Vec<(String, ForeignKey)> = tables
        .values()
        .flat_map(|t| {
            t.def
                .foreign_keys
                .iter()
                .filter(|fk| fk.table == table_name)
                .map(|fk| (t.def.name.clone(), fk.clone()))
                .collect::<Vec<_>>()
        })
        .collect();
    for (child, fk) in children {
        let referenced: Vec<Value> = table(tables, table_name)?
            .rows
            .iter()
            .filter(|r| doomed.iter().any(|d| values_equal(r.get(&pk).unwrap_or(&Value::Null), d)))
            .filter_map(|r| r.get(&fk.references).cloned())
            .collect();
        match fk.on_delete {
            OnDelete::Cascade => {
                delete_where(tables, &child, &fk.column, &referenced)?;
            }
            OnDelete::SetNull => {
                for r in table_mut(tables, &child)?.rows.iter_mut() {
                    let v = r.get(&fk.column).cloned().unwrap_or(Value::Null);
                    if referenced.iter().any(|k| values_equal(&v, k)) {
                        r.insert(fk.column.clone(), Value::Null);
                    }
                }
            }
            OnDelete::Restrict => {
                let blocked = table(tables, &child)?.rows.iter().any(|r| {
                    let v = r.get(&fk.column).unwrap_or(&Value::Null);
                    referenced.iter().any(|k| values_equal(v, k))
                });
                if blocked {
                    return Err(StoreError::Rejected(format!(
                        "update or delete on table \"{}\" violates foreign key constraint \"{}_{}_fkey\" on table \"{}\"",
                        table_name, child, fk.column, child
                    )));
                }
            }
        }
    }

    let data = table_mut(tables, table_name)?;
    let before = data.rows.len();
    data.rows
        .retain(|r| !doomed.iter().any(|d| values_equal(r.get(&pk).unwrap_or(&Value::Null), d)));
    Ok((before - data.rows.len()) as u64)
}

fn project(
    tables: &Tables,
    def: &TableDef,
    row: &Row,
    columns: Option<&[String]>,
    expand: &[Expansion],
) -> Result<Row, StoreError> {
    let mut out = match columns {
        Some(cols) if !cols.is_empty() => {
            let mut m = Row::new();
            for c in cols {
                if def.column_def(c).is_none() {
                    return Err(StoreError::Rejected(format!("column {}.{} does not exist", def.name, c)));
                }
                m.insert(c.clone(), row.get(c).cloned().unwrap_or(Value::Null));
            }
            m
        }
        _ => row.clone(),
    };
    for e in expand {
        let related = table(tables, &e.table)?;
        let fk_value = row.get(&e.foreign_key).unwrap_or(&Value::Null);
        let value = match related
            .rows
            .iter()
            .find(|r| values_equal(r.get(&e.references).unwrap_or(&Value::Null), fk_value))
        {
            Some(r) => Value::Object(project(tables, &related.def, r, Some(&e.columns), &e.nested)?),
            None => Value::Null,
        };
        out.insert(e.table.clone(), value);
    }
    Ok(out)
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn select(&self, table_name: &str, options: &ListOptions) -> Result<Vec<Row>, StoreError> {
        let tables = self.read()?;
        let data = table(&tables, table_name)?;
        let def = &data.def;

        let mut operands = Vec::with_capacity(options.filters.len());
        for f in &options.filters {
            operands.push(coerce_for(def, &f.column, &f.value)?);
        }
        let mut rows: Vec<&Row> = data
            .rows
            .iter()
            .filter(|r| {
                options.filters.iter().zip(&operands).all(|(f, operand)| {
                    let v = r.get(&f.column).unwrap_or(&Value::Null);
                    match f.op {
                        FilterOp::Eq => compare(v, operand) == Some(Ordering::Equal),
                        FilterOp::Lt => compare(v, operand) == Some(Ordering::Less),
                    }
                })
            })
            .collect();

        if let Some(order) = &options.order_by {
            if def.column_def(order).is_none() {
                return Err(StoreError::Rejected(format!("column {}.{} does not exist", def.name, order)));
            }
            // NULLs sort last ascending and first descending, as in PostgreSQL.
            rows.sort_by(|a, b| {
                let (x, y) = (a.get(order).unwrap_or(&Value::Null), b.get(order).unwrap_or(&Value::Null));
                let ord = match (x.is_null(), y.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    _ => compare(x, y).unwrap_or(Ordering::Equal),
                };
                if options.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }
        if let Some(limit) = options.limit {
            rows.truncate(limit as usize);
        }

        rows.into_iter()
            .map(|r| project(&tables, def, r, options.selection.columns.as_deref(), &options.selection.expand))
            .collect()
    }

    async fn select_by_key(&self, table_name: &str, column: &str, key: &Value) -> Result<Vec<Row>, StoreError> {
        let tables = self.read()?;
        let data = table(&tables, table_name)?;
        let key = coerce_for(&data.def, column, key)?;
        Ok(data
            .rows
            .iter()
            .filter(|r| values_equal(r.get(column).unwrap_or(&Value::Null), &key))
            .cloned()
            .collect())
    }

    async fn insert(&self, table_name: &str, fields: &Row) -> Result<Row, StoreError> {
        self.write(|tables| {
            let data = table_mut(tables, table_name)?;
            let row = build_row(data, None, fields)?;
            check_relations(tables, table_name, &row, None)?;
            let data = table_mut(tables, table_name)?;
            data.rows.push(row.clone());
            if let Some(trigger) = data.def.after_insert {
                trigger(tables, &row)?;
            }
            Ok(row)
        })
    }

    async fn update(&self, table_name: &str, column: &str, key: &Value, fields: &Row) -> Result<Vec<Row>, StoreError> {
        self.write(|tables| {
            let data = table(tables, table_name)?;
            let key = coerce_for(&data.def, column, key)?;
            let targets: Vec<usize> = data
                .rows
                .iter()
                .enumerate()
                .filter(|(_, r)| values_equal(r.get(column).unwrap_or(&Value::Null), &key))
                .map(|(i, _)| i)
                .collect();
            let mut updated = Vec::with_capacity(targets.len());
            for i in targets {
                let data = table_mut(tables, table_name)?;
                let existing = data.rows[i].clone();
                let row = build_row(data, Some(&existing), fields)?;
                check_relations(tables, table_name, &row, Some(i))?;
                table_mut(tables, table_name)?.rows[i] = row.clone();
                updated.push(row);
            }
            Ok(updated)
        })
    }

    async fn delete(&self, table_name: &str, column: &str, key: &Value) -> Result<u64, StoreError> {
        self.write(|tables| {
            let key = coerce_for(&table(tables, table_name)?.def, column, key)?;
            delete_where(tables, table_name, column, &[key])
        })
    }

    async fn count(&self, table_name: &str) -> Result<u64, StoreError> {
        let tables = self.read()?;
        Ok(table(&tables, table_name)?.rows.len() as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.read().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Filter, Selection};
    use serde_json::json;

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::hospital();
        store
            .insert("departments", &row(json!({"department_name": "Cardiology"})))
            .await
            .unwrap();
        store
            .insert("patients", &row(json!({"name": "Asha", "age": "34", "contact_no": "98100"})))
            .await
            .unwrap();
        store
            .insert(
                "doctors",
                &row(json!({"doctor_name": "Dr. Rao", "consultation_fee": 500, "department_id": 1})),
            )
            .await
            .unwrap();
        store
            .insert("medicines", &row(json!({"medicine_name": "Paracetamol", "price_per_unit": 2.5, "stock_quantity": 12})))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn insert_generates_keys_and_applies_defaults() {
        let store = seeded().await;
        let apt = store
            .insert(
                "appointments",
                &row(json!({"date": "2024-05-01", "timeslot": "10:00", "patient_id": 1, "doctor_id": 1})),
            )
            .await
            .unwrap();
        assert_eq!(apt["appointment_id"], json!(1));
        assert_eq!(apt["status"], json!("scheduled"));
        assert_eq!(apt["timeslot"], json!("10:00:00"));
    }

    #[tokio::test]
    async fn foreign_key_violation_creates_nothing() {
        let store = seeded().await;
        let err = store
            .insert(
                "appointments",
                &row(json!({"date": "2024-05-01", "timeslot": "11:00", "patient_id": 9999, "doctor_id": 1})),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("appointments_patient_id_fkey"), "{err}");
        assert_eq!(store.count("appointments").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn not_null_check_and_type_errors_are_rejected() {
        let store = seeded().await;
        let err = store.insert("patients", &row(json!({"name": "No Contact"}))).await.unwrap_err();
        assert!(err.to_string().contains("not-null"));
        let err = store
            .insert("patients", &row(json!({"name": "Old", "age": 200, "contact_no": "1"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("patients_age_check"));
        let err = store
            .insert("patients", &row(json!({"name": "X", "age": "abc", "contact_no": "1"})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid input syntax for type integer: \"abc\"");
        let err = store
            .insert("departments", &row(json!({"department_name": "Cardiology"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("departments_department_name_key"));
    }

    #[tokio::test]
    async fn triggers_compute_bill_total_and_decrement_stock() {
        let store = seeded().await;
        store
            .insert(
                "appointments",
                &row(json!({"date": "2024-05-01", "timeslot": "10:00", "patient_id": 1, "doctor_id": 1})),
            )
            .await
            .unwrap();
        let bill = store
            .insert(
                "bills",
                &row(json!({"appointment_id": 1, "consultant_charge": 1000, "medicine_charge": 250, "bill_date": "2024-05-01"})),
            )
            .await
            .unwrap();
        assert_eq!(bill["total_amount"].as_f64(), Some(1250.0));

        store
            .insert("prescriptions", &row(json!({"appointment_id": 1, "medicine_id": 1, "dosage": "500mg"})))
            .await
            .unwrap();
        let med = store.select_by_key("medicines", "medicine_id", &json!("1")).await.unwrap();
        assert_eq!(med[0]["stock_quantity"], json!(11));
    }

    #[tokio::test]
    async fn delete_cascades_and_sets_null() {
        let store = seeded().await;
        store
            .insert(
                "appointments",
                &row(json!({"date": "2024-05-01", "timeslot": "10:00", "patient_id": 1, "doctor_id": 1})),
            )
            .await
            .unwrap();
        assert_eq!(store.delete("departments", "department_id", &json!(1)).await.unwrap(), 1);
        let doc = store.select_by_key("doctors", "doctor_id", &json!(1)).await.unwrap();
        assert_eq!(doc[0]["department_id"], Value::Null);

        assert_eq!(store.delete("patients", "patient_id", &json!(1)).await.unwrap(), 1);
        assert_eq!(store.count("appointments").await.unwrap(), 0);
        assert_eq!(store.delete("patients", "patient_id", &json!(1)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn select_expands_filters_orders_and_limits() {
        let store = seeded().await;
        store
            .insert("medicines", &row(json!({"medicine_name": "Ibuprofen", "price_per_unit": 4, "stock_quantity": 3})))
            .await
            .unwrap();

        let mut opts = ListOptions::ordered("stock_quantity", true);
        opts.filters.push(Filter::lt("stock_quantity", 10));
        let low = store.select("medicines", &opts).await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0]["medicine_name"], json!("Ibuprofen"));

        let mut opts = ListOptions::ordered("doctor_id", true);
        opts.selection = Selection::all().expand(Expansion::new(
            "departments",
            "department_id",
            "department_id",
            &["department_name"],
        ));
        let docs = store.select("doctors", &opts).await.unwrap();
        assert_eq!(docs[0]["departments"], json!({"department_name": "Cardiology"}));

        let mut opts = ListOptions::ordered("medicine_id", false);
        opts.limit = Some(1);
        let latest = store.select("medicines", &opts).await.unwrap();
        assert_eq!(latest[0]["medicine_id"], json!(2));

        let err = store.select("wards", &ListOptions::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownTable(_)));
    }

    #[tokio::test]
    async fn update_rechecks_constraints_and_keeps_other_fields() {
        let store = seeded().await;
        let updated = store
            .update("patients", "patient_id", &json!("1"), &row(json!({"age": 35})))
            .await
            .unwrap();
        assert_eq!(updated[0]["age"], json!(35));
        assert_eq!(updated[0]["name"], json!("Asha"));

        let err = store
            .update("doctors", "doctor_id", &json!(1), &row(json!({"department_id": 42})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("doctors_department_id_fkey"));
        assert!(store
            .update("patients", "patient_id", &json!(77), &row(json!({"age": 40})))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn integers_outside_the_column_range_are_rejected() {
        let store = seeded().await;
        let err = store
            .update("medicines", "medicine_id", &json!(1), &row(json!({"stock_quantity": 2_147_483_648i64})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "value \"2147483648\" is out of range for type integer");
        let ok = store
            .update("medicines", "medicine_id", &json!(1), &row(json!({"stock_quantity": "2147483647"})))
            .await
            .unwrap();
        assert_eq!(ok[0]["stock_quantity"], json!(2_147_483_647));
    }
}
