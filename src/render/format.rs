//! Cell formatting for list views.

use crate::config::{ColumnDescriptor, Format};
use serde::Serialize;
use serde_json::{Number, Value};

/// Shown for null, absent and empty values, before any formatter runs.
pub const PLACEHOLDER: &str = "-";

/// One formatted table cell. `style` selects the markup: plain, strong or badge.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Cell {
    pub text: String,
    pub style: &'static str,
    pub class: Option<String>,
}

impl Cell {
    fn plain(text: String) -> Self {
        Cell {
            text,
            style: "plain",
            class: None,
        }
    }
}

fn number_text(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{:.0}", f),
        Some(f) => format!("{:.2}", f),
        None => n.to_string(),
    }
}

/// Display text for a value, or `None` for null, empty strings and missing values.
pub fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(number_text(n)),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

pub(crate) fn rupees(amount: f64) -> String {
    match Number::from_f64(amount) {
        Some(n) => format!("₹{}", number_text(&n)),
        None => format!("₹{}", PLACEHOLDER),
    }
}

/// Formats `value` for `column`.
pub fn cell(column: &ColumnDescriptor, value: Option<&Value>) -> Cell {
    let Some(text) = value.and_then(value_text) else {
        return Cell::plain(PLACEHOLDER.to_string());
    };
    match &column.format {
        None => Cell::plain(text),
        Some(Format::Currency) => Cell::plain(format!("₹{}", text)),
        Some(Format::CurrencyStrong) => Cell {
            text: format!("₹{}", text),
            style: "strong",
            class: None,
        },
        Some(Format::LowStock { threshold }) => {
            let low = value
                .and_then(|v| match v {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                })
                .map(|n| n < *threshold as f64)
                .unwrap_or(false);
            Cell {
                text,
                style: "plain",
                class: low.then(|| "text-danger".to_string()),
            }
        }
        Some(Format::StatusBadge) => Cell {
            class: Some(format!("status-badge {}", text)),
            text,
            style: "badge",
        },
    }
}
