//! HTTP handlers. Every handler answers with an HTML fragment except `/` (full page).

pub mod demos;
pub mod pages;
pub mod queries;
pub mod records;
pub mod theme;

use chrono::NaiveDate;

/// Date used for "today" filters and demo rows (UTC).
pub(crate) fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}
