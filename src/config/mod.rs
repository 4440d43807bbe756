pub mod types;
pub mod catalog;
pub mod validator;

pub use types::*;
pub use catalog::*;
pub use validator::*;

use crate::error::ConfigError;
use std::collections::HashMap;

/// Validated set of table descriptors with lookup by table name and page slug.
#[derive(Clone, Debug)]
pub struct Catalog {
    pub tables: Vec<TableDescriptor>,
    by_name: HashMap<String, usize>,
    by_page: HashMap<String, usize>,
}

impl Catalog {
    pub fn resolve(tables: Vec<TableDescriptor>) -> Result<Self, ConfigError> {
        validate(&tables)?;
        let by_name = tables.iter().enumerate().map(|(i, t)| (t.name.clone(), i)).collect();
        let by_page = tables.iter().enumerate().map(|(i, t)| (t.page.clone(), i)).collect();
        Ok(Catalog {
            tables,
            by_name,
            by_page,
        })
    }

    pub fn hospital() -> Result<Self, ConfigError> {
        Self::resolve(hospital_tables())
    }

    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.by_name.get(name).map(|&i| &self.tables[i])
    }

    pub fn table_for_page(&self, page: &str) -> Option<&TableDescriptor> {
        self.by_page.get(page).map(|&i| &self.tables[i])
    }
}
