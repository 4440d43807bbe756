//! Catalog validation: identifiers, primary keys, relation targets and form consistency.

use crate::config::{InputKind, RelationSpec, TableDescriptor};
use crate::error::ConfigError;
use crate::sql::is_identifier;
use std::collections::HashSet;

pub fn validate(tables: &[TableDescriptor]) -> Result<(), ConfigError> {
    if tables.is_empty() {
        return Err(ConfigError::Validation("at least one table required".into()));
    }
    let table_names: HashSet<&str> = tables.iter().map(|t| t.name.as_str()).collect();

    let mut seen_names = HashSet::new();
    let mut seen_pages = HashSet::new();
    for t in tables {
        if !seen_names.insert(t.name.as_str()) {
            return Err(ConfigError::DuplicateTable(t.name.clone()));
        }
        if !seen_pages.insert(t.page.as_str()) {
            return Err(ConfigError::Validation(format!("duplicate page slug: {}", t.page)));
        }
        check_identifier("table", &t.name)?;
        check_identifier("column", &t.order_by)?;

        // The first display column carries the row id for the edit/delete actions.
        match t.columns.first() {
            Some(first) if first.key == t.primary_key => {}
            _ => {
                return Err(ConfigError::InvalidPrimaryKey {
                    table: t.name.clone(),
                    column: t.primary_key.clone(),
                })
            }
        }
        check_identifier("column", &t.primary_key)?;

        let mut keys = HashSet::new();
        for c in &t.columns {
            if !keys.insert(c.key.as_str()) {
                return Err(ConfigError::Validation(format!("{}: duplicate column {}", t.name, c.key)));
            }
        }

        for rel in &t.relations {
            validate_relation(&t.name, rel, &table_names)?;
        }

        let mut field_names = HashSet::new();
        for f in &t.form {
            check_identifier("form field", &f.name)?;
            if !field_names.insert(f.name.as_str()) {
                return Err(ConfigError::Validation(format!("{}: duplicate form field {}", t.name, f.name)));
            }
            if let InputKind::Select(options) = &f.kind {
                if options.is_empty() {
                    return Err(ConfigError::Validation(format!("{}.{}: select without options", t.name, f.name)));
                }
                if let Some(default) = &f.default {
                    if !options.iter().any(|o| &o.value == default) {
                        return Err(ConfigError::Validation(format!(
                            "{}.{}: default '{}' is not an option",
                            t.name, f.name, default
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}

fn validate_relation(owner: &str, rel: &RelationSpec, table_names: &HashSet<&str>) -> Result<(), ConfigError> {
    if !table_names.contains(rel.table.as_str()) {
        return Err(ConfigError::MissingReference {
            kind: "table",
            id: format!("{} -> {}", owner, rel.table),
        });
    }
    check_identifier("column", &rel.foreign_key)?;
    check_identifier("column", &rel.references)?;
    for f in &rel.fields {
        check_identifier("column", &f.column)?;
    }
    for nested in &rel.nested {
        validate_relation(&rel.table, nested, table_names)?;
    }
    Ok(())
}

fn check_identifier(kind: &str, name: &str) -> Result<(), ConfigError> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("invalid {} identifier: {:?}", kind, name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{hospital_tables, ColumnDescriptor};

    #[test]
    fn hospital_catalog_is_valid() {
        validate(&hospital_tables()).unwrap();
    }

    #[test]
    fn rejects_primary_key_that_is_not_first_column() {
        let mut tables = hospital_tables();
        tables[0].columns.swap(0, 1);
        let err = validate(&tables).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPrimaryKey { .. }));
    }

    #[test]
    fn rejects_relation_to_unknown_table() {
        let mut tables = hospital_tables();
        tables.retain(|t| t.name != "departments");
        let err = validate(&tables).unwrap_err();
        assert!(matches!(err, ConfigError::MissingReference { kind: "table", .. }));
    }

    #[test]
    fn rejects_duplicate_tables_and_bad_identifiers() {
        let mut tables = hospital_tables();
        tables.push(tables[0].clone());
        assert!(matches!(validate(&tables).unwrap_err(), ConfigError::DuplicateTable(_)));

        let mut tables = hospital_tables();
        tables[0].columns[0] = ColumnDescriptor::new("patient id", "ID");
        tables[0].primary_key = "patient id".into();
        assert!(matches!(validate(&tables).unwrap_err(), ConfigError::Validation(_)));
    }
}
