//! Table descriptor types: identity, display columns, relations and edit form per table.

use serde::Serialize;

/// Primary key type, used to validate ids taken from request paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkType {
    Int,
    BigInt,
    Text,
    Uuid,
}

/// Display formatter applied to a column's raw value.
#[derive(Clone, Debug, PartialEq)]
pub enum Format {
    /// `₹<value>`.
    Currency,
    /// `₹<value>` in bold.
    CurrencyStrong,
    /// Values strictly below `threshold` get the danger marker.
    LowStock { threshold: i64 },
    /// `<span class="status-badge <value>">`.
    StatusBadge,
}

#[derive(Clone, Debug)]
pub struct ColumnDescriptor {
    pub key: String,
    pub label: String,
    pub format: Option<Format>,
}

impl ColumnDescriptor {
    pub fn new(key: &str, label: &str) -> Self {
        ColumnDescriptor {
            key: key.to_string(),
            label: label.to_string(),
            format: None,
        }
    }

    pub fn formatted(key: &str, label: &str, format: Format) -> Self {
        ColumnDescriptor {
            format: Some(format),
            ..Self::new(key, label)
        }
    }
}

/// A related column surfaced on the parent row under `display_as`.
#[derive(Clone, Debug)]
pub struct RelationField {
    pub column: String,
    pub display_as: String,
}

/// Read-only eager expansion of a to-one relation (we hold the foreign key).
#[derive(Clone, Debug)]
pub struct RelationSpec {
    pub table: String,
    /// Our column holding the foreign key.
    pub foreign_key: String,
    /// Their column referenced by `foreign_key`.
    pub references: String,
    pub fields: Vec<RelationField>,
    pub nested: Vec<RelationSpec>,
}

impl RelationSpec {
    pub fn new(table: &str, foreign_key: &str, references: &str) -> Self {
        RelationSpec {
            table: table.to_string(),
            foreign_key: foreign_key.to_string(),
            references: references.to_string(),
            fields: Vec::new(),
            nested: Vec::new(),
        }
    }

    pub fn field(mut self, column: &str, display_as: &str) -> Self {
        self.fields.push(RelationField {
            column: column.to_string(),
            display_as: display_as.to_string(),
        });
        self
    }

    pub fn nest(mut self, relation: RelationSpec) -> Self {
        self.nested.push(relation);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum InputKind {
    Text,
    TextArea,
    Integer,
    Decimal,
    Date,
    Time,
    Select(Vec<SelectOption>),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

#[derive(Clone, Debug)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub kind: InputKind,
    pub required: bool,
    pub placeholder: Option<String>,
    pub default: Option<String>,
}

impl FormField {
    pub fn new(name: &str, label: &str, kind: InputKind) -> Self {
        FormField {
            name: name.to_string(),
            label: label.to_string(),
            kind,
            required: false,
            placeholder: None,
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn placeholder(mut self, text: &str) -> Self {
        self.placeholder = Some(text.to_string());
        self
    }

    pub fn default_value(mut self, value: &str) -> Self {
        self.default = Some(value.to_string());
        self
    }
}

/// Builds a select input from `(value, label)` pairs.
pub fn select(values: &[(&str, &str)]) -> InputKind {
    InputKind::Select(
        values
            .iter()
            .map(|(value, label)| SelectOption {
                value: value.to_string(),
                label: label.to_string(),
            })
            .collect(),
    )
}

#[derive(Clone, Debug)]
pub struct TableDescriptor {
    pub name: String,
    /// Page slug used in navigation (usually the table name).
    pub page: String,
    pub title: String,
    pub singular: String,
    pub primary_key: String,
    pub pk_type: PkType,
    pub order_by: String,
    pub ascending: bool,
    pub columns: Vec<ColumnDescriptor>,
    pub relations: Vec<RelationSpec>,
    pub form: Vec<FormField>,
}

impl TableDescriptor {
    pub fn form_field(&self, name: &str) -> Option<&FormField> {
        self.form.iter().find(|f| f.name == name)
    }
}
