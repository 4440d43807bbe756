//! Builds parameterized SELECT, INSERT, UPDATE, DELETE and COUNT for the PostgreSQL store.
//!
//! Rows come back as a single json column with keys in column order. Values (payloads, keys, filter operands) are
//! bound as jsonb objects and coerced with `jsonb_populate_record(NULL::<table>, $n)`, so
//! PostgreSQL applies each column's own type and rejects mismatches.

use crate::store::{Expansion, FilterOp, ListOptions, Row};
use serde_json::{Map, Value};

const MAIN_ALIAS: &str = "main";

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }
}

/// Quote identifier for PostgreSQL.
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

/// `jsonb_populate_record` source coercing parameter `$n` to the table's row type.
fn populated(table: &str, param: u32, alias: &str) -> String {
    format!("jsonb_populate_record(NULL::{}, ${}) AS {}", table, param, alias)
}

fn key_object(column: &str, key: &Value) -> Value {
    let mut m = Map::new();
    m.insert(column.to_string(), key.clone());
    Value::Object(m)
}

/// json expression for one row under `alias`: all columns or the listed ones, then one
/// correlated subquery per expansion. `json` keeps keys in column order.
fn row_expr(schema: &str, alias: &str, columns: Option<&[String]>, expand: &[Expansion], depth: usize) -> String {
    let related: Vec<(String, String)> = expand
        .iter()
        .map(|e| (e.table.clone(), expansion_subquery(schema, alias, e, depth + 1)))
        .collect();
    match columns {
        Some(cols) if !cols.is_empty() => {
            let pairs: Vec<String> = cols
                .iter()
                .map(|c| format!("{}, {}.{}", literal(c), alias, quoted(c)))
                .chain(related.iter().map(|(t, sub)| format!("{}, {}", literal(t), sub)))
                .collect();
            format!("json_build_object({})", pairs.join(", "))
        }
        _ if related.is_empty() => format!("row_to_json({})", alias),
        _ => {
            let extra: Vec<String> = related
                .iter()
                .map(|(t, sub)| format!("{} AS {}", sub, quoted(t)))
                .collect();
            format!(
                "(SELECT row_to_json(j{d}) FROM (SELECT {}.*, {}) AS j{d})",
                alias,
                extra.join(", "),
                d = depth
            )
        }
    }
}

fn expansion_subquery(schema: &str, parent: &str, e: &Expansion, depth: usize) -> String {
    let alias = format!("r{}", depth);
    let expr = row_expr(schema, &alias, Some(&e.columns), &e.nested, depth);
    format!(
        "(SELECT {} FROM {} AS {} WHERE {}.{} = {}.{} LIMIT 1)",
        expr,
        qualified_table(schema, &e.table),
        alias,
        alias,
        quoted(&e.references),
        parent,
        quoted(&e.foreign_key)
    )
}

/// SELECT with optional expansions, filters (one coerced operand each), ORDER BY and LIMIT.
pub fn select_list(schema: &str, table: &str, options: &ListOptions) -> QueryBuf {
    let mut q = QueryBuf::new();
    let tbl = qualified_table(schema, table);
    let expr = row_expr(
        schema,
        MAIN_ALIAS,
        options.selection.columns.as_deref(),
        &options.selection.expand,
        0,
    );

    let mut sources = vec![format!("{} AS {}", tbl, MAIN_ALIAS)];
    let mut where_parts = Vec::new();
    for (i, f) in options.filters.iter().enumerate() {
        let alias = format!("f{}", i);
        let n = q.push_param(key_object(&f.column, &f.value));
        sources.push(populated(&tbl, n, &alias));
        let op = match f.op {
            FilterOp::Eq => "=",
            FilterOp::Lt => "<",
        };
        where_parts.push(format!("{}.{} {} {}.{}", MAIN_ALIAS, quoted(&f.column), op, alias, quoted(&f.column)));
    }

    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    let order_clause = options
        .order_by
        .as_deref()
        .map(|c| {
            format!(
                " ORDER BY {}.{} {}",
                MAIN_ALIAS,
                quoted(c),
                if options.ascending { "ASC" } else { "DESC" }
            )
        })
        .unwrap_or_default();
    let limit_clause = options.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();

    q.sql = format!(
        "SELECT {} FROM {}{}{}{}",
        expr,
        sources.join(", "),
        where_clause,
        order_clause,
        limit_clause
    );
    q
}

/// SELECT rows whose `column` equals the coerced key.
pub fn select_by_key(schema: &str, table: &str, column: &str, key: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let tbl = qualified_table(schema, table);
    let n = q.push_param(key_object(column, key));
    q.sql = format!(
        "SELECT row_to_json({m}) FROM {} AS {m}, {} WHERE {m}.{c} = k.{c}",
        tbl,
        populated(&tbl, n, "k"),
        m = MAIN_ALIAS,
        c = quoted(column)
    );
    q
}

/// INSERT only the supplied columns so omitted ones take their DB default.
pub fn insert(schema: &str, table: &str, fields: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let tbl = qualified_table(schema, table);
    if fields.is_empty() {
        q.sql = format!("INSERT INTO {} AS {m} DEFAULT VALUES RETURNING row_to_json({m})", tbl, m = MAIN_ALIAS);
        return q;
    }
    let cols: Vec<String> = fields.keys().map(|k| quoted(k)).collect();
    let vals: Vec<String> = fields.keys().map(|k| format!("p.{}", quoted(k))).collect();
    let n = q.push_param(Value::Object(fields.clone()));
    q.sql = format!(
        "INSERT INTO {} AS {m} ({}) SELECT {} FROM {} RETURNING row_to_json({m})",
        tbl,
        cols.join(", "),
        vals.join(", "),
        populated(&tbl, n, "p"),
        m = MAIN_ALIAS
    );
    q
}

/// UPDATE by key: SET only the supplied columns. With no fields this degrades to a SELECT
/// of the current row.
pub fn update(schema: &str, table: &str, column: &str, key: &Value, fields: &Row) -> QueryBuf {
    let sets: Vec<String> = fields
        .keys()
        .filter(|k| k.as_str() != column)
        .map(|k| format!("{} = p.{}", quoted(k), quoted(k)))
        .collect();
    if sets.is_empty() {
        return select_by_key(schema, table, column, key);
    }
    let mut q = QueryBuf::new();
    let tbl = qualified_table(schema, table);
    let payload = q.push_param(Value::Object(fields.clone()));
    let key_param = q.push_param(key_object(column, key));
    q.sql = format!(
        "UPDATE {} AS {m} SET {} FROM {}, {} WHERE {m}.{c} = k.{c} RETURNING row_to_json({m})",
        tbl,
        sets.join(", "),
        populated(&tbl, payload, "p"),
        populated(&tbl, key_param, "k"),
        m = MAIN_ALIAS,
        c = quoted(column)
    );
    q
}

/// DELETE by key. Callers read the affected row count.
pub fn delete(schema: &str, table: &str, column: &str, key: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let tbl = qualified_table(schema, table);
    let n = q.push_param(key_object(column, key));
    q.sql = format!(
        "DELETE FROM {} AS {m} USING {} WHERE {m}.{c} = k.{c}",
        tbl,
        populated(&tbl, n, "k"),
        m = MAIN_ALIAS,
        c = quoted(column)
    );
    q
}

pub fn count(schema: &str, table: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!("SELECT COUNT(*) FROM {}", qualified_table(schema, table));
    q
}
