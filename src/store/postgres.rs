//! PostgreSQL implementation of [`RemoteStore`].

use crate::error::{AppError, StoreError};
use crate::sql::{self, QueryBuf};
use crate::store::{ListOptions, RemoteStore, Row};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    schema: String,
}

impl PgStore {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        PgStore {
            pool,
            schema: schema.into(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_rows(&self, q: &QueryBuf) -> Result<Vec<Row>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, Value>(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let values = query.fetch_all(&self.pool).await?;
        values.into_iter().map(into_row).collect()
    }
}

fn into_row(v: Value) -> Result<Row, StoreError> {
    match v {
        Value::Object(m) => Ok(m),
        other => Err(StoreError::Rejected(format!("expected a row object, got {}", other))),
    }
}

#[async_trait]
impl RemoteStore for PgStore {
    async fn select(&self, table: &str, options: &ListOptions) -> Result<Vec<Row>, StoreError> {
        let q = sql::select_list(&self.schema, table, options);
        self.fetch_rows(&q).await
    }

    async fn select_by_key(&self, table: &str, column: &str, key: &Value) -> Result<Vec<Row>, StoreError> {
        let q = sql::select_by_key(&self.schema, table, column, key);
        self.fetch_rows(&q).await
    }

    async fn insert(&self, table: &str, fields: &Row) -> Result<Row, StoreError> {
        let q = sql::insert(&self.schema, table, fields);
        self.fetch_rows(&q)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Rejected(format!("insert into {} returned no row", table)))
    }

    async fn update(&self, table: &str, column: &str, key: &Value, fields: &Row) -> Result<Vec<Row>, StoreError> {
        let q = sql::update(&self.schema, table, column, key, fields);
        self.fetch_rows(&q).await
    }

    async fn delete(&self, table: &str, column: &str, key: &Value) -> Result<u64, StoreError> {
        let q = sql::delete(&self.schema, table, column, key);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let done = query.execute(&self.pool).await?;
        Ok(done.rows_affected())
    }

    async fn count(&self, table: &str) -> Result<u64, StoreError> {
        let q = sql::count(&self.schema, table);
        tracing::debug!(sql = %q.sql, "query");
        let n: i64 = sqlx::query_scalar(&q.sql).fetch_one(&self.pool).await?;
        Ok(n.max(0) as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let path_start = url.rfind('/').ok_or_else(|| AppError::BadRequest("DATABASE_URL: no path".into()))? + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres", base), db_name.to_string()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_url_points_at_postgres_database() {
        let (admin, db) = parse_db_name_from_url("postgres://u:p@localhost:5432/hospital?sslmode=disable").unwrap();
        assert_eq!(admin, "postgres://u:p@localhost:5432/postgres");
        assert_eq!(db, "hospital");
    }

    #[test]
    fn non_object_rows_are_rejected() {
        assert!(into_row(serde_json::json!({"a": 1})).is_ok());
        assert!(matches!(into_row(Value::Null), Err(StoreError::Rejected(_))));
    }
}
