//! PostgreSQL row source.
//!
//! Converts each column to a [`Value`] by its Postgres type name. Columns of
//! any other type are dropped from the row.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use futures::TryStreamExt;
use overseer_core::config::ConnectionConfig;
use overseer_core::{Row, Value};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow, PgSslMode};
use sqlx::{Column, PgPool, Row as _, TypeInfo};
use tracing::{debug, info};

use crate::error::SourceError;
use crate::source::RowSource;

/// Column types the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Bool,
    Text,
    Bytes,
    TimestampTz,
    Timestamp,
}

impl ColumnKind {
    fn from_type_name(name: &str) -> Option<Self> {
        let kind = match name {
            "INT2" => ColumnKind::Int2,
            "INT4" => ColumnKind::Int4,
            "INT8" => ColumnKind::Int8,
            "FLOAT4" => ColumnKind::Float4,
            "FLOAT8" => ColumnKind::Float8,
            "BOOL" => ColumnKind::Bool,
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => ColumnKind::Text,
            "BYTEA" => ColumnKind::Bytes,
            "TIMESTAMPTZ" => ColumnKind::TimestampTz,
            "TIMESTAMP" => ColumnKind::Timestamp,
            _ => return None,
        };
        Some(kind)
    }
}

pub struct PgRowSource {
    pool: PgPool,
}

impl PgRowSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool for the configured database.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, SourceError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(connect_options(config)?)
            .await?;
        info!("PostgreSQL connected: {}:{}/{}", config.host, config.port, config.name);
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Connection options from config. Credentials are passed as-is, never
/// spliced into a URL.
pub fn connect_options(config: &ConnectionConfig) -> Result<PgConnectOptions, SourceError> {
    let ssl_mode: PgSslMode = config.ssl_mode.parse()?;
    Ok(PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.pass)
        .database(&config.name)
        .ssl_mode(ssl_mode))
}

#[async_trait]
impl RowSource for PgRowSource {
    async fn query(&self, query: &str, cursor: i64, limit: usize) -> Result<Vec<Row>, SourceError> {
        let mut stream = sqlx::query(query).bind(cursor).fetch(&self.pool);
        let mut rows = Vec::new();
        while rows.len() < limit {
            match stream.try_next().await? {
                Some(pg_row) => rows.push(convert_row(&pg_row)),
                None => break,
            }
        }
        Ok(rows)
    }
}

fn convert_row(pg_row: &PgRow) -> Row {
    let mut row = Row::with_capacity(pg_row.len());
    for column in pg_row.columns() {
        let type_name = column.type_info().name();
        match convert_column(pg_row, column.ordinal(), type_name) {
            Some(value) => row.insert(column.name(), value),
            None => debug!(column = column.name(), type_name, "dropping column of unsupported type"),
        }
    }
    row
}

fn convert_column(row: &PgRow, idx: usize, type_name: &str) -> Option<Value> {
    let value = match ColumnKind::from_type_name(type_name)? {
        ColumnKind::Int2 => row.try_get::<Option<i16>, _>(idx).ok()?.map(|v| Value::Int(v.into())),
        ColumnKind::Int4 => row.try_get::<Option<i32>, _>(idx).ok()?.map(|v| Value::Int(v.into())),
        ColumnKind::Int8 => row.try_get::<Option<i64>, _>(idx).ok()?.map(Value::Int),
        ColumnKind::Float4 => row.try_get::<Option<f32>, _>(idx).ok()?.map(|v| Value::Float(v.into())),
        ColumnKind::Float8 => row.try_get::<Option<f64>, _>(idx).ok()?.map(Value::Float),
        ColumnKind::Bool => row.try_get::<Option<bool>, _>(idx).ok()?.map(Value::Bool),
        ColumnKind::Text => row.try_get::<Option<String>, _>(idx).ok()?.map(Value::Text),
        ColumnKind::Bytes => row.try_get::<Option<Vec<u8>>, _>(idx).ok()?.map(Value::Bytes),
        ColumnKind::TimestampTz => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)
            .ok()?
            .map(Value::Timestamp),
        ColumnKind::Timestamp => row
            .try_get::<Option<NaiveDateTime>, _>(idx)
            .ok()?
            .map(|ts| Value::Timestamp(ts.and_utc())),
    };
    Some(value.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_type_names() {
        assert_eq!(ColumnKind::from_type_name("INT8"), Some(ColumnKind::Int8));
        assert_eq!(ColumnKind::from_type_name("VARCHAR"), Some(ColumnKind::Text));
        assert_eq!(ColumnKind::from_type_name("BPCHAR"), Some(ColumnKind::Text));
        assert_eq!(ColumnKind::from_type_name("TIMESTAMP"), Some(ColumnKind::Timestamp));
        assert_eq!(ColumnKind::from_type_name("BYTEA"), Some(ColumnKind::Bytes));
    }

    fn connection(user: &str, pass: &str) -> ConnectionConfig {
        ConnectionConfig {
            driver: "postgres".into(),
            host: "db.local".into(),
            port: 5433,
            name: "metrics".into(),
            user: user.into(),
            pass: pass.into(),
            ssl_mode: "disable".into(),
            max_connections: 4,
        }
    }

    #[test]
    fn options_keep_reserved_characters_in_credentials() {
        let options = connect_options(&connection("ops@corp", "p@ss/w:rd?#")).unwrap();
        assert_eq!(options.get_host(), "db.local");
        assert_eq!(options.get_port(), 5433);
        assert_eq!(options.get_username(), "ops@corp");
        assert_eq!(options.get_database(), Some("metrics"));
        assert!(matches!(options.get_ssl_mode(), PgSslMode::Disable));
    }

    #[test]
    fn unknown_ssl_mode_is_an_error() {
        let mut config = connection("u", "p");
        config.ssl_mode = "sometimes".into();
        assert!(connect_options(&config).is_err());
    }

    #[test]
    fn unsupported_type_names() {
        assert_eq!(ColumnKind::from_type_name("JSONB"), None);
        assert_eq!(ColumnKind::from_type_name("UUID"), None);
        assert_eq!(ColumnKind::from_type_name("NUMERIC"), None);
    }
}
