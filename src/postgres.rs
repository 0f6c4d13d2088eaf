use crate::backend::{Client, Connector, SqlConnection};
use crate::config::{DbConfig, Driver};
use crate::error::{QueryError, Result};
use crate::record::{Record, RecordSet};
use crate::sql_client::SqlClient;
use crate::value::FieldValue;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Decimal;
use sqlx::{Column, Row, TypeInfo};
use tracing::{debug, warn};

/// PostgreSQL connection backed by a sqlx pool.
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    /// Create a new PostgreSQL backend with connection pool
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;

        Ok(Self { pool })
    }

    pub fn is_connected(&self) -> bool {
        !self.pool.is_closed()
    }

    /// Read one column of `row` into the nearest [`FieldValue`].
    ///
    /// Arrays come back as lists rather than `{..}` literals and NUMERIC as
    /// its decimal text. Types without a decoder here read as null.
    fn convert_value(row: &PgRow, index: usize) -> FieldValue {
        if let Ok(value) = row.try_get::<Option<Value>, _>(index) {
            return value.map(FieldValue::Json).unwrap_or(FieldValue::Null);
        }
        if let Ok(value) = row.try_get::<Option<String>, _>(index) {
            return value.into();
        }
        if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
            return value.into();
        }
        if let Ok(value) = row.try_get::<Option<i32>, _>(index) {
            return value.into();
        }
        if let Ok(value) = row.try_get::<Option<i16>, _>(index) {
            return value.into();
        }
        if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
            return value.into();
        }
        if let Ok(value) = row.try_get::<Option<f32>, _>(index) {
            return value.into();
        }
        if let Ok(value) = row.try_get::<Option<Decimal>, _>(index) {
            return value.map(|d| d.to_string()).into();
        }
        if let Ok(value) = row.try_get::<Option<bool>, _>(index) {
            return value.into();
        }
        if let Ok(value) = row.try_get::<Option<Vec<u8>>, _>(index) {
            return value.map(FieldValue::Bytes).unwrap_or(FieldValue::Null);
        }
        if let Ok(value) = row.try_get::<Option<Vec<String>>, _>(index) {
            return value.into();
        }
        if let Ok(value) = row.try_get::<Option<Vec<i64>>, _>(index) {
            return value.into();
        }
        if let Ok(value) = row.try_get::<Option<Vec<i32>>, _>(index) {
            return value.into();
        }
        if let Ok(value) = row.try_get::<Option<Vec<f64>>, _>(index) {
            return value.into();
        }
        if let Ok(value) = row.try_get::<Option<Vec<bool>>, _>(index) {
            return value.into();
        }
        if let Ok(value) = row.try_get::<Option<Vec<Value>>, _>(index) {
            return value
                .map(|items| FieldValue::List(items.into_iter().map(FieldValue::Json).collect()))
                .unwrap_or(FieldValue::Null);
        }

        let column = &row.columns()[index];
        warn!(
            column = column.name(),
            pg_type = column.type_info().name(),
            "unsupported column type, reading as null"
        );
        FieldValue::Null
    }

    /// Convert PostgreSQL row to a record, keeping column order
    fn convert_row(row: &PgRow) -> Record {
        let mut record = Record::new();

        for column in row.columns() {
            record.set(column.name(), Self::convert_value(row, column.ordinal()));
        }

        record
    }
}

#[async_trait]
impl SqlConnection for PostgresBackend {
    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let result = sqlx::query(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn query(&mut self, sql: &str) -> Result<RecordSet> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(Self::convert_row).collect())
    }

    async fn close(&mut self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Opens a PostgreSQL [`SqlClient`] per model operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgConnector;

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self, config: &DbConfig) -> Result<Box<dyn Client>> {
        if config.driver != Driver::Postgres {
            return Err(QueryError::Connection(format!(
                "driver {} cannot be opened by the PostgreSQL connector",
                config.driver
            )));
        }

        debug!(host = %config.host, database = %config.database, "connecting");
        let backend = PostgresBackend::new(&config.connection_url()).await?;
        Ok(Box::new(SqlClient::postgres(backend)))
    }
}
