use crate::condition::{Condition, Sort};
use crate::config::DbConfig;
use crate::error::Result;
use crate::record::{Record, RecordSet};
use crate::schema::{Index, TableSpec};
use crate::value::FieldValue;
use async_trait::async_trait;

/// Raw SQL connection consumed by [`SqlClient`](crate::sql_client::SqlClient)
#[async_trait]
pub trait SqlConnection: Send {
    /// Execute a statement and return the affected row count
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Run a query; columns of each row are in the driver's order
    async fn query(&mut self, sql: &str) -> Result<RecordSet>;

    /// Close the connection
    async fn close(&mut self) -> Result<()>;
}

/// Structure to create a table or collection with
#[derive(Debug, Clone, PartialEq)]
pub enum TableInfo {
    /// Column list for SQL backends
    Table(TableSpec),
    /// Optional collection options for the document store
    Collection(Option<bson::Document>),
}

/// Backend-neutral client used by the model layer.
#[async_trait]
pub trait Client: Send + Sync {
    /// Create `name` unless it already exists
    async fn create_table(&self, name: &str, info: TableInfo) -> Result<()>;

    /// Create `index` on `name` unless it already exists
    async fn ensure_index(&self, name: &str, index: &Index) -> Result<()>;

    /// Insert `data`. On success `data` holds the stored row, generated
    /// identifier included.
    async fn insert(&self, name: &str, data: &mut Record) -> Result<()>;

    async fn find_by_id(&self, name: &str, id: &FieldValue) -> Result<Record>;

    async fn update_by_id(&self, name: &str, id: &FieldValue, data: &Record) -> Result<()>;

    async fn delete_by_id(&self, name: &str, id: &FieldValue) -> Result<()>;

    /// Query builder over `name` filtered by every condition
    async fn query(&self, name: &str, conditions: Vec<Condition>) -> Result<Box<dyn QueryBuilder>>;

    /// Release the session
    async fn close(&self) -> Result<()>;
}

/// Fetch and bulk-write operations over a filtered table or collection.
#[async_trait]
pub trait QueryBuilder: Send {
    /// Replace the sort list
    fn order_by(&mut self, sorts: Vec<Sort>);

    /// Limit the number of fetched rows; zero or less means no limit
    fn limit(&mut self, n: i64);

    /// Skip the first `n` matching rows; zero or less means none
    fn skip(&mut self, n: i64);

    /// Number of matching rows
    async fn count(&mut self) -> Result<u64>;

    /// First matching row
    async fn first(&mut self) -> Result<Record>;

    /// Every matching row
    async fn all(&mut self) -> Result<RecordSet>;

    /// Set `data` on every matching row; returns the affected count
    async fn update(&mut self, data: &Record) -> Result<u64>;

    /// Remove every matching row; returns the affected count
    async fn delete(&mut self) -> Result<u64>;
}

/// Opens a [`Client`] for a configuration.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &DbConfig) -> Result<Box<dyn Client>>;
}
