use crate::backend::{Client, QueryBuilder, SqlConnection, TableInfo};
use crate::builder::SqlQuery;
use crate::condition::Condition;
use crate::dialect::{set_clause, Dialect, PostgresDialect, SqlServerDialect};
use crate::error::{QueryError, Result, SchemaError};
use crate::record::Record;
use crate::schema::Index;
use crate::value::FieldValue;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// [`Client`] over one SQL connection, speaking `dialect`.
pub struct SqlClient<C: SqlConnection> {
    connection: Arc<Mutex<C>>,
    dialect: Arc<dyn Dialect>,
}

impl<C: SqlConnection> SqlClient<C> {
    pub fn new(connection: C, dialect: Arc<dyn Dialect>) -> Self {
        Self {
            connection: Arc::new(Mutex::new(connection)),
            dialect,
        }
    }

    pub fn postgres(connection: C) -> Self {
        Self::new(connection, Arc::new(PostgresDialect))
    }

    pub fn sql_server(connection: C) -> Self {
        Self::new(connection, Arc::new(SqlServerDialect))
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    async fn exec(&self, table: &str, sql: &str) -> Result<u64> {
        debug!(driver = self.dialect.name(), table, sql, "execute");
        self.connection.lock().await.execute(sql).await
    }

    async fn fetch_one(&self, table: &str, sql: &str) -> Result<Record> {
        debug!(driver = self.dialect.name(), table, sql, "query");
        let rows = self.connection.lock().await.query(sql).await?;
        rows.into_iter().next().ok_or(QueryError::NoRows)
    }

    fn by_id(&self, id: &FieldValue) -> std::result::Result<String, SchemaError> {
        Ok(format!("{} = {}", self.dialect.id_column(), self.dialect.quote(id)?))
    }
}

#[async_trait]
impl<C: SqlConnection + 'static> Client for SqlClient<C> {
    async fn create_table(&self, name: &str, info: TableInfo) -> Result<()> {
        let mut spec = match info {
            TableInfo::Table(spec) => spec,
            TableInfo::Collection(_) => {
                return Err(SchemaError::UnsupportedTableInfo(self.dialect.name().to_string()).into());
            }
        };
        spec.name = name.to_string();

        let sql = self.dialect.create_table_sql(&spec)?;
        self.exec(name, &sql).await.map(|_| ())
    }

    async fn ensure_index(&self, name: &str, index: &Index) -> Result<()> {
        let sql = self.dialect.create_index_sql(name, index)?;
        self.exec(name, &sql).await.map(|_| ())
    }

    async fn insert(&self, name: &str, data: &mut Record) -> Result<()> {
        let sql = self.dialect.insert_sql(name, data)?;
        let mut stored = self.fetch_one(name, &sql).await?;
        self.dialect.normalize_returned(&mut stored);
        data.merge(stored);
        Ok(())
    }

    async fn find_by_id(&self, name: &str, id: &FieldValue) -> Result<Record> {
        let sql = format!("SELECT * FROM {} WHERE {}", name, self.by_id(id)?);
        self.fetch_one(name, &sql).await
    }

    async fn update_by_id(&self, name: &str, id: &FieldValue, data: &Record) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            name,
            set_clause(self.dialect.as_ref(), data)?,
            self.by_id(id)?
        );
        self.exec(name, &sql).await.map(|_| ())
    }

    async fn delete_by_id(&self, name: &str, id: &FieldValue) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE {}", name, self.by_id(id)?);
        self.exec(name, &sql).await.map(|_| ())
    }

    async fn query(&self, name: &str, conditions: Vec<Condition>) -> Result<Box<dyn QueryBuilder>> {
        Ok(Box::new(SqlQuery::new(
            self.connection.clone(),
            self.dialect.clone(),
            name,
            conditions,
        )))
    }

    async fn close(&self) -> Result<()> {
        self.connection.lock().await.close().await
    }
}
