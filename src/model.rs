//! Typed facade binding one schema type to one table or collection.

use crate::backend::{Client, Connector, QueryBuilder, TableInfo};
use crate::condition::{Condition, Sort};
use crate::config::{DbConfig, Driver};
use crate::error::{QueryError, Result};
use crate::mapping::{fill_schema, table_spec, to_record};
use crate::schema::{descriptor, Index, Schema};
use crate::value::FieldValue;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Adjusts a model after the table name is guessed, e.g. to rename the table.
pub type Configurator<S> = Box<dyn FnOnce(&mut Model<S>) + Send>;

/// Namespace used for SQL Server tables when the schema names none
pub const DEFAULT_NAMESPACE: &str = "dbo";

/// Close `client`, logging a failure instead of letting it replace `result`.
async fn finish<T>(client: Box<dyn Client>, table: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = client.close().await {
        warn!(table, error = %e, "failed to close client");
    }
    result
}

pub struct Model<S: Schema + Default> {
    config: DbConfig,
    connector: Arc<dyn Connector>,
    table: String,
    _schema: PhantomData<fn() -> S>,
}

impl<S: Schema + Default> Model<S> {
    /// Bind `S` to its guessed table on the backend `connector` opens.
    pub fn new(config: DbConfig, connector: Arc<dyn Connector>) -> Self {
        Self::with_configurators(config, connector, Vec::new())
    }

    /// Build a model, running `configurators` after the table name guess.
    /// The configured prefix is applied last.
    pub fn with_configurators(
        config: DbConfig,
        connector: Arc<dyn Connector>,
        configurators: Vec<Configurator<S>>,
    ) -> Self {
        let table = Self::guess_table_name(config.driver);
        let mut model = Self {
            config,
            connector,
            table,
            _schema: PhantomData,
        };

        for configure in configurators {
            configure(&mut model);
        }

        if model.config.has_prefix() {
            model.table = model.prefixed(&model.table);
        }

        model
    }

    fn guess_table_name(driver: Driver) -> String {
        let table = descriptor::<S>().guess_table_name();

        match driver {
            Driver::SqlServer => {
                let schema = S::default();
                let namespace = schema.namespace().unwrap_or(DEFAULT_NAMESPACE);
                format!("{}.{}", namespace, table)
            }
            Driver::Mongo | Driver::Postgres => table,
        }
    }

    /// `<prefix>_<table>`; a SQL Server namespace stays in front.
    fn prefixed(&self, table: &str) -> String {
        let prefix = &self.config.prefix;
        match (self.config.driver, table.split_once('.')) {
            (Driver::SqlServer, Some((namespace, name))) => {
                format!("{}.{}_{}", namespace, prefix, name)
            }
            _ => format!("{}_{}", prefix, table),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn set_table_name(&mut self, table: impl Into<String>) {
        self.table = table.into();
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    async fn client(&self) -> Result<Box<dyn Client>> {
        self.connector.connect(&self.config).await
    }

    /// Create the table when the backend needs one, then ensure every index.
    pub async fn ensure_index(&self, indices: &[Index]) -> Result<()> {
        let client = self.client().await?;
        let result = self.ensure_with(client.as_ref(), indices).await;
        finish(client, &self.table, result).await
    }

    async fn ensure_with(&self, client: &dyn Client, indices: &[Index]) -> Result<()> {
        if let Some(dialect) = self.config.driver.dialect() {
            let key_name = S::default().key_name().to_string();
            let spec = table_spec(&descriptor::<S>(), &self.table, &key_name, dialect.as_ref())?;
            info!(table = %self.table, columns = spec.columns.len(), "ensuring table");
            client.create_table(&self.table, TableInfo::Table(spec)).await?;
        }

        for index in indices {
            info!(table = %self.table, index = %index.name(), "ensuring index");
            client.ensure_index(&self.table, index).await?;
        }

        Ok(())
    }

    /// Load the record with `id`.
    pub async fn find(&self, id: impl Into<FieldValue>) -> Result<S> {
        let id = id.into();
        debug!(table = %self.table, ?id, "find");

        let client = self.client().await?;
        let result: Result<S> = async {
            let record = client.find_by_id(&self.table, &id).await?;
            let mut schema = S::default();
            fill_schema(&mut schema, &record)?;
            Ok(schema)
        }
        .await;

        finish(client, &self.table, result).await
    }

    /// Insert `data`; generated columns such as the identifier are written
    /// back into it.
    pub async fn create(&self, data: &mut S) -> Result<()> {
        let mut record = to_record(data, true)?;
        debug!(table = %self.table, columns = ?record.columns(), "create");

        let client = self.client().await?;
        let result = client.insert(&self.table, &mut record).await;
        let result = finish(client, &self.table, result).await;

        result?;
        fill_schema(data, &record)?;
        Ok(())
    }

    /// Write every field of `data` to the record with its identifier.
    pub async fn update(&self, data: &S) -> Result<()> {
        let record = to_record(data, false)?;
        debug!(table = %self.table, columns = ?record.columns(), "update");

        let client = self.client().await?;
        let result = client.update_by_id(&self.table, &data.id(), &record).await;
        finish(client, &self.table, result).await
    }

    pub async fn delete(&self, data: &S) -> Result<()> {
        debug!(table = %self.table, "delete");

        let client = self.client().await?;
        let result = client.delete_by_id(&self.table, &data.id()).await;
        finish(client, &self.table, result).await
    }

    /// Start a query over rows matching every condition.
    pub async fn query(&self, conditions: Vec<Condition>) -> Result<Builder<S>> {
        let client = self.client().await?;
        match client.query(&self.table, conditions).await {
            Ok(inner) => Ok(Builder {
                client,
                inner,
                table: self.table.clone(),
                _schema: PhantomData,
            }),
            Err(e) => finish(client, &self.table, Err(e)).await,
        }
    }
}

/// Typed query over a model's table. Terminal operations consume the
/// builder and release its connection.
pub struct Builder<S: Schema + Default> {
    client: Box<dyn Client>,
    inner: Box<dyn QueryBuilder>,
    table: String,
    _schema: PhantomData<fn() -> S>,
}

impl<S: Schema + Default> Builder<S> {
    pub fn order_by(mut self, sorts: Vec<Sort>) -> Self {
        self.inner.order_by(sorts);
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.inner.limit(n);
        self
    }

    pub fn skip(mut self, n: i64) -> Self {
        self.inner.skip(n);
        self
    }

    pub async fn count(mut self) -> Result<u64> {
        let result = self.inner.count().await;
        finish(self.client, &self.table, result).await
    }

    pub async fn first(mut self) -> Result<S> {
        let result = match self.inner.first().await {
            Ok(record) => {
                let mut schema = S::default();
                fill_schema(&mut schema, &record)
                    .map(|_| schema)
                    .map_err(QueryError::from)
            }
            Err(e) => Err(e),
        };
        finish(self.client, &self.table, result).await
    }

    /// Every matching row, each decoded into its own instance.
    pub async fn all(mut self) -> Result<Vec<S>> {
        let result = match self.inner.all().await {
            Ok(records) => records
                .iter()
                .map(|record| {
                    let mut schema = S::default();
                    fill_schema(&mut schema, record)?;
                    Ok(schema)
                })
                .collect::<Result<Vec<_>>>(),
            Err(e) => Err(e),
        };
        finish(self.client, &self.table, result).await
    }

    /// Write the non-key fields of `data` to every matching row.
    pub async fn update(mut self, data: &S) -> Result<u64> {
        let result = match to_record(data, false) {
            Ok(record) => self.inner.update(&record).await,
            Err(e) => Err(e.into()),
        };
        finish(self.client, &self.table, result).await
    }

    pub async fn delete(mut self) -> Result<u64> {
        let result = self.inner.delete().await;
        finish(self.client, &self.table, result).await
    }
}
