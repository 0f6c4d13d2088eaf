//! octopus - storage-agnostic data mapping for MongoDB, PostgreSQL and SQL Server
//!
//! octopus maps plain Rust structs onto tables and collections. Each schema
//! describes its fields once; the crate derives table definitions, writes
//! records, decodes rows back into typed values and builds filtered queries
//! for whichever backend the configuration names.
//!
//! # Architecture
//!
//! - **Schema → Descriptor**: field names, kinds and tag options, cached per type
//! - **Dialects**: quoting, native types and DDL for PostgreSQL and SQL Server
//! - **Clients**: one [`Client`] contract over SQL connections and document stores
//! - **Model facade**: typed find/create/update/delete plus a chainable query builder
//!
//! # Example
//!
//! ```rust,no_run
//! use octopus::prelude::*;
//! use octopus::schema::{FieldKind, SchemaDescriptor};
//!
//! #[derive(Debug, Default)]
//! struct Player {
//!     id: i64,
//!     name: String,
//!     age: i32,
//! }
//!
//! impl Schema for Player {
//!     fn describe() -> SchemaDescriptor {
//!         SchemaDescriptor::builder("Player")
//!             .field("ID", FieldKind::I64, "")
//!             .field("Name", FieldKind::String, "notnull")
//!             .field("Age", FieldKind::I32, "")
//!             .build()
//!     }
//!
//!     fn id(&self) -> FieldValue {
//!         self.id.into()
//!     }
//!
//!     fn get_field(&self, field: &str) -> Option<FieldValue> {
//!         match field {
//!             "ID" => Some(self.id.into()),
//!             "Name" => Some(self.name.clone().into()),
//!             "Age" => Some(self.age.into()),
//!             _ => None,
//!         }
//!     }
//!
//!     fn set_field(&mut self, field: &str, value: FieldValue) -> std::result::Result<(), SchemaError> {
//!         match field {
//!             "ID" => self.id = value.decode()?,
//!             "Name" => self.name = value.decode()?,
//!             "Age" => self.age = value.decode()?,
//!             _ => {}
//!         }
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     #[cfg(feature = "postgres")]
//!     {
//!         use octopus::postgres::PgConnector;
//!         use std::sync::Arc;
//!
//!         let config = DbConfig::new(Driver::Postgres, "localhost", "game");
//!         let players = Model::<Player>::new(config, Arc::new(PgConnector));
//!         players.ensure_index(&[Index::new(vec!["name"])]).await?;
//!
//!         let mut player = Player { name: "Alice".into(), age: 19, ..Default::default() };
//!         players.create(&mut player).await?;
//!
//!         let teens = players
//!             .query(vec![Condition::eq("age", 19)])
//!             .await?
//!             .order_by(vec![Sort::asc("name")])
//!             .limit(10)
//!             .all()
//!             .await?;
//!         println!("{} players aged 19", teens.len());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Backend Support
//!
//! The SQL layer runs over any [`SqlConnection`]; the document layer over any
//! [`DocumentSession`](mongo::DocumentSession). A sqlx PostgreSQL connection
//! ships behind a feature:
//!
//! ```toml
//! [dependencies]
//! octopus = { version = "0.1", features = ["postgres"] }
//! ```

pub mod backend;
pub mod builder;
pub mod coder;
pub mod condition;
pub mod config;
pub mod dialect;
pub mod error;
pub mod mapping;
pub mod model;
pub mod mongo;
pub mod mongo_query;
pub mod record;
pub mod schema;
pub mod sql_client;
pub mod value;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use backend::{Client, Connector, QueryBuilder, SqlConnection, TableInfo};
pub use builder::SqlQuery;
pub use condition::{ComparisonOp, Condition, Sort, SortDirection};
pub use config::{DbConfig, Driver};
pub use dialect::{Dialect, PostgresDialect, SqlServerDialect};
pub use error::{QueryError, Result, SchemaError};
pub use model::{Builder, Configurator, Model};
pub use mongo::{DocumentCollection, DocumentSession, MongoClient};
pub use mongo_query::MongoQuery;
pub use record::{Record, RecordSet};
pub use schema::{FieldKind, Index, Schema, SchemaDescriptor, SchemaRegistry};
pub use sql_client::SqlClient;
pub use value::FieldValue;

#[cfg(feature = "postgres")]
pub use postgres::{PgConnector, PostgresBackend};

/// Prelude for common imports
pub mod prelude {
    pub use crate::backend::{Client, Connector, QueryBuilder};
    pub use crate::condition::{Condition, Sort};
    pub use crate::config::{DbConfig, Driver};
    pub use crate::error::{QueryError, Result, SchemaError};
    pub use crate::model::{Builder, Model};
    pub use crate::record::Record;
    pub use crate::schema::{Index, Schema};
    pub use crate::value::FieldValue;

    #[cfg(feature = "postgres")]
    pub use crate::postgres::PgConnector;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let _registry = SchemaRegistry::new();
        let _record = Record::new();
        let _op = ComparisonOp::Eq;
        let _sort = Sort::desc("age");
        assert_eq!(Driver::Postgres.to_string(), "pg");
        assert_eq!(PostgresDialect.name(), "pg");
        assert_eq!(SqlServerDialect.name(), "mssql");
    }
}
