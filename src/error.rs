use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueryError>;

/// Configuration errors: a schema, tag or value that can never work against
/// the selected backend. Retrying does not help.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Unsupported type [{0}]")]
    UnsupportedType(String),

    #[error("Field type [{0}] is not supported. Change type or ignore it with tag")]
    UnsupportedFieldType(String),

    #[error("Invalid table name [{0}]. Table name should be in [schema].[tablename] format.")]
    InvalidTableName(String),

    #[error("change data could not be empty")]
    EmptyUpdate,

    #[error("Invalid ID for document: {0}")]
    InvalidId(String),

    #[error("Unknown field [{field}] on schema {schema}")]
    UnknownField { schema: String, field: String },

    #[error("Cannot decode value for {target}: {reason}")]
    Decode { target: String, reason: String },

    #[error("Table info is not supported by {0} client")]
    UnsupportedTableInfo(String),
}

impl SchemaError {
    pub fn decode(target: impl Into<String>, reason: impl ToString) -> Self {
        SchemaError::Decode {
            target: target.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("no result found")]
    NoRows,

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("BSON error: {0}")]
    Bson(#[from] bson::ser::Error),

    #[cfg(feature = "postgres")]
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl QueryError {
    /// True for configuration errors, false for operational failures that a
    /// caller may retry or report.
    pub fn is_schema_error(&self) -> bool {
        matches!(self, QueryError::Schema(_))
    }

    /// True when a lookup matched nothing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, QueryError::NoRows | QueryError::NotFound)
    }
}
