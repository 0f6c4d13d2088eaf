//! SQL dialect strategies
//!
//! A [`Dialect`] owns everything that differs between the SQL backends:
//! value quoting, native column types, column option clauses and the DDL/DML
//! statement shapes that are not shared with the query builder.

mod mssql;
mod postgres;

pub use mssql::SqlServerDialect;
pub use postgres::PostgresDialect;

use crate::error::SchemaError;
use crate::record::Record;
use crate::schema::{FieldKind, FieldOptions, Index, TableSpec};
use crate::value::FieldValue;
use std::fmt::Debug;

pub trait Dialect: Send + Sync + Debug {
    /// Short driver name, used in logs
    fn name(&self) -> &'static str;

    /// Column compared by the by-id statements
    fn id_column(&self) -> &'static str;

    /// Render `value` as a SQL literal
    fn quote(&self, value: &FieldValue) -> Result<String, SchemaError>;

    /// Native column type for a field of `kind`
    fn column_type(&self, kind: &FieldKind, options: &FieldOptions) -> Result<String, SchemaError>;

    /// Constraint clause for a column, e.g. `PRIMARY KEY` or `NOT NULL UNIQUE`
    fn column_options(&self, options: &FieldOptions) -> String;

    /// Idempotent CREATE TABLE statement
    fn create_table_sql(&self, table: &TableSpec) -> Result<String, SchemaError>;

    /// Idempotent CREATE INDEX statement
    fn create_index_sql(&self, table: &str, index: &Index) -> Result<String, SchemaError>;

    /// INSERT statement returning the stored row
    fn insert_sql(&self, table: &str, record: &Record) -> Result<String, SchemaError>;

    /// Fix up a row returned by an INSERT before it is merged into the
    /// caller's record.
    fn normalize_returned(&self, _record: &mut Record) {}
}

/// Double embedded single quotes.
pub fn escape(s: &str) -> String {
    s.replace('\'', "''")
}

/// Literal for a float; NaN and the infinities have none.
pub fn float_literal(f: f64) -> Result<String, SchemaError> {
    if f.is_finite() {
        Ok(f.to_string())
    } else {
        Err(SchemaError::UnsupportedType(format!("float {}", f)))
    }
}

/// `col = v, col2 = v2` for an UPDATE statement.
pub fn set_clause(dialect: &dyn Dialect, data: &Record) -> Result<String, SchemaError> {
    if data.is_empty() {
        return Err(SchemaError::EmptyUpdate);
    }

    let parts = data
        .iter()
        .map(|(column, value)| Ok(format!("{} = {}", column, dialect.quote(value)?)))
        .collect::<Result<Vec<_>, SchemaError>>()?;

    Ok(parts.join(", "))
}

/// Column list and value list of an INSERT, positionally aligned.
pub fn insert_parts(dialect: &dyn Dialect, record: &Record) -> Result<(String, String), SchemaError> {
    let columns = record.columns().join(", ");
    let values = record.quoted_values(|v| dialect.quote(v))?.join(", ");
    Ok((columns, values))
}
