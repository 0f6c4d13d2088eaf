use super::{escape, float_literal, insert_parts, Dialect};
use crate::error::SchemaError;
use crate::record::Record;
use crate::schema::{Clustering, FieldKind, FieldOptions, Identity, Index, TableSpec};
use crate::value::FieldValue;

/// SQL Server rules: `N'..'` strings, `1`/`0` booleans, JSON stored as text.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

impl SqlServerDialect {
    fn text(&self, s: &str) -> String {
        format!("N'{}'", escape(s))
    }

    fn clustering(options: &FieldOptions) -> Option<&'static str> {
        match options.clustering {
            Some(Clustering::Clustered) => Some("CLUSTERED"),
            Some(Clustering::NonClustered) => Some("NONCLUSTERED"),
            None => None,
        }
    }
}

impl Dialect for SqlServerDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn id_column(&self) -> &'static str {
        "ID"
    }

    fn quote(&self, value: &FieldValue) -> Result<String, SchemaError> {
        match value {
            FieldValue::Null => Ok("NULL".to_string()),
            FieldValue::Bool(true) => Ok("1".to_string()),
            FieldValue::Bool(false) => Ok("0".to_string()),
            FieldValue::Int(i) => Ok(i.to_string()),
            FieldValue::UInt(u) => Ok(u.to_string()),
            FieldValue::Float(f) => float_literal(*f),
            FieldValue::Text(s) => Ok(self.text(s)),
            FieldValue::ObjectId(oid) => Ok(self.text(&oid.to_hex())),
            FieldValue::Bytes(bytes) => Ok(format!("0x{}", hex::encode(bytes))),
            FieldValue::Json(_) | FieldValue::List(_) => {
                Ok(self.text(&value.to_json_value().to_string()))
            }
        }
    }

    fn column_type(&self, kind: &FieldKind, options: &FieldOptions) -> Result<String, SchemaError> {
        let native = match kind {
            FieldKind::Optional(inner) => return self.column_type(inner, options),
            FieldKind::Bool => "BIT",
            FieldKind::U8 => "TINYINT",
            FieldKind::I8 | FieldKind::I16 => "SMALLINT",
            FieldKind::I32 | FieldKind::U16 => "INT",
            FieldKind::I64 | FieldKind::U32 => "BIGINT",
            FieldKind::F32 => "REAL",
            FieldKind::F64 => "FLOAT",
            FieldKind::U64 => "DECIMAL",
            FieldKind::String => "NVARCHAR(MAX)",
            FieldKind::Bytes => "VARBINARY(MAX)",
            FieldKind::Map | FieldKind::Struct | FieldKind::Slice(_) => "NVARCHAR(MAX)",
            FieldKind::ObjectId => {
                return Err(SchemaError::UnsupportedFieldType(kind.to_string()));
            }
        };

        Ok(native.to_string())
    }

    fn column_options(&self, options: &FieldOptions) -> String {
        let mut parts: Vec<String> = Vec::new();

        match &options.identity {
            Some(Identity::Default) => parts.push("IDENTITY".to_string()),
            Some(Identity::Spec(spec)) => parts.push(format!("IDENTITY{}", spec)),
            None => {}
        }

        if options.primary_key {
            parts.push("PRIMARY KEY".to_string());
            parts.extend(Self::clustering(options).map(String::from));
        } else if options.nullable {
            parts.push("NULL".to_string());
        } else if options.not_null {
            parts.push("NOT NULL".to_string());
        }

        if let Some(default) = &options.default {
            parts.push(format!("DEFAULT {}", default));
        }

        if options.unique {
            parts.push("UNIQUE".to_string());
            parts.extend(Self::clustering(options).map(String::from));
        }

        if let Some(check) = &options.check {
            parts.push(format!("CHECK {}", check));
        }

        parts.join(" ")
    }

    /// `IF NOT EXISTS (..) BEGIN CREATE TABLE .. END`; the table name must be
    /// `schema.table`.
    fn create_table_sql(&self, table: &TableSpec) -> Result<String, SchemaError> {
        let parts: Vec<&str> = table.name.split('.').collect();
        let [schema, name] = parts.as_slice() else {
            return Err(SchemaError::InvalidTableName(table.name.clone()));
        };

        Ok(format!(
            "IF NOT EXISTS (SELECT * FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {}) BEGIN CREATE TABLE {} ({}) END",
            self.text(schema),
            self.text(name),
            table.name,
            table.columns_sql()
        ))
    }

    fn create_index_sql(&self, table: &str, index: &Index) -> Result<String, SchemaError> {
        let unique = if index.unique { "UNIQUE " } else { "" };
        let name = index.name();

        Ok(format!(
            "IF NOT EXISTS (SELECT * FROM sys.indexes WHERE name = {} AND object_id = OBJECT_ID({})) BEGIN CREATE {}INDEX {} ON {} ({}) END",
            self.text(&name),
            self.text(table),
            unique,
            name,
            table,
            index.columns.join(", ")
        ))
    }

    fn insert_sql(&self, table: &str, record: &Record) -> Result<String, SchemaError> {
        let (columns, values) = insert_parts(self, record)?;
        Ok(format!(
            "INSERT INTO {} ({}) OUTPUT inserted.* VALUES ({})",
            table, columns, values
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnSpec;
    use serde_json::json;

    fn quote(value: impl Into<FieldValue>) -> String {
        SqlServerDialect.quote(&value.into()).unwrap()
    }

    fn accounts(name: &str) -> TableSpec {
        TableSpec {
            name: name.to_string(),
            columns: vec![
                ColumnSpec {
                    name: "ID".to_string(),
                    native_type: "INT".to_string(),
                    options: "IDENTITY PRIMARY KEY".to_string(),
                },
                ColumnSpec {
                    name: "Name".to_string(),
                    native_type: "NVARCHAR(MAX)".to_string(),
                    options: String::new(),
                },
            ],
        }
    }

    #[test]
    fn test_scalar_quoting() {
        assert_eq!(quote("Alice"), "N'Alice'");
        assert_eq!(quote("it's"), "N'it''s'");
        assert_eq!(quote(true), "1");
        assert_eq!(quote(false), "0");
        assert_eq!(quote(19), "19");
        assert_eq!(quote(FieldValue::Bytes(vec![0x0a, 0xff])), "0x0aff");
    }

    #[test]
    fn test_non_finite_floats_are_rejected() {
        assert_eq!(quote(0.25), "0.25");
        for f in [f64::NAN, f64::NEG_INFINITY] {
            assert!(matches!(
                SqlServerDialect.quote(&FieldValue::Float(f)),
                Err(SchemaError::UnsupportedType(_))
            ));
        }
    }

    #[test]
    fn test_composites_quote_as_json_text() {
        assert_eq!(quote(json!({"a": "b"})), "N'{\"a\":\"b\"}'");
        assert_eq!(quote(vec![2, 3, 5, 7]), "N'[2,3,5,7]'");
    }

    #[test]
    fn test_column_types() {
        let d = SqlServerDialect;
        let plain = FieldOptions::default();
        assert_eq!(d.column_type(&FieldKind::Bool, &plain).unwrap(), "BIT");
        assert_eq!(d.column_type(&FieldKind::U8, &plain).unwrap(), "TINYINT");
        assert_eq!(d.column_type(&FieldKind::I8, &plain).unwrap(), "SMALLINT");
        assert_eq!(d.column_type(&FieldKind::F64, &plain).unwrap(), "FLOAT");
        assert_eq!(d.column_type(&FieldKind::String, &plain).unwrap(), "NVARCHAR(MAX)");
        assert_eq!(
            d.column_type(&FieldKind::slice(FieldKind::I32), &plain).unwrap(),
            "NVARCHAR(MAX)"
        );
    }

    #[test]
    fn test_column_options() {
        let d = SqlServerDialect;
        assert_eq!(
            d.column_options(&FieldOptions::parse("pk;cluster").as_primary_key()),
            "IDENTITY PRIMARY KEY CLUSTERED"
        );
        assert_eq!(
            d.column_options(&FieldOptions::parse("id:(1,5);pk")),
            "IDENTITY(1,5) PRIMARY KEY"
        );
        assert_eq!(
            d.column_options(&FieldOptions::parse("notnull;default:0;unique;noncluster;check:(Age > 0)")),
            "NOT NULL DEFAULT 0 UNIQUE NONCLUSTERED CHECK (Age > 0)"
        );
    }

    #[test]
    fn test_create_table_checks_existence() {
        assert_eq!(
            SqlServerDialect.create_table_sql(&accounts("dbo.accounts")).unwrap(),
            "IF NOT EXISTS (SELECT * FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = N'dbo' AND TABLE_NAME = N'accounts') BEGIN CREATE TABLE dbo.accounts (ID INT IDENTITY PRIMARY KEY, Name NVARCHAR(MAX)) END"
        );
    }

    #[test]
    fn test_table_name_needs_schema() {
        let err = SqlServerDialect.create_table_sql(&accounts("accounts")).unwrap_err();
        assert_eq!(err, SchemaError::InvalidTableName("accounts".to_string()));

        let err = SqlServerDialect
            .create_table_sql(&accounts("a.b.c"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidTableName(_)));
    }

    #[test]
    fn test_create_index_checks_existence() {
        assert_eq!(
            SqlServerDialect
                .create_index_sql("dbo.accounts", &Index::new(vec!["Name"]))
                .unwrap(),
            "IF NOT EXISTS (SELECT * FROM sys.indexes WHERE name = N'Name_index' AND object_id = OBJECT_ID(N'dbo.accounts')) BEGIN CREATE INDEX Name_index ON dbo.accounts (Name) END"
        );
    }

    #[test]
    fn test_insert_sql() {
        let record: Record = vec![("Name", "Alice")].into_iter().collect();
        assert_eq!(
            SqlServerDialect.insert_sql("dbo.accounts", &record).unwrap(),
            "INSERT INTO dbo.accounts (Name) OUTPUT inserted.* VALUES (N'Alice')"
        );
    }
}
