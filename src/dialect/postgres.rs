use super::{escape, float_literal, insert_parts, Dialect};
use crate::error::SchemaError;
use crate::record::Record;
use crate::schema::{FieldKind, FieldOptions, Index, TableSpec};
use crate::value::FieldValue;

/// PostgreSQL rules: native booleans, `{..}` array literals, JSON columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    fn quote_list(&self, items: &[FieldValue]) -> Result<String, SchemaError> {
        if items.is_empty() {
            return Ok("'{}'".to_string());
        }

        if items.iter().all(|item| matches!(item, FieldValue::Json(_))) {
            let elements: Vec<String> = items
                .iter()
                .map(|item| format!("'{}'", escape(&item.to_json_value().to_string())))
                .collect();
            return Ok(format!("array[{}]::json[]", elements.join(",")));
        }

        let elements = items
            .iter()
            .map(|item| self.array_element(item))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(format!("'{{{}}}'", elements.join(",")))
    }

    fn array_element(&self, item: &FieldValue) -> Result<String, SchemaError> {
        match item {
            FieldValue::Null => Ok("NULL".to_string()),
            FieldValue::Bool(b) => Ok(b.to_string()),
            FieldValue::Int(i) => Ok(i.to_string()),
            FieldValue::UInt(u) => Ok(u.to_string()),
            FieldValue::Float(f) => float_literal(*f),
            FieldValue::Text(s) => Ok(format!(
                "\"{}\"",
                escape(&s.replace('\\', "\\\\").replace('"', "\\\""))
            )),
            FieldValue::ObjectId(oid) => Ok(format!("\"{}\"", oid.to_hex())),
            other => Err(SchemaError::UnsupportedType(format!(
                "[]{}",
                other.kind_name()
            ))),
        }
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "pg"
    }

    fn id_column(&self) -> &'static str {
        "id"
    }

    fn quote(&self, value: &FieldValue) -> Result<String, SchemaError> {
        match value {
            FieldValue::Null => Ok("NULL".to_string()),
            FieldValue::Bool(b) => Ok(b.to_string()),
            FieldValue::Int(i) => Ok(i.to_string()),
            FieldValue::UInt(u) => Ok(u.to_string()),
            FieldValue::Float(f) => float_literal(*f),
            FieldValue::Text(s) => Ok(format!("'{}'", escape(s))),
            FieldValue::ObjectId(oid) => Ok(format!("'{}'", oid.to_hex())),
            FieldValue::Bytes(bytes) => Ok(format!("'\\x{}'", hex::encode(bytes))),
            FieldValue::Json(json) => Ok(format!("'{}'", escape(&json.to_string()))),
            FieldValue::List(items) => self.quote_list(items),
        }
    }

    fn column_type(&self, kind: &FieldKind, options: &FieldOptions) -> Result<String, SchemaError> {
        let serial = options.auto_increment;

        let native = match kind {
            FieldKind::Optional(inner) => return self.column_type(inner, options),
            FieldKind::Bool => "BOOLEAN",
            FieldKind::I8 | FieldKind::I16 | FieldKind::U8 if serial => "SMALLSERIAL",
            FieldKind::I8 | FieldKind::I16 | FieldKind::U8 => "SMALLINT",
            FieldKind::I32 | FieldKind::U16 if serial => "SERIAL",
            FieldKind::I32 | FieldKind::U16 => "INT",
            FieldKind::I64 | FieldKind::U32 if serial => "BIGSERIAL",
            FieldKind::I64 | FieldKind::U32 => "BIGINT",
            FieldKind::F32 => "REAL",
            FieldKind::F64 => "FLOAT8",
            FieldKind::U64 => "DECIMAL",
            FieldKind::String => "TEXT",
            FieldKind::Bytes => "BYTEA",
            FieldKind::Map | FieldKind::Struct => "JSON",
            FieldKind::Slice(element) => {
                if matches!(element.base(), FieldKind::Slice(_)) {
                    return Err(SchemaError::UnsupportedFieldType(kind.to_string()));
                }
                return Ok(format!("{}[]", self.column_type(element, options)?));
            }
            FieldKind::ObjectId => {
                return Err(SchemaError::UnsupportedFieldType(kind.to_string()));
            }
        };

        Ok(native.to_string())
    }

    fn column_options(&self, options: &FieldOptions) -> String {
        let mut parts: Vec<String> = Vec::new();

        if options.primary_key {
            parts.push("PRIMARY KEY".to_string());
        } else if options.not_null {
            parts.push("NOT NULL".to_string());
        } else if options.nullable {
            parts.push("NULL".to_string());
        }

        if let Some(check) = &options.check {
            parts.push(format!("CHECK ({})", check));
        }

        if let Some(default) = &options.default {
            parts.push(format!("DEFAULT {}", default));
        }

        if options.unique {
            parts.push("UNIQUE".to_string());
        }

        parts.join(" ")
    }

    fn create_table_sql(&self, table: &TableSpec) -> Result<String, SchemaError> {
        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} ( {} )",
            table.name,
            table.columns_sql()
        ))
    }

    fn create_index_sql(&self, table: &str, index: &Index) -> Result<String, SchemaError> {
        let unique = if index.unique { "UNIQUE " } else { "" };
        Ok(format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
            unique,
            index.name(),
            table,
            index.columns.join(", ")
        ))
    }

    fn insert_sql(&self, table: &str, record: &Record) -> Result<String, SchemaError> {
        let (columns, values) = insert_parts(self, record)?;
        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            table, columns, values
        ))
    }

    /// Byte values in a RETURNING row are JSON or text columns handed back
    /// raw by the driver.
    fn normalize_returned(&self, record: &mut Record) {
        for (_, value) in record.iter_mut() {
            let text = match value {
                FieldValue::Bytes(bytes) => std::str::from_utf8(bytes).ok().map(str::to_string),
                _ => None,
            };
            if let Some(text) = text {
                *value = FieldValue::Text(text);
            }
        }
    }
}
