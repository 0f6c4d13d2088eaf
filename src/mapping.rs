use crate::coder;
use crate::dialect::Dialect;
use crate::error::SchemaError;
use crate::record::Record;
use crate::schema::{descriptor, ColumnSpec, FieldDescriptor, Schema, SchemaDescriptor, TableSpec};
use crate::value::FieldValue;

/// Whether a field stays out of the outgoing record.
///
/// The key column is never written; the backend assigns it. On insert,
/// zero values of nullable fields and zero object identifiers are left out
/// too.
fn skip_field(field: &FieldDescriptor, value: &FieldValue, key_name: &str, insert: bool) -> bool {
    if field.column_name == key_name {
        return true;
    }

    insert && value.is_zero() && (field.options.nullable || value.is_object_id())
}

/// Build the record to write for `schema`.
pub fn to_record<S: Schema>(schema: &S, insert: bool) -> Result<Record, SchemaError> {
    let descriptor = descriptor::<S>();
    let key_name = schema.key_name();
    let mut record = Record::new();

    for field in descriptor.persisted_fields() {
        let value = schema
            .get_field(&field.source_name)
            .ok_or_else(|| SchemaError::UnknownField {
                schema: descriptor.name().to_string(),
                field: field.source_name.clone(),
            })?;

        if skip_field(field, &value, key_name, insert) {
            continue;
        }

        record.set(field.column_name.clone(), value);
    }

    Ok(record)
}

/// Populate `schema` in place from a returned record. Columns the record
/// does not carry leave their field untouched.
pub fn fill_schema<S: Schema>(schema: &mut S, record: &Record) -> Result<(), SchemaError> {
    let descriptor = descriptor::<S>();

    for field in descriptor.persisted_fields() {
        if let Some(raw) = record.get(&field.column_name) {
            let value = coder::decode(raw.clone(), &field.kind)?;
            schema.set_field(&field.source_name, value)?;
        }
    }

    Ok(())
}

/// Derive the table structure of a schema for `dialect`.
pub fn table_spec(
    descriptor: &SchemaDescriptor,
    name: &str,
    key_name: &str,
    dialect: &dyn Dialect,
) -> Result<TableSpec, SchemaError> {
    let columns = descriptor
        .persisted_fields()
        .map(|field| {
            let options = if field.column_name == key_name {
                field.options.as_primary_key()
            } else {
                field.options.clone()
            };

            let native_type = match &options.explicit_type {
                Some(explicit) => explicit.clone(),
                None => dialect.column_type(&field.kind, &options)?,
            };

            Ok(ColumnSpec {
                name: field.column_name.clone(),
                native_type,
                options: dialect.column_options(&options),
            })
        })
        .collect::<Result<Vec<_>, SchemaError>>()?;

    Ok(TableSpec {
        name: name.to_string(),
        columns,
    })
}
