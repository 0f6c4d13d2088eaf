use crate::error::SchemaError;
use bson::oid::ObjectId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number, Value};

/// A single field or column value as it travels between schemas, records
/// and backends.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    ObjectId(ObjectId),
    /// Maps and structs, kept in their JSON shape.
    Json(Value),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Name of the runtime kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "int",
            FieldValue::UInt(_) => "uint",
            FieldValue::Float(_) => "float",
            FieldValue::Text(_) => "string",
            FieldValue::Bytes(_) => "bytes",
            FieldValue::ObjectId(_) => "object id",
            FieldValue::Json(_) => "json",
            FieldValue::List(_) => "slice",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Whether the value equals the zero value of its kind. Lists, bytes and
    /// JSON values are never considered zero.
    pub fn is_zero(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Bool(b) => !b,
            FieldValue::Int(i) => *i == 0,
            FieldValue::UInt(u) => *u == 0,
            FieldValue::Float(f) => *f == 0.0,
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::ObjectId(oid) => oid.bytes() == [0u8; 12],
            FieldValue::Bytes(_) | FieldValue::Json(_) | FieldValue::List(_) => false,
        }
    }

    /// Whether the value is a document-store identifier.
    pub fn is_object_id(&self) -> bool {
        matches!(self, FieldValue::ObjectId(_))
    }

    /// Build a value from anything serde can serialize. Objects become
    /// `Json`, arrays become `List`.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, SchemaError> {
        serde_json::to_value(value)
            .map(Self::from_json_value)
            .map_err(|e| SchemaError::decode(std::any::type_name::<T>(), e))
    }

    /// Deserialize the value into any serde type, e.g. a struct field or a
    /// slice of structs.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, SchemaError> {
        serde_json::from_value(self.to_json_value())
            .map_err(|e| SchemaError::decode(std::any::type_name::<T>(), e))
    }

    pub fn from_json_value(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    FieldValue::UInt(u)
                } else {
                    FieldValue::Float(n.as_f64().unwrap_or_default())
                }
            }
            Value::String(s) => FieldValue::Text(s),
            Value::Array(items) => {
                FieldValue::List(items.into_iter().map(Self::from_json_value).collect())
            }
            object @ Value::Object(_) => FieldValue::Json(object),
        }
    }

    pub fn to_json_value(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Int(i) => Value::Number((*i).into()),
            FieldValue::UInt(u) => Value::Number((*u).into()),
            FieldValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Bytes(bytes) => {
                Value::Array(bytes.iter().map(|b| Value::Number((*b).into())).collect())
            }
            FieldValue::ObjectId(oid) => Value::String(oid.to_hex()),
            FieldValue::Json(v) => v.clone(),
            FieldValue::List(items) => Value::Array(items.iter().map(Self::to_json_value).collect()),
        }
    }

    /// Decode into a concrete Rust type.
    pub fn decode<T: FromFieldValue>(self) -> Result<T, SchemaError> {
        T::from_field_value(self)
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Null
    }
}

macro_rules! from_scalar {
    ($variant:ident, $target:ty; $($t:ty),*) => {
        $(
            impl From<$t> for FieldValue {
                fn from(value: $t) -> Self {
                    FieldValue::$variant(value as $target)
                }
            }
        )*
    };
}

from_scalar!(Int, i64; i8, i16, i32, i64, isize);
from_scalar!(UInt, u64; u8, u16, u32, u64, usize);
from_scalar!(Float, f64; f32, f64);

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<ObjectId> for FieldValue {
    fn from(value: ObjectId) -> Self {
        FieldValue::ObjectId(value)
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Json(value)
    }
}

impl From<Map<String, Value>> for FieldValue {
    fn from(value: Map<String, Value>) -> Self {
        FieldValue::Json(Value::Object(value))
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(value: Vec<T>) -> Self {
        FieldValue::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// Conversion from a decoded [`FieldValue`] into a schema field type.
///
/// `Null` converts to the zero value of scalar types and to `None` for
/// `Option<T>`.
pub trait FromFieldValue: Sized {
    fn from_field_value(value: FieldValue) -> Result<Self, SchemaError>;
}

fn unexpected<T>(target: &str, value: &FieldValue) -> Result<T, SchemaError> {
    Err(SchemaError::decode(
        target,
        format!("unexpected {} value", value.kind_name()),
    ))
}

macro_rules! from_field_value_int {
    ($($t:ty),*) => {
        $(
            impl FromFieldValue for $t {
                fn from_field_value(value: FieldValue) -> Result<Self, SchemaError> {
                    match value {
                        FieldValue::Null => Ok(0),
                        FieldValue::Int(i) => {
                            <$t>::try_from(i).map_err(|e| SchemaError::decode(stringify!($t), e))
                        }
                        FieldValue::UInt(u) => {
                            <$t>::try_from(u).map_err(|e| SchemaError::decode(stringify!($t), e))
                        }
                        other => unexpected(stringify!($t), &other),
                    }
                }
            }
        )*
    };
}

from_field_value_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! from_field_value_float {
    ($($t:ty),*) => {
        $(
            impl FromFieldValue for $t {
                fn from_field_value(value: FieldValue) -> Result<Self, SchemaError> {
                    match value {
                        FieldValue::Null => Ok(0.0),
                        FieldValue::Float(f) => Ok(f as $t),
                        FieldValue::Int(i) => Ok(i as $t),
                        FieldValue::UInt(u) => Ok(u as $t),
                        other => unexpected(stringify!($t), &other),
                    }
                }
            }
        )*
    };
}

from_field_value_float!(f32, f64);

impl FromFieldValue for bool {
    fn from_field_value(value: FieldValue) -> Result<Self, SchemaError> {
        match value {
            FieldValue::Null => Ok(false),
            FieldValue::Bool(b) => Ok(b),
            other => unexpected("bool", &other),
        }
    }
}

impl FromFieldValue for String {
    fn from_field_value(value: FieldValue) -> Result<Self, SchemaError> {
        match value {
            FieldValue::Null => Ok(String::new()),
            FieldValue::Text(s) => Ok(s),
            FieldValue::ObjectId(oid) => Ok(oid.to_hex()),
            other => unexpected("String", &other),
        }
    }
}

impl FromFieldValue for ObjectId {
    fn from_field_value(value: FieldValue) -> Result<Self, SchemaError> {
        match value {
            FieldValue::ObjectId(oid) => Ok(oid),
            FieldValue::Text(s) => {
                ObjectId::parse_str(&s).map_err(|e| SchemaError::decode("ObjectId", e))
            }
            other => unexpected("ObjectId", &other),
        }
    }
}

impl FromFieldValue for Value {
    fn from_field_value(value: FieldValue) -> Result<Self, SchemaError> {
        Ok(value.to_json_value())
    }
}

impl FromFieldValue for Map<String, Value> {
    fn from_field_value(value: FieldValue) -> Result<Self, SchemaError> {
        match value {
            FieldValue::Null => Ok(Map::new()),
            FieldValue::Json(Value::Object(map)) => Ok(map),
            other => unexpected("map", &other),
        }
    }
}

impl FromFieldValue for FieldValue {
    fn from_field_value(value: FieldValue) -> Result<Self, SchemaError> {
        Ok(value)
    }
}

impl<T: FromFieldValue> FromFieldValue for Vec<T> {
    fn from_field_value(value: FieldValue) -> Result<Self, SchemaError> {
        match value {
            FieldValue::Null => Ok(Vec::new()),
            FieldValue::List(items) => items.into_iter().map(T::from_field_value).collect(),
            FieldValue::Bytes(bytes) => bytes
                .into_iter()
                .map(|b| T::from_field_value(FieldValue::UInt(b as u64)))
                .collect(),
            other => unexpected("Vec", &other),
        }
    }
}

impl<T: FromFieldValue> FromFieldValue for Option<T> {
    fn from_field_value(value: FieldValue) -> Result<Self, SchemaError> {
        match value {
            FieldValue::Null => Ok(None),
            other => T::from_field_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Address {
        city: String,
        zip: u32,
    }

    #[test]
    fn test_zero_values() {
        assert!(FieldValue::Null.is_zero());
        assert!(FieldValue::from(0).is_zero());
        assert!(FieldValue::from("").is_zero());
        assert!(FieldValue::from(false).is_zero());
        assert!(!FieldValue::from("x").is_zero());
        assert!(!FieldValue::List(vec![]).is_zero());
        assert!(FieldValue::ObjectId(ObjectId::from_bytes([0; 12])).is_zero());
        assert!(!FieldValue::ObjectId(ObjectId::new()).is_zero());
    }

    #[test]
    fn test_integer_narrowing() {
        assert_eq!(FieldValue::Int(19).decode::<i32>().unwrap(), 19);
        assert_eq!(FieldValue::Int(7).decode::<u8>().unwrap(), 7);
        assert!(FieldValue::Int(300).decode::<u8>().is_err());
        assert!(FieldValue::Int(-1).decode::<u64>().is_err());
        assert_eq!(FieldValue::Null.decode::<i64>().unwrap(), 0);
    }

    #[test]
    fn test_float_widening() {
        assert_eq!(FieldValue::Int(3).decode::<f64>().unwrap(), 3.0);
        assert_eq!(FieldValue::Float(3.5).decode::<f32>().unwrap(), 3.5);
    }

    #[test]
    fn test_option_and_vec() {
        assert_eq!(FieldValue::Null.decode::<Option<String>>().unwrap(), None);
        assert_eq!(
            FieldValue::from("a").decode::<Option<String>>().unwrap(),
            Some("a".to_string())
        );
        let list = FieldValue::from(vec![2, 3, 5, 7]);
        assert_eq!(list.decode::<Vec<i32>>().unwrap(), vec![2, 3, 5, 7]);
        assert_eq!(
            FieldValue::Bytes(vec![1, 2]).decode::<Vec<u8>>().unwrap(),
            vec![1, 2]
        );
    }

    #[test]
    fn test_struct_round_trip() {
        let address = Address {
            city: "Tehran".to_string(),
            zip: 1234,
        };
        let value = FieldValue::json(&address).unwrap();
        assert_eq!(value, FieldValue::Json(json!({"city": "Tehran", "zip": 1234})));
        assert_eq!(value.into_json::<Address>().unwrap(), address);
    }

    #[test]
    fn test_slice_of_structs_becomes_list_of_json() {
        let value = FieldValue::json(&vec![json!({"a": "b"}), json!({"c": "d"})]).unwrap();
        assert_eq!(
            value,
            FieldValue::List(vec![
                FieldValue::Json(json!({"a": "b"})),
                FieldValue::Json(json!({"c": "d"})),
            ])
        );
    }

    #[test]
    fn test_object_id_string() {
        let oid = ObjectId::new();
        assert_eq!(
            FieldValue::ObjectId(oid).decode::<String>().unwrap(),
            oid.to_hex()
        );
        assert_eq!(
            FieldValue::Text(oid.to_hex()).decode::<ObjectId>().unwrap(),
            oid
        );
    }
}
