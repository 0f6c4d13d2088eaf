//! Decoding of raw driver values into the shape a schema field expects.
//!
//! Drivers hand back whatever their wire format carries: text for decimals,
//! bytes for JSON columns, `{..}` literals for Postgres arrays. [`decode`]
//! turns any of those into a normalized [`FieldValue`] for the declared
//! [`FieldKind`].

use crate::error::SchemaError;
use crate::schema::FieldKind;
use crate::value::FieldValue;
use bson::oid::ObjectId;
use serde_json::Value;

/// Separator that stands in for `","` while splitting array literals
const ELEMENT_SEPARATOR: char = '\u{1f}';

/// 2^63, the first float past `i64::MAX`
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
/// 2^64, the first float past `u64::MAX`
const U64_BOUND: f64 = 18_446_744_073_709_551_616.0;

/// Decode `raw` into the normalized value for `kind`.
pub fn decode(raw: FieldValue, kind: &FieldKind) -> Result<FieldValue, SchemaError> {
    if raw.is_null() {
        return Ok(FieldValue::Null);
    }

    match kind {
        FieldKind::Optional(inner) => decode(raw, inner),
        FieldKind::Bool => decode_bool(raw),
        FieldKind::I8 | FieldKind::I16 | FieldKind::I32 | FieldKind::I64 => decode_int(raw, kind),
        FieldKind::U8 | FieldKind::U16 | FieldKind::U32 => decode_uint(raw, kind),
        FieldKind::U64 => decode_big_uint(raw),
        FieldKind::F32 | FieldKind::F64 => decode_float(raw, kind),
        FieldKind::String => decode_string(raw),
        FieldKind::Bytes => decode_bytes(raw),
        FieldKind::ObjectId => decode_object_id(raw),
        FieldKind::Map | FieldKind::Struct => decode_json(raw, kind),
        FieldKind::Slice(element) => decode_slice(raw, element),
    }
}

fn mismatch(kind: &FieldKind, raw: &FieldValue) -> SchemaError {
    SchemaError::decode(kind.to_string(), format!("unexpected {} value", raw.kind_name()))
}

fn bytes_to_text(bytes: Vec<u8>, kind: &FieldKind) -> Result<String, SchemaError> {
    String::from_utf8(bytes).map_err(|e| SchemaError::decode(kind.to_string(), e))
}

/// Accepts the spellings `1 t T TRUE true True 0 f F FALSE false False`.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn float_to_i64(f: f64, target: &str) -> Result<i64, SchemaError> {
    if f.is_finite() && (-I64_BOUND..I64_BOUND).contains(&f) {
        Ok(f as i64)
    } else {
        Err(SchemaError::decode(target, format!("{} out of range", f)))
    }
}

/// Truncating conversion; fails instead of saturating.
fn float_to_u64(f: f64, target: &str) -> Result<u64, SchemaError> {
    if f.is_finite() && (0.0..U64_BOUND).contains(&f) {
        Ok(f as u64)
    } else {
        Err(SchemaError::decode(target, format!("{} out of range", f)))
    }
}

fn decode_bool(raw: FieldValue) -> Result<FieldValue, SchemaError> {
    match raw {
        FieldValue::Bool(b) => Ok(FieldValue::Bool(b)),
        FieldValue::Int(i) => Ok(FieldValue::Bool(i != 0)),
        FieldValue::UInt(u) => Ok(FieldValue::Bool(u != 0)),
        FieldValue::Text(ref s) => parse_bool(s.trim())
            .map(FieldValue::Bool)
            .ok_or_else(|| SchemaError::decode("bool", format!("invalid syntax {:?}", s))),
        other => Err(mismatch(&FieldKind::Bool, &other)),
    }
}

fn decode_int(raw: FieldValue, kind: &FieldKind) -> Result<FieldValue, SchemaError> {
    match raw {
        FieldValue::Int(i) => Ok(FieldValue::Int(i)),
        FieldValue::UInt(u) => i64::try_from(u)
            .map(FieldValue::Int)
            .map_err(|e| SchemaError::decode(kind.to_string(), e)),
        FieldValue::Float(f) if f.fract() == 0.0 => {
            float_to_i64(f, &kind.to_string()).map(FieldValue::Int)
        }
        FieldValue::Bool(b) => Ok(FieldValue::Int(b as i64)),
        FieldValue::Text(s) => s
            .trim()
            .parse::<i64>()
            .map(FieldValue::Int)
            .map_err(|e| SchemaError::decode(kind.to_string(), e)),
        FieldValue::Bytes(bytes) => decode_int(FieldValue::Text(bytes_to_text(bytes, kind)?), kind),
        other => Err(mismatch(kind, &other)),
    }
}

fn decode_uint(raw: FieldValue, kind: &FieldKind) -> Result<FieldValue, SchemaError> {
    match raw {
        FieldValue::UInt(u) => Ok(FieldValue::UInt(u)),
        FieldValue::Int(i) => u64::try_from(i)
            .map(FieldValue::UInt)
            .map_err(|e| SchemaError::decode(kind.to_string(), e)),
        FieldValue::Float(f) if f.fract() == 0.0 => {
            float_to_u64(f, &kind.to_string()).map(FieldValue::UInt)
        }
        FieldValue::Text(s) => s
            .trim()
            .parse::<u64>()
            .map(FieldValue::UInt)
            .map_err(|e| SchemaError::decode(kind.to_string(), e)),
        FieldValue::Bytes(bytes) => {
            decode_uint(FieldValue::Text(bytes_to_text(bytes, kind)?), kind)
        }
        other => Err(mismatch(kind, &other)),
    }
}

/// Parse an unsigned 64-bit decimal, falling back to a float parse for
/// values a driver rendered in exponent notation.
pub fn parse_big_uint(s: &str) -> Result<u64, SchemaError> {
    let s = s.trim();
    if let Ok(u) = s.parse::<u64>() {
        return Ok(u);
    }

    match s.parse::<f64>() {
        Ok(f) => float_to_u64(f, "uint64"),
        Err(e) => Err(SchemaError::decode("uint64", e)),
    }
}

fn decode_big_uint(raw: FieldValue) -> Result<FieldValue, SchemaError> {
    match raw {
        FieldValue::UInt(u) => Ok(FieldValue::UInt(u)),
        FieldValue::Int(i) => u64::try_from(i)
            .map(FieldValue::UInt)
            .map_err(|e| SchemaError::decode("uint64", e)),
        FieldValue::Float(f) => float_to_u64(f, "uint64").map(FieldValue::UInt),
        FieldValue::Text(s) => parse_big_uint(&s).map(FieldValue::UInt),
        FieldValue::Bytes(bytes) => {
            parse_big_uint(&bytes_to_text(bytes, &FieldKind::U64)?).map(FieldValue::UInt)
        }
        other => Err(mismatch(&FieldKind::U64, &other)),
    }
}

fn decode_float(raw: FieldValue, kind: &FieldKind) -> Result<FieldValue, SchemaError> {
    match raw {
        FieldValue::Float(f) => Ok(FieldValue::Float(f)),
        FieldValue::Int(i) => Ok(FieldValue::Float(i as f64)),
        FieldValue::UInt(u) => Ok(FieldValue::Float(u as f64)),
        FieldValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map(FieldValue::Float)
            .map_err(|e| SchemaError::decode(kind.to_string(), e)),
        FieldValue::Bytes(bytes) => {
            decode_float(FieldValue::Text(bytes_to_text(bytes, kind)?), kind)
        }
        other => Err(mismatch(kind, &other)),
    }
}

fn decode_string(raw: FieldValue) -> Result<FieldValue, SchemaError> {
    match raw {
        FieldValue::Text(s) => Ok(FieldValue::Text(s)),
        FieldValue::ObjectId(oid) => Ok(FieldValue::Text(oid.to_hex())),
        FieldValue::Bytes(bytes) => bytes_to_text(bytes, &FieldKind::String).map(FieldValue::Text),
        other => Err(mismatch(&FieldKind::String, &other)),
    }
}

fn decode_bytes(raw: FieldValue) -> Result<FieldValue, SchemaError> {
    match raw {
        FieldValue::Bytes(bytes) => Ok(FieldValue::Bytes(bytes)),
        FieldValue::Text(s) => match s.strip_prefix("\\x") {
            Some(digits) => hex::decode(digits)
                .map(FieldValue::Bytes)
                .map_err(|e| SchemaError::decode("bytes", e)),
            None => Ok(FieldValue::Bytes(s.into_bytes())),
        },
        FieldValue::List(items) => items
            .into_iter()
            .map(|item| item.decode::<u8>())
            .collect::<Result<Vec<_>, _>>()
            .map(FieldValue::Bytes),
        other => Err(mismatch(&FieldKind::Bytes, &other)),
    }
}

fn decode_object_id(raw: FieldValue) -> Result<FieldValue, SchemaError> {
    match raw {
        FieldValue::ObjectId(oid) => Ok(FieldValue::ObjectId(oid)),
        FieldValue::Text(s) => ObjectId::parse_str(&s)
            .map(FieldValue::ObjectId)
            .map_err(|e| SchemaError::decode("object id", e)),
        other => Err(mismatch(&FieldKind::ObjectId, &other)),
    }
}

fn decode_json(raw: FieldValue, kind: &FieldKind) -> Result<FieldValue, SchemaError> {
    let value = match raw {
        FieldValue::Json(value) => value,
        FieldValue::Text(s) => parse_json(&s, kind)?,
        FieldValue::Bytes(bytes) => parse_json(&bytes_to_text(bytes, kind)?, kind)?,
        other => return Err(mismatch(kind, &other)),
    };

    match value {
        Value::Null => Ok(FieldValue::Null),
        object @ Value::Object(_) => Ok(FieldValue::Json(object)),
        other => Err(SchemaError::decode(
            kind.to_string(),
            format!("expected a JSON object, got {}", other),
        )),
    }
}

fn parse_json(s: &str, kind: &FieldKind) -> Result<Value, SchemaError> {
    serde_json::from_str(s).map_err(|e| SchemaError::decode(kind.to_string(), e))
}

fn decode_slice(raw: FieldValue, element: &FieldKind) -> Result<FieldValue, SchemaError> {
    let kind = FieldKind::Slice(Box::new(element.clone()));

    match raw {
        FieldValue::List(items) => items
            .into_iter()
            .map(|item| decode(item, element))
            .collect::<Result<Vec<_>, _>>()
            .map(FieldValue::List),
        FieldValue::Json(value @ Value::Array(_)) => {
            decode_slice(FieldValue::from_json_value(value), element)
        }
        FieldValue::Text(s) => decode_array_text(&s, element),
        FieldValue::Bytes(bytes) if *element == FieldKind::U8 => {
            Ok(FieldValue::List(bytes.into_iter().map(FieldValue::from).collect()))
        }
        FieldValue::Bytes(bytes) => decode_array_text(&bytes_to_text(bytes, &kind)?, element),
        other => Err(mismatch(&kind, &other)),
    }
}

/// Decode either a JSON array (`[..]`) or a Postgres array literal (`{..}`).
fn decode_array_text(s: &str, element: &FieldKind) -> Result<FieldValue, SchemaError> {
    let trimmed = s.trim();
    if trimmed.starts_with('[') {
        let value = parse_json(trimmed, &FieldKind::Slice(Box::new(element.clone())))?;
        return decode_slice(FieldValue::from_json_value(value), element);
    }

    split_array_literal(trimmed, element)
        .into_iter()
        .map(|item| decode_array_element(&item, element))
        .collect::<Result<Vec<_>, _>>()
        .map(FieldValue::List)
}

/// Split the body of a `{..}` literal into raw element texts.
///
/// JSON elements are separated by `","`, which is swapped for a sentinel
/// first so commas inside the embedded objects survive. A JSON element with
/// no `","` in the body is the only element. Other elements split on commas
/// outside double quotes.
pub fn split_array_literal(literal: &str, element: &FieldKind) -> Vec<String> {
    let mut chars = literal.chars();
    chars.next();
    chars.next_back();
    let body = chars.as_str();

    if body.is_empty() {
        return Vec::new();
    }

    if !matches!(element.base(), FieldKind::Map | FieldKind::Struct) {
        return split_outside_quotes(body);
    }

    if body.contains("\",\"") {
        let separated = body.replace(
            "\",\"",
            &format!("\"{}\"", ELEMENT_SEPARATOR),
        );
        return separated
            .split(ELEMENT_SEPARATOR)
            .map(str::to_string)
            .collect();
    }

    vec![body.to_string()]
}

/// Split on commas that sit outside `"..."`, honoring backslash escapes.
/// Quotes and escapes are kept in the returned texts.
fn split_outside_quotes(body: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut escaped = false;

    for c in body.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }

        match c {
            '\\' if quoted => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                current.push(c);
                quoted = !quoted;
            }
            ',' if !quoted => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    items.push(current);
    items
}

/// Resolve backslash escapes of a quoted array element.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            other => out.push(other),
        }
    }

    out
}

fn strip_quotes(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(s)
}

fn decode_array_element(item: &str, element: &FieldKind) -> Result<FieldValue, SchemaError> {
    let item = item.trim();
    if item == "NULL" {
        return Ok(FieldValue::Null);
    }

    match element.base() {
        FieldKind::Map | FieldKind::Struct => {
            let unescaped = item.replace('\\', "");
            decode_json(FieldValue::Text(strip_quotes(&unescaped).to_string()), element)
        }
        FieldKind::String if item.starts_with('"') => Ok(FieldValue::Text(unescape(strip_quotes(item)))),
        FieldKind::String => Ok(FieldValue::Text(item.to_string())),
        FieldKind::Slice(_) => Err(SchemaError::UnsupportedType(
            FieldKind::Slice(Box::new(element.clone())).to_string(),
        )),
        _ => decode(FieldValue::Text(strip_quotes(item).to_string()), element),
    }
}
