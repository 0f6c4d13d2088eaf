use crate::error::SchemaError;
use crate::value::FieldValue;
use indexmap::IndexMap;

/// One record as an ordered column → value map.
///
/// Column order is insertion order, so the column list and the value list of
/// a generated statement always line up. Setting an existing column keeps
/// its position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: IndexMap<String, FieldValue>,
}

/// Rows returned by a fetch.
pub type RecordSet = Vec<Record>;

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Column names in insertion order
    pub fn columns(&self) -> Vec<&str> {
        self.values.keys().map(String::as_str).collect()
    }

    /// Values in column order, each rendered by `quote`
    pub fn quoted_values<F>(&self, quote: F) -> Result<Vec<String>, SchemaError>
    where
        F: Fn(&FieldValue) -> Result<String, SchemaError>,
    {
        self.values.values().map(quote).collect()
    }

    /// Set `value` for `column`, replacing any previous value in place.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<FieldValue>) {
        self.values.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.values.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<FieldValue> {
        self.values.shift_remove(column)
    }

    /// Empty every column.
    pub fn zero(&mut self) {
        self.values.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut FieldValue)> {
        self.values.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy every column of `other` into this record.
    pub fn merge(&mut self, other: Record) {
        for (column, value) in other {
            self.values.insert(column, value);
        }
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (column, value) in iter {
            record.set(column, value);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, FieldValue);
    type IntoIter = indexmap::map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_record() {
        let record = Record::new();
        assert!(record.is_empty());
        assert!(record.columns().is_empty());
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut record = Record::new();
        record.set("name", "Alice");
        record.set("age", 30);
        record.set("email", "alice@example.com");
        record.set("age", 31);

        assert_eq!(record.columns(), vec!["name", "age", "email"]);
        assert_eq!(record.get("age"), Some(&FieldValue::Int(31)));
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn test_quoted_values_follow_columns() {
        let record: Record = vec![("b", 2), ("a", 1)].into_iter().collect();
        let values = record
            .quoted_values(|v| match v {
                FieldValue::Int(i) => Ok(format!("<{}>", i)),
                other => Err(SchemaError::UnsupportedType(other.kind_name().to_string())),
            })
            .unwrap();
        assert_eq!(values, vec!["<2>", "<1>"]);
    }

    #[test]
    fn test_zero_clears() {
        let mut record: Record = vec![("id", 1)].into_iter().collect();
        record.zero();
        assert!(record.is_empty());
        assert!(!record.contains("id"));
    }

    #[test]
    fn test_merge_keeps_existing_positions() {
        let mut record: Record = vec![("name", "Test"), ("rate", "x")].into_iter().collect();
        let returned: Record = vec![
            ("id", FieldValue::Int(1)),
            ("name", FieldValue::from("Test")),
            ("rate", FieldValue::Float(3.5)),
        ]
        .into_iter()
        .collect();
        record.merge(returned);
        assert_eq!(record.columns(), vec!["name", "rate", "id"]);
        assert_eq!(record.get("rate"), Some(&FieldValue::Float(3.5)));
    }
}
