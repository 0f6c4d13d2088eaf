//! Document-store client
//!
//! The driver is consumed through [`DocumentSession`] and
//! [`DocumentCollection`]; this module translates records, identifiers and
//! conditions into BSON for them.

use crate::backend::{Client, QueryBuilder, TableInfo};
use crate::condition::Condition;
use crate::error::{QueryError, Result, SchemaError};
use crate::mongo_query::MongoQuery;
use crate::record::Record;
use crate::schema::Index;
use crate::value::FieldValue;
use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::spec::BinarySubtype;
use bson::{Binary, Bson, Document};
use std::sync::Arc;
use tracing::debug;

/// Cursor options for [`DocumentCollection::find`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Field names, `-` prefixed for descending order
    pub sort: Vec<String>,
    /// Zero or less means no limit
    pub limit: i64,
    pub skip: i64,
}

/// Counts reported by bulk writes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeInfo {
    pub updated: u64,
    pub removed: u64,
    pub matched: u64,
}

/// One collection of the document store
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// Create the collection with optional options
    async fn create(&self, options: Option<Document>) -> Result<()>;

    async fn ensure_index(&self, keys: &[String], unique: bool) -> Result<()>;

    async fn insert(&self, document: Document) -> Result<()>;

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<Document>>;

    /// Replace the fields of the document with `id`
    async fn update_by_id(&self, id: ObjectId, document: Document) -> Result<()>;

    async fn remove_by_id(&self, id: ObjectId) -> Result<()>;

    async fn find(&self, filter: Document, options: FindOptions) -> Result<Vec<Document>>;

    async fn count(&self, filter: Document) -> Result<u64>;

    async fn update_all(&self, filter: Document, update: Document) -> Result<ChangeInfo>;

    async fn remove_all(&self, filter: Document) -> Result<ChangeInfo>;
}

/// Session on one database of the document store
#[async_trait]
pub trait DocumentSession: Send + Sync {
    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection>;

    async fn close(&self) -> Result<()>;
}

/// Convert a field value into BSON.
///
/// Unsigned values beyond `i64::MAX` are stored as decimal strings.
pub fn to_bson(value: &FieldValue) -> Result<Bson> {
    let bson = match value {
        FieldValue::Null => Bson::Null,
        FieldValue::Bool(b) => Bson::Boolean(*b),
        FieldValue::Int(i) => Bson::Int64(*i),
        FieldValue::UInt(u) => match i64::try_from(*u) {
            Ok(i) => Bson::Int64(i),
            Err(_) => Bson::String(u.to_string()),
        },
        FieldValue::Float(f) => Bson::Double(*f),
        FieldValue::Text(s) => Bson::String(s.clone()),
        FieldValue::Bytes(bytes) => Bson::Binary(Binary {
            subtype: BinarySubtype::Generic,
            bytes: bytes.clone(),
        }),
        FieldValue::ObjectId(oid) => Bson::ObjectId(*oid),
        FieldValue::Json(json) => bson::to_bson(json)?,
        FieldValue::List(items) => Bson::Array(items.iter().map(to_bson).collect::<Result<_>>()?),
    };

    Ok(bson)
}

/// Convert BSON into a field value; sub-documents become JSON.
pub fn from_bson(bson: Bson) -> FieldValue {
    match bson {
        Bson::Null | Bson::Undefined => FieldValue::Null,
        Bson::Boolean(b) => FieldValue::Bool(b),
        Bson::Int32(i) => FieldValue::Int(i as i64),
        Bson::Int64(i) => FieldValue::Int(i),
        Bson::Double(f) => FieldValue::Float(f),
        Bson::String(s) => FieldValue::Text(s),
        Bson::ObjectId(oid) => FieldValue::ObjectId(oid),
        Bson::Binary(binary) => FieldValue::Bytes(binary.bytes),
        Bson::Array(items) => FieldValue::List(items.into_iter().map(from_bson).collect()),
        other => FieldValue::from_json_value(other.into_relaxed_extjson()),
    }
}

pub fn record_to_document(record: &Record) -> Result<Document> {
    let mut document = Document::new();
    for (key, value) in record.iter() {
        document.insert(key, to_bson(value)?);
    }
    Ok(document)
}

pub fn document_to_record(document: Document) -> Record {
    document
        .into_iter()
        .map(|(key, value)| (key, from_bson(value)))
        .collect()
}

/// Identifier of a document: an ObjectId or its hex text.
pub fn object_id(id: &FieldValue) -> std::result::Result<ObjectId, SchemaError> {
    match id {
        FieldValue::ObjectId(oid) => Ok(*oid),
        FieldValue::Text(hex) => {
            ObjectId::parse_str(hex).map_err(|_| SchemaError::InvalidId(hex.clone()))
        }
        other => Err(SchemaError::InvalidId(other.kind_name().to_string())),
    }
}

/// Whether `document` is a `{"$op": ..}` operator document rather than an
/// embedded value.
fn is_operator_document(document: &Document) -> bool {
    !document.is_empty() && document.keys().all(|key| key.starts_with('$'))
}

/// Build the filter document of `conditions`. Conditions on the same field
/// are merged into one operator document, so `age > 18` and `age < 30`
/// become `{"age": {"$gt": 18, "$lt": 30}}`. A plain equality that meets
/// another operator is rewritten as `$eq`.
pub fn filter(conditions: &[Condition]) -> Result<Document> {
    let mut filter = Document::new();

    for condition in conditions {
        let field = condition.field();

        let (operator, operand) = match condition {
            Condition::Equal { value, .. } if !filter.contains_key(field) => {
                filter.insert(field, to_bson(value)?);
                continue;
            }
            Condition::Equal { value, .. } => ("$eq", to_bson(value)?),
            Condition::NotEqual { value, .. } => ("$ne", to_bson(value)?),
            Condition::GreaterThan { value, .. } => ("$gt", to_bson(value)?),
            Condition::GreaterThanEqual { value, .. } => ("$gte", to_bson(value)?),
            Condition::LessThan { value, .. } => ("$lt", to_bson(value)?),
            Condition::LessThanEqual { value, .. } => ("$lte", to_bson(value)?),
            Condition::In { values, .. } => (
                "$in",
                Bson::Array(values.iter().map(to_bson).collect::<Result<_>>()?),
            ),
            Condition::IsNull { .. } => ("$eq", Bson::Null),
            Condition::NotNull { .. } => ("$ne", Bson::Null),
        };

        match filter.get_mut(field) {
            Some(Bson::Document(operators)) if is_operator_document(operators) => {
                operators.insert(operator, operand);
            }
            Some(existing) => {
                let equal = std::mem::replace(existing, Bson::Null);
                let mut operators = Document::new();
                operators.insert("$eq", equal);
                operators.insert(operator, operand);
                *existing = Bson::Document(operators);
            }
            None => {
                let mut operators = Document::new();
                operators.insert(operator, operand);
                filter.insert(field, operators);
            }
        }
    }

    Ok(filter)
}

/// [`Client`] over a document-store session
pub struct MongoClient {
    session: Arc<dyn DocumentSession>,
}

impl MongoClient {
    pub fn new(session: Arc<dyn DocumentSession>) -> Self {
        Self { session }
    }

    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection> {
        self.session.collection(name)
    }
}

#[async_trait]
impl Client for MongoClient {
    async fn create_table(&self, name: &str, info: TableInfo) -> Result<()> {
        match info {
            TableInfo::Collection(options) => self.collection(name).create(options).await,
            TableInfo::Table(_) => Err(SchemaError::UnsupportedTableInfo("mongo".to_string()).into()),
        }
    }

    async fn ensure_index(&self, name: &str, index: &Index) -> Result<()> {
        debug!(collection = name, keys = ?index.columns, unique = index.unique, "ensure index");
        self.collection(name)
            .ensure_index(&index.columns, index.unique)
            .await
    }

    async fn insert(&self, name: &str, data: &mut Record) -> Result<()> {
        data.set("_id", ObjectId::new());
        let document = record_to_document(data)?;
        debug!(collection = name, %document, "insert");
        self.collection(name).insert(document).await
    }

    async fn find_by_id(&self, name: &str, id: &FieldValue) -> Result<Record> {
        let oid = object_id(id)?;
        self.collection(name)
            .find_by_id(oid)
            .await?
            .map(document_to_record)
            .ok_or(QueryError::NotFound)
    }

    async fn update_by_id(&self, name: &str, id: &FieldValue, data: &Record) -> Result<()> {
        let oid = object_id(id)?;
        let document = record_to_document(data)?;
        debug!(collection = name, %oid, %document, "update by id");
        self.collection(name).update_by_id(oid, document).await
    }

    async fn delete_by_id(&self, name: &str, id: &FieldValue) -> Result<()> {
        let oid = object_id(id)?;
        debug!(collection = name, %oid, "delete by id");
        self.collection(name).remove_by_id(oid).await
    }

    async fn query(&self, name: &str, conditions: Vec<Condition>) -> Result<Box<dyn QueryBuilder>> {
        let filter = filter(&conditions)?;
        debug!(collection = name, %filter, "query");
        Ok(Box::new(MongoQuery::new(self.collection(name), filter)))
    }

    async fn close(&self) -> Result<()> {
        self.session.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Calls {
        inserted: Vec<Document>,
        created: Vec<Option<Document>>,
        looked_up: Vec<ObjectId>,
    }

    #[derive(Default)]
    struct RecordingCollection {
        calls: Mutex<Calls>,
        stored: Option<Document>,
    }

    #[async_trait]
    impl DocumentCollection for RecordingCollection {
        async fn create(&self, options: Option<Document>) -> Result<()> {
            self.calls.lock().unwrap().created.push(options);
            Ok(())
        }

        async fn ensure_index(&self, _keys: &[String], _unique: bool) -> Result<()> {
            Ok(())
        }

        async fn insert(&self, document: Document) -> Result<()> {
            self.calls.lock().unwrap().inserted.push(document);
            Ok(())
        }

        async fn find_by_id(&self, id: ObjectId) -> Result<Option<Document>> {
            self.calls.lock().unwrap().looked_up.push(id);
            Ok(self.stored.clone())
        }

        async fn update_by_id(&self, _id: ObjectId, _document: Document) -> Result<()> {
            Ok(())
        }

        async fn remove_by_id(&self, _id: ObjectId) -> Result<()> {
            Ok(())
        }

        async fn find(&self, _filter: Document, _options: FindOptions) -> Result<Vec<Document>> {
            Ok(Vec::new())
        }

        async fn count(&self, _filter: Document) -> Result<u64> {
            Ok(0)
        }

        async fn update_all(&self, _filter: Document, _update: Document) -> Result<ChangeInfo> {
            Ok(ChangeInfo::default())
        }

        async fn remove_all(&self, _filter: Document) -> Result<ChangeInfo> {
            Ok(ChangeInfo::default())
        }
    }

    struct SingleCollection(Arc<RecordingCollection>);

    #[async_trait]
    impl DocumentSession for SingleCollection {
        fn collection(&self, _name: &str) -> Arc<dyn DocumentCollection> {
            self.0.clone()
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn mongo_client(collection: Arc<RecordingCollection>) -> MongoClient {
        MongoClient::new(Arc::new(SingleCollection(collection)))
    }

    #[test]
    fn test_filter_operators() {
        let conditions = vec![
            Condition::eq("name", "Alice"),
            Condition::gt("age", 18),
            Condition::lte("age", 30),
            Condition::is_in("role", vec!["admin", "owner"]),
            Condition::is_null("deleted_at"),
            Condition::not_null("email"),
        ];

        assert_eq!(
            filter(&conditions).unwrap(),
            doc! {
                "name": "Alice",
                "age": {"$gt": 18_i64, "$lte": 30_i64},
                "role": {"$in": ["admin", "owner"]},
                "deleted_at": {"$eq": Bson::Null},
                "email": {"$ne": Bson::Null},
            }
        );
    }

    #[test]
    fn test_equality_survives_other_operators() {
        let conditions = vec![Condition::eq("age", 19), Condition::gt("age", 5)];
        assert_eq!(
            filter(&conditions).unwrap(),
            doc! {"age": {"$eq": 19_i64, "$gt": 5_i64}}
        );

        let conditions = vec![Condition::gt("age", 5), Condition::eq("age", 19)];
        assert_eq!(
            filter(&conditions).unwrap(),
            doc! {"age": {"$gt": 5_i64, "$eq": 19_i64}}
        );
    }

    #[test]
    fn test_embedded_equality_is_not_merged_into() {
        let address = FieldValue::Json(json!({"city": "Tehran"}));
        let conditions = vec![
            Condition::eq("address", address.clone()),
            Condition::not_null("address"),
        ];
        assert_eq!(
            filter(&conditions).unwrap(),
            doc! {"address": {"$eq": {"city": "Tehran"}, "$ne": Bson::Null}}
        );

        let conditions = vec![Condition::not_null("address"), Condition::eq("address", address)];
        assert_eq!(
            filter(&conditions).unwrap(),
            doc! {"address": {"$ne": Bson::Null, "$eq": {"city": "Tehran"}}}
        );
    }

    #[test]
    fn test_bson_conversion() {
        assert_eq!(to_bson(&FieldValue::UInt(5)).unwrap(), Bson::Int64(5));
        assert_eq!(
            to_bson(&FieldValue::UInt(u64::MAX)).unwrap(),
            Bson::String(u64::MAX.to_string())
        );
        assert_eq!(
            to_bson(&FieldValue::Json(json!({"city": "Tehran"}))).unwrap(),
            Bson::Document(doc! {"city": "Tehran"})
        );

        assert_eq!(from_bson(Bson::Int32(3)), FieldValue::Int(3));
        assert_eq!(
            from_bson(Bson::Document(doc! {"city": "Tehran"})),
            FieldValue::Json(json!({"city": "Tehran"}))
        );
    }

    #[test]
    fn test_object_id_parsing() {
        let oid = ObjectId::new();
        assert_eq!(object_id(&FieldValue::ObjectId(oid)).unwrap(), oid);
        assert_eq!(object_id(&FieldValue::Text(oid.to_hex())).unwrap(), oid);
        assert!(matches!(
            object_id(&FieldValue::Int(1)),
            Err(SchemaError::InvalidId(_))
        ));
        assert!(matches!(
            object_id(&FieldValue::from("not-an-id")),
            Err(SchemaError::InvalidId(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_assigns_object_id() {
        let collection = Arc::new(RecordingCollection::default());
        let client = mongo_client(collection.clone());

        let mut data: Record = vec![("name", "Alice")].into_iter().collect();
        client.insert("users", &mut data).await.unwrap();

        let Some(FieldValue::ObjectId(oid)) = data.get("_id").cloned() else {
            panic!("missing _id");
        };
        let calls = collection.calls.lock().unwrap();
        assert_eq!(calls.inserted, vec![doc! {"name": "Alice", "_id": oid}]);
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let oid = ObjectId::new();
        let collection = Arc::new(RecordingCollection {
            stored: Some(doc! {"_id": oid, "name": "Alice"}),
            ..Default::default()
        });
        let client = mongo_client(collection.clone());

        let record = client
            .find_by_id("users", &FieldValue::Text(oid.to_hex()))
            .await
            .unwrap();
        assert_eq!(record.columns(), vec!["_id", "name"]);
        assert_eq!(collection.calls.lock().unwrap().looked_up, vec![oid]);

        let missing = mongo_client(Arc::new(RecordingCollection::default()));
        let err = missing
            .find_by_id("users", &FieldValue::ObjectId(oid))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_invalid_id_is_schema_error() {
        let client = mongo_client(Arc::new(RecordingCollection::default()));
        let err = client
            .delete_by_id("users", &FieldValue::Float(1.5))
            .await
            .unwrap_err();
        assert!(err.is_schema_error());
    }

    #[tokio::test]
    async fn test_create_collection_with_options() {
        let collection = Arc::new(RecordingCollection::default());
        let client = mongo_client(collection.clone());

        client
            .create_table("logs", TableInfo::Collection(Some(doc! {"capped": true})))
            .await
            .unwrap();
        assert_eq!(
            collection.calls.lock().unwrap().created,
            vec![Some(doc! {"capped": true})]
        );
    }
}
