use crate::backend::QueryBuilder;
use crate::condition::Sort;
use crate::error::{QueryError, Result, SchemaError};
use crate::mongo::{document_to_record, record_to_document, DocumentCollection, FindOptions};
use crate::record::{Record, RecordSet};
use async_trait::async_trait;
use bson::{doc, Document};
use std::sync::Arc;
use tracing::debug;

/// Query builder over one filtered collection.
///
/// Bulk writes go through the collection with the stored filter, so they
/// reach every matching document, not just the ones a cursor would return.
pub struct MongoQuery {
    collection: Arc<dyn DocumentCollection>,
    filter: Document,
    options: FindOptions,
}

impl MongoQuery {
    pub fn new(collection: Arc<dyn DocumentCollection>, filter: Document) -> Self {
        Self {
            collection,
            filter,
            options: FindOptions::default(),
        }
    }

    pub fn filter(&self) -> &Document {
        &self.filter
    }

    pub fn options(&self) -> &FindOptions {
        &self.options
    }
}

/// Sort directive of `sort`: the field name, `-` prefixed when descending
pub fn sort_key(sort: &Sort) -> String {
    if sort.is_descending() {
        format!("-{}", sort.column)
    } else {
        sort.column.clone()
    }
}

#[async_trait]
impl QueryBuilder for MongoQuery {
    fn order_by(&mut self, sorts: Vec<Sort>) {
        self.options.sort = sorts.iter().map(sort_key).collect();
    }

    fn limit(&mut self, n: i64) {
        self.options.limit = n;
    }

    fn skip(&mut self, n: i64) {
        self.options.skip = n;
    }

    async fn count(&mut self) -> Result<u64> {
        self.collection.count(self.filter.clone()).await
    }

    async fn first(&mut self) -> Result<Record> {
        let options = FindOptions {
            limit: 1,
            ..self.options.clone()
        };

        self.collection
            .find(self.filter.clone(), options)
            .await?
            .into_iter()
            .next()
            .map(document_to_record)
            .ok_or(QueryError::NotFound)
    }

    async fn all(&mut self) -> Result<RecordSet> {
        let documents = self
            .collection
            .find(self.filter.clone(), self.options.clone())
            .await?;

        Ok(documents.into_iter().map(document_to_record).collect())
    }

    async fn update(&mut self, data: &Record) -> Result<u64> {
        if data.is_empty() {
            return Err(SchemaError::EmptyUpdate.into());
        }

        let changes = record_to_document(data)?;
        let update = doc! { "$set": changes };
        debug!(filter = %self.filter, %update, "update all");

        let info = self.collection.update_all(self.filter.clone(), update).await?;
        Ok(info.updated)
    }

    async fn delete(&mut self) -> Result<u64> {
        debug!(filter = %self.filter, "remove all");
        let info = self.collection.remove_all(self.filter.clone()).await?;
        Ok(info.removed)
    }
}
