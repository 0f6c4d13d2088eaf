use crate::backend::{QueryBuilder, SqlConnection};
use crate::coder;
use crate::condition::{Condition, Sort};
use crate::dialect::{set_clause, Dialect};
use crate::error::{QueryError, Result, SchemaError};
use crate::record::{Record, RecordSet};
use crate::schema::FieldKind;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Render the `AND`-joined predicate of `conditions`; empty when there are
/// none.
pub fn where_clause(dialect: &dyn Dialect, conditions: &[Condition]) -> std::result::Result<String, SchemaError> {
    let clauses = conditions
        .iter()
        .map(|condition| render_condition(dialect, condition))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(clauses.join(" AND "))
}

fn render_condition(dialect: &dyn Dialect, condition: &Condition) -> std::result::Result<String, SchemaError> {
    let field = condition.field();
    let op = condition.op();

    match condition {
        Condition::Equal { value, .. }
        | Condition::NotEqual { value, .. }
        | Condition::GreaterThan { value, .. }
        | Condition::GreaterThanEqual { value, .. }
        | Condition::LessThan { value, .. }
        | Condition::LessThanEqual { value, .. } => {
            Ok(format!("{} {} {}", field, op, dialect.quote(value)?))
        }
        Condition::In { values, .. } => {
            let quoted = values
                .iter()
                .map(|v| dialect.quote(v))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(format!("{} IN ({})", field, quoted.join(", ")))
        }
        Condition::IsNull { .. } | Condition::NotNull { .. } => Ok(format!("{} {}", field, op)),
    }
}

/// Query builder over one SQL table.
pub struct SqlQuery<C: SqlConnection> {
    connection: Arc<Mutex<C>>,
    dialect: Arc<dyn Dialect>,
    table: String,
    conditions: Vec<Condition>,
    sorts: Vec<Sort>,
    limit: i64,
    offset: i64,
}

impl<C: SqlConnection> SqlQuery<C> {
    pub fn new(
        connection: Arc<Mutex<C>>,
        dialect: Arc<dyn Dialect>,
        table: impl Into<String>,
        conditions: Vec<Condition>,
    ) -> Self {
        Self {
            connection,
            dialect,
            table: table.into(),
            conditions,
            sorts: Vec::new(),
            limit: 0,
            offset: 0,
        }
    }

    fn predicate(&self) -> Result<String> {
        Ok(where_clause(self.dialect.as_ref(), &self.conditions)?)
    }

    /// ` WHERE <predicate>`, or nothing without conditions
    fn where_suffix(&self) -> Result<String> {
        let predicate = self.predicate()?;
        if predicate.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!(" WHERE {}", predicate))
        }
    }

    /// LIMIT, OFFSET and ORDER BY, in that order
    fn options_clause(&self) -> String {
        let mut options = String::new();

        if self.limit > 0 {
            options.push_str(&format!(" LIMIT {}", self.limit));
        }

        if self.offset > 0 {
            options.push_str(&format!(" OFFSET {}", self.offset));
        }

        if !self.sorts.is_empty() {
            let sorts: Vec<String> = self.sorts.iter().map(Sort::to_sql).collect();
            options.push_str(&format!(" ORDER BY {}", sorts.join(", ")));
        }

        options
    }

    pub fn count_sql(&self) -> Result<String> {
        Ok(format!(
            "SELECT COUNT(*) AS count FROM {}{}",
            self.table,
            self.where_suffix()?
        ))
    }

    pub fn select_sql(&self) -> Result<String> {
        let sql = format!(
            "SELECT * FROM {}{}{}",
            self.table,
            self.where_suffix()?,
            self.options_clause()
        );
        Ok(sql.trim_end().to_string())
    }

    pub fn update_sql(&self, data: &Record) -> Result<String> {
        let changes = set_clause(self.dialect.as_ref(), data)?;
        Ok(format!(
            "UPDATE {} SET {}{}",
            self.table,
            changes,
            self.where_suffix()?
        ))
    }

    pub fn delete_sql(&self) -> Result<String> {
        Ok(format!("DELETE FROM {}{}", self.table, self.where_suffix()?))
    }

    async fn fetch(&self, sql: &str) -> Result<RecordSet> {
        debug!(table = %self.table, sql, "query");
        let mut connection = self.connection.lock().await;
        connection.query(sql).await
    }

    async fn exec(&self, sql: &str) -> Result<u64> {
        debug!(table = %self.table, sql, "execute");
        let mut connection = self.connection.lock().await;
        connection.execute(sql).await
    }
}

#[async_trait]
impl<C: SqlConnection + 'static> QueryBuilder for SqlQuery<C> {
    fn order_by(&mut self, sorts: Vec<Sort>) {
        self.sorts = sorts;
    }

    fn limit(&mut self, n: i64) {
        self.limit = n;
    }

    fn skip(&mut self, n: i64) {
        self.offset = n;
    }

    async fn count(&mut self) -> Result<u64> {
        let sql = self.count_sql()?;
        let rows = self.fetch(&sql).await?;

        let Some(row) = rows.into_iter().next() else {
            return Ok(0);
        };

        match row.get("count") {
            Some(raw) => Ok(coder::decode(raw.clone(), &FieldKind::U64)?.decode::<u64>()?),
            None => Ok(0),
        }
    }

    async fn first(&mut self) -> Result<Record> {
        self.limit = 1;
        let sql = self.select_sql()?;

        self.fetch(&sql)
            .await?
            .into_iter()
            .next()
            .ok_or(QueryError::NoRows)
    }

    async fn all(&mut self) -> Result<RecordSet> {
        let sql = self.select_sql()?;
        self.fetch(&sql).await
    }

    async fn update(&mut self, data: &Record) -> Result<u64> {
        let sql = self.update_sql(data)?;
        self.exec(&sql).await
    }

    async fn delete(&mut self) -> Result<u64> {
        let sql = self.delete_sql()?;
        self.exec(&sql).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{PostgresDialect, SqlServerDialect};
    use crate::value::FieldValue;

    struct NullConnection;

    #[async_trait]
    impl SqlConnection for NullConnection {
        async fn execute(&mut self, _sql: &str) -> Result<u64> {
            Ok(0)
        }

        async fn query(&mut self, _sql: &str) -> Result<RecordSet> {
            Ok(Vec::new())
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn pg_query(conditions: Vec<Condition>) -> SqlQuery<NullConnection> {
        SqlQuery::new(
            Arc::new(Mutex::new(NullConnection)),
            Arc::new(PostgresDialect),
            "players",
            conditions,
        )
    }

    #[test]
    fn test_predicate_operators() {
        let conditions = vec![
            Condition::eq("a", 1),
            Condition::ne("b", 2),
            Condition::gt("c", 3),
            Condition::gte("d", 4),
            Condition::lt("e", 5),
            Condition::lte("f", 6),
            Condition::is_in("g", vec![7, 8]),
            Condition::is_null("h"),
            Condition::not_null("i"),
        ];
        assert_eq!(
            where_clause(&PostgresDialect, &conditions).unwrap(),
            "a = 1 AND b != 2 AND c > 3 AND d >= 4 AND e < 5 AND f <= 6 AND g IN (7, 8) AND h IS NULL AND i IS NOT NULL"
        );
    }

    #[test]
    fn test_empty_in_list() {
        let conditions = vec![Condition::is_in("id", Vec::<FieldValue>::new())];
        assert_eq!(where_clause(&PostgresDialect, &conditions).unwrap(), "id IN ()");
    }

    #[test]
    fn test_string_quoting_per_dialect() {
        let conditions = vec![Condition::eq("name", "O'Neil")];
        assert_eq!(
            where_clause(&PostgresDialect, &conditions).unwrap(),
            "name = 'O''Neil'"
        );
        assert_eq!(
            where_clause(&SqlServerDialect, &conditions).unwrap(),
            "name = N'O''Neil'"
        );
    }

    #[test]
    fn test_select_sql() {
        let query = pg_query(vec![Condition::eq("age", 19)]);
        assert_eq!(query.select_sql().unwrap(), "SELECT * FROM players WHERE age = 19");

        let query = pg_query(vec![]);
        assert_eq!(query.select_sql().unwrap(), "SELECT * FROM players");
    }

    #[test]
    fn test_select_options_order() {
        let mut query = pg_query(vec![Condition::gt("age", 18)]);
        query.limit(10);
        query.skip(20);
        query.order_by(vec![Sort::asc("name"), Sort::desc("age")]);

        assert_eq!(
            query.select_sql().unwrap(),
            "SELECT * FROM players WHERE age > 18 LIMIT 10 OFFSET 20 ORDER BY name ASC, age DESC"
        );
    }

    #[test]
    fn test_non_positive_limit_and_offset_are_omitted() {
        let mut query = pg_query(vec![]);
        query.limit(0);
        query.skip(-1);
        assert_eq!(query.select_sql().unwrap(), "SELECT * FROM players");
    }

    #[test]
    fn test_count_sql() {
        assert_eq!(
            pg_query(vec![]).count_sql().unwrap(),
            "SELECT COUNT(*) AS count FROM players"
        );
        assert_eq!(
            pg_query(vec![Condition::eq("age", 19)]).count_sql().unwrap(),
            "SELECT COUNT(*) AS count FROM players WHERE age = 19"
        );
    }

    #[test]
    fn test_update_sql() {
        let query = pg_query(vec![Condition::eq("id", 1)]);
        let data: Record = vec![("name", FieldValue::from("Bob")), ("age", FieldValue::from(20))]
            .into_iter()
            .collect();
        assert_eq!(
            query.update_sql(&data).unwrap(),
            "UPDATE players SET name = 'Bob', age = 20 WHERE id = 1"
        );
    }

    #[test]
    fn test_update_requires_data() {
        let err = pg_query(vec![]).update_sql(&Record::new()).unwrap_err();
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_delete_sql() {
        assert_eq!(
            pg_query(vec![Condition::lt("age", 18)]).delete_sql().unwrap(),
            "DELETE FROM players WHERE age < 18"
        );
        assert_eq!(pg_query(vec![]).delete_sql().unwrap(), "DELETE FROM players");
    }

    #[tokio::test]
    async fn test_first_without_rows() {
        let mut query = pg_query(vec![Condition::eq("age", 19)]);
        let err = query.first().await.unwrap_err();
        assert!(matches!(err, QueryError::NoRows));
    }

    #[tokio::test]
    async fn test_count_without_rows_is_zero() {
        let mut query = pg_query(vec![]);
        assert_eq!(query.count().await.unwrap(), 0);
    }
}
