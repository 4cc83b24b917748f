use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use async_trait::async_trait;

use serde_json::Value;

use super::{
    new_tx_id, Bookmark, Cursor, FieldCondition, KeyModification, LedgerStore,
    QueryRecord, QueryResponse, RichQuery, SortOrder, StoreError, MIGRATION_001_INITIAL,
};
use super::query::type_rank;

/// Ledger store persisted in a SQLite database.
///
/// `world_state` holds the live value of each key and `key_history` every committed
/// version. Each write touches both tables inside one SQL transaction.
pub struct SqliteLedgerStore {
    pool: SqlitePool,
}

impl SqliteLedgerStore {
    /// Create a new store with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| StoreError::Read(format!("Failed to connect to database: {}", e)))?;
        Ok(Self::new(pool))
    }

    /// Create the ledger tables if they are missing.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Write(format!("Failed to run migration 001: {}", e)))?;
        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self, StoreError> {
        let store = Self::connect(database_url).await?;
        store.migrate().await?;
        Ok(store)
    }

    /// Commit one version of `key`: update world state and append to history.
    async fn commit_version(
        &self,
        key: &str,
        value: Option<String>,
    ) -> Result<(), StoreError> {
        let write_err = |context: &str, e: sqlx::Error| {
            StoreError::Write(format!("{} for key {}: {}", context, key, e))
        };

        let tx_id = new_tx_id();
        let now = Utc::now().to_rfc3339();
        let is_delete = value.is_none();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| write_err("Failed to begin transaction", e))?;

        match &value {
            Some(value) => {
                sqlx::query(
                    r#"
                    INSERT INTO world_state (key, value, tx_id, updated_at)
                    VALUES (?, ?, ?, ?)
                    ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        tx_id = excluded.tx_id,
                        updated_at = excluded.updated_at
                    "#,
                )
                .bind(key)
                .bind(value)
                .bind(&tx_id)
                .bind(&now)
                .execute(&mut *tx)
                .await
                .map_err(|e| write_err("Failed to write state", e))?;
            }
            None => {
                let removed = sqlx::query("DELETE FROM world_state WHERE key = ?")
                    .bind(key)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| write_err("Failed to delete state", e))?;

                // Nothing to delete: leave history untouched.
                if removed.rows_affected() == 0 {
                    return Ok(());
                }
            }
        }

        sqlx::query(
            r#"
            INSERT INTO key_history (key, tx_id, timestamp, is_delete, value)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(key)
        .bind(&tx_id)
        .bind(&now)
        .bind(is_delete)
        .bind(value.unwrap_or_default())
        .execute(&mut *tx)
        .await
        .map_err(|e| write_err("Failed to append history", e))?;

        tx.commit()
            .await
            .map_err(|e| write_err("Failed to commit", e))?;
        Ok(())
    }

    fn row_to_modification(row: &sqlx::sqlite::SqliteRow) -> Result<KeyModification, StoreError> {
        let timestamp_str: String = row.get("timestamp");
        let value: String = row.get("value");

        Ok(KeyModification {
            tx_id: row.get("tx_id"),
            timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                .map_err(|e| StoreError::Read(format!("Invalid history timestamp: {}", e)))?
                .with_timezone(&Utc),
            is_delete: row.get::<i32, _>("is_delete") != 0,
            value: value.into_bytes(),
        })
    }
}

/// Value bound into a rich-query statement.
#[derive(Clone)]
enum SqlArg {
    Int(i64),
    Real(f64),
    Text(String),
}

/// `json_extract` of a top-level field. Only called with names that passed
/// [`RichQuery::validate`], so the path can be inlined.
fn extract(field: &str) -> String {
    format!("json_extract(value, '$.{}')", field)
}

/// SQL for the type rank of a field, matching `compare_json`:
/// missing/null < bool < number < string < array/object.
fn rank_expr(field: &str) -> String {
    format!(
        "(CASE json_type(value, '$.{}') \
         WHEN 'true' THEN 1 WHEN 'false' THEN 1 \
         WHEN 'integer' THEN 2 WHEN 'real' THEN 2 \
         WHEN 'text' THEN 3 \
         WHEN 'array' THEN 4 WHEN 'object' THEN 4 \
         ELSE 0 END)",
        field
    )
}

/// SQL for the value compared within one rank. Missing and null fields all compare as 0.
fn value_expr(field: &str) -> String {
    format!("COALESCE({}, 0)", extract(field))
}

/// Rank and comparable value of a sort value recorded in a bookmark.
fn bound_args(value: &Value) -> (i64, SqlArg) {
    let rank = i64::from(type_rank(Some(value)));
    let arg = match value {
        Value::Null => SqlArg::Int(0),
        Value::Bool(b) => SqlArg::Int(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(SqlArg::Int)
            .unwrap_or_else(|| SqlArg::Real(n.as_f64().unwrap_or(0.0))),
        Value::String(s) => SqlArg::Text(s.clone()),
        other => SqlArg::Text(other.to_string()),
    };
    (rank, arg)
}

/// WHERE clause selecting records strictly after `cursor` in the query's order.
fn after_clause(query: &RichQuery, cursor: &Cursor) -> (String, Vec<SqlArg>) {
    let mut clause = "key > ?".to_string();
    let mut args = vec![SqlArg::Text(cursor.key.clone())];

    for ((field, order), bound) in query
        .sort_keys()
        .into_iter()
        .zip(&cursor.values)
        .rev()
    {
        let op = match order {
            SortOrder::Asc => ">",
            SortOrder::Desc => "<",
        };
        let rank = rank_expr(field);
        let value = value_expr(field);
        clause = format!(
            "({rank} {op} ? OR ({rank} = ? AND ({value} {op} ? OR ({value} = ? AND {clause}))))"
        );

        let (bound_rank, bound_value) = bound_args(bound);
        let mut prefix = vec![
            SqlArg::Int(bound_rank),
            SqlArg::Int(bound_rank),
            bound_value.clone(),
            bound_value,
        ];
        prefix.append(&mut args);
        args = prefix;
    }

    (clause, args)
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::Write("Key must not be empty".to_string()));
        }
        let text = String::from_utf8(value)
            .map_err(|_| StoreError::Write(format!("Value for key {} is not UTF-8", key)))?;

        self.commit_version(key, Some(text)).await?;
        tracing::debug!(key, "sqlite store put");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let row = sqlx::query("SELECT value FROM world_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Read(format!("Failed to read key {}: {}", key, e)))?;

        Ok(row
            .map(|row| row.get::<String, _>("value"))
            .filter(|value| !value.is_empty())
            .map(String::into_bytes))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.commit_version(key, None).await?;
        tracing::debug!(key, "sqlite store delete");
        Ok(())
    }

    async fn get_history(&self, key: &str) -> Result<Vec<KeyModification>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT tx_id, timestamp, is_delete, value
            FROM key_history
            WHERE key = ?
            ORDER BY seq
            "#,
        )
        .bind(key)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Read(format!("Failed to read history for key {}: {}", key, e)))?;

        rows.iter().map(Self::row_to_modification).collect()
    }

    async fn query_paginated(
        &self,
        query: &RichQuery,
        page_size: usize,
        bookmark: &str,
    ) -> Result<QueryResponse, StoreError> {
        query.validate()?;
        let start = Bookmark::decode(bookmark, query)?;

        let limit = i64::try_from(page_size)
            .map_err(|_| StoreError::Query(format!("Page size {} is too large", page_size)))?;

        // Non-JSON values are skipped rather than failing json_extract.
        let mut sql = String::from("SELECT key, value FROM world_state WHERE json_valid(value)");
        let mut args: Vec<SqlArg> = Vec::new();

        for (field, condition) in &query.selector {
            match condition {
                FieldCondition::Exists { exists: true } => {
                    sql.push_str(&format!(" AND {} IS NOT NULL", extract(field)));
                }
                FieldCondition::Exists { exists: false } => {
                    sql.push_str(&format!(" AND {} IS NULL", extract(field)));
                }
                FieldCondition::Equals { value } => {
                    // Compare JSON-encoded forms so strings, numbers and booleans all match exactly.
                    sql.push_str(&format!(
                        " AND json_quote({}) = json_quote(json(?))",
                        extract(field)
                    ));
                    args.push(SqlArg::Text(value.to_string()));
                }
            }
        }

        if let Some(cursor) = &start.after {
            let (clause, mut cursor_args) = after_clause(query, cursor);
            sql.push_str(&format!(" AND {}", clause));
            args.append(&mut cursor_args);
        }

        sql.push_str(" ORDER BY ");
        for (field, order) in query.sort_keys() {
            let direction = match order {
                SortOrder::Asc => "ASC",
                SortOrder::Desc => "DESC",
            };
            sql.push_str(&format!(
                "{} {dir}, {} {dir}, ",
                rank_expr(field),
                value_expr(field),
                dir = direction
            ));
        }
        sql.push_str("key ASC LIMIT ?");
        args.push(SqlArg::Int(limit));

        let mut sql_query = sqlx::query(&sql);
        for arg in args {
            sql_query = match arg {
                SqlArg::Int(i) => sql_query.bind(i),
                SqlArg::Real(f) => sql_query.bind(f),
                SqlArg::Text(t) => sql_query.bind(t),
            };
        }

        tracing::debug!(query = %query.to_json_string(), page_size, "sqlite rich query");

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Query(format!("Rich query failed: {}", e)))?;

        let records: Vec<QueryRecord> = rows
            .iter()
            .map(|row| QueryRecord {
                key: row.get("key"),
                value: row.get::<String, _>("value").into_bytes(),
            })
            .collect();

        let next = match records.last() {
            Some(last) => {
                let document: Value = serde_json::from_slice(&last.value).map_err(|e| {
                    StoreError::Query(format!("Record at key {} is not JSON: {}", last.key, e))
                })?;
                Bookmark::after(query, Cursor::of(query, &document, &last.key))
            }
            None => start,
        };

        Ok(QueryResponse {
            fetched_records_count: records.len(),
            records,
            bookmark: next.encode(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    async fn test_store() -> (SqliteLedgerStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("ledger.db");
        let url = format!("sqlite:{}?mode=rwc", db_path.to_str().unwrap());
        let store = SqliteLedgerStore::init(&url).await.unwrap();
        (store, temp_dir)
    }

    fn doc(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[tokio::test]
    async fn test_put_get_history() {
        let (store, _temp) = test_store().await;

        store.put("k", b"v1".to_vec()).await.unwrap();
        store.put("k", b"v2".to_vec()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v2".to_vec()));

        let history = store.get_history("k").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].value, b"v1".to_vec());
        assert_eq!(history[1].value, b"v2".to_vec());
        assert!(!history[1].is_delete);
    }

    #[tokio::test]
    async fn test_delete_records_tombstone() {
        let (store, _temp) = test_store().await;

        store.put("k", b"v1".to_vec()).await.unwrap();
        store.delete("k").await.unwrap();
        store.delete("never-written").await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), None);
        let history = store.get_history("k").await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[1].is_delete);
        assert!(store.get_history("never-written").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_selector_and_sort() {
        let (store, _temp) = test_store().await;
        store
            .put("A", doc(json!({"orderId": "A", "createdAt": "2024-01-01", "slotId": "S2"})))
            .await
            .unwrap();
        store
            .put("B", doc(json!({"orderId": "B", "createdAt": "2024-01-02", "slotId": "S1"})))
            .await
            .unwrap();
        store.put("asset", doc(json!({"assetId": "x"}))).await.unwrap();
        store.put("raw", b"plain text".to_vec()).await.unwrap();

        let query = RichQuery::new()
            .field_exists("orderId")
            .sort_by("slotId", SortOrder::Asc);
        let page = store.query_paginated(&query, 10, "").await.unwrap();
        let keys: Vec<_> = page.records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["B", "A"]);

        let eq = RichQuery::new()
            .field_equals("orderId", json!("A"))
            .sort_by("createdAt", SortOrder::Desc);
        let page = store.query_paginated(&eq, 10, "").await.unwrap();
        assert_eq!(page.fetched_records_count, 1);
        assert_eq!(page.records[0].key, "A");
    }

    #[tokio::test]
    async fn test_query_rejects_bad_bookmark() {
        let (store, _temp) = test_store().await;
        let query = RichQuery::new().field_exists("orderId");
        let result = store.query_paginated(&query, 10, "not-a-bookmark").await;
        assert!(matches!(result, Err(StoreError::Query(_))));
    }

    #[tokio::test]
    async fn test_page_size_beyond_sql_range_is_rejected() {
        let (store, _temp) = test_store().await;
        store.put("A", doc(json!({"orderId": "A"}))).await.unwrap();

        let query = RichQuery::new().field_exists("orderId");
        let result = store.query_paginated(&query, usize::MAX, "").await;
        assert!(matches!(result, Err(StoreError::Query(_))));
    }

    #[tokio::test]
    async fn test_bookmark_resumes_after_last_record_despite_new_writes() {
        let (store, _temp) = test_store().await;
        for (key, created_at) in [("A", "2024-01-01"), ("B", "2024-01-02"), ("C", "2024-01-03")] {
            store
                .put(key, doc(json!({"orderId": key, "createdAt": created_at})))
                .await
                .unwrap();
        }
        let query = RichQuery::new()
            .field_exists("orderId")
            .sort_by("createdAt", SortOrder::Desc);

        let first = store.query_paginated(&query, 2, "").await.unwrap();
        store
            .put("D", doc(json!({"orderId": "D", "createdAt": "2024-01-04"})))
            .await
            .unwrap();

        let second = store
            .query_paginated(&query, 2, &first.bookmark)
            .await
            .unwrap();
        let keys: Vec<_> = second.records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["A"]);
    }
}
