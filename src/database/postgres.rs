use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgArguments, PgPool, Row};
use uuid::Uuid;

use super::{project, DatabaseManager, take_or_assign_id, Collection, Document, DocumentStore, StoreError};
use crate::filter::{Filter, FilterWhere, SqlParam};

/// Record store over Postgres: each collection is a `(id UUID, doc JSONB)` table
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_document(collection: Collection, row: &sqlx::postgres::PgRow) -> Result<Document, StoreError> {
        let id: Uuid = row.try_get("id")?;
        let doc: Value = row.try_get("doc")?;
        match doc {
            Value::Object(mut map) => {
                map.insert("id".to_string(), Value::String(id.to_string()));
                Ok(map)
            }
            other => Err(StoreError::InvalidDocument {
                collection,
                message: format!("expected object, found {}", other),
            }),
        }
    }

    fn map_write_error(collection: Collection, err: sqlx::Error) -> StoreError {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or_default();
                let key = collection
                    .unique_keys()
                    .iter()
                    .find(|key| constraint.contains(*key))
                    .map(|key| key.to_string())
                    .unwrap_or_else(|| "id".to_string());
                return StoreError::Duplicate { collection, key };
            }
        }
        tracing::error!("Write to {} failed: {}", collection, err);
        StoreError::Sqlx(err)
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        projection: Option<&[&str]>,
    ) -> Result<Vec<Document>, StoreError> {
        let where_sql = FilterWhere::generate(filter, 0)?;
        let sql = format!(
            "SELECT id, doc FROM \"{}\" WHERE {} ORDER BY created_at, id",
            collection.name(),
            where_sql.query
        );

        let rows = bind_params(sqlx::query(&sql), &where_sql.params)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| Self::row_to_document(collection, row).map(|doc| project(doc, projection)))
            .collect()
    }

    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let where_sql = FilterWhere::generate(filter, 0)?;
        let sql = format!(
            "SELECT id, doc FROM \"{}\" WHERE {} ORDER BY created_at, id LIMIT 1",
            collection.name(),
            where_sql.query
        );

        let row = bind_params(sqlx::query(&sql), &where_sql.params)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| Self::row_to_document(collection, &row)).transpose()
    }

    async fn insert_one(&self, collection: Collection, mut document: Document) -> Result<Uuid, StoreError> {
        let id = take_or_assign_id(&mut document);
        let sql = format!("INSERT INTO \"{}\" (id, doc) VALUES ($1, $2)", collection.name());

        sqlx::query(&sql)
            .bind(id)
            .bind(Value::Object(document))
            .execute(&self.pool)
            .await
            .map_err(|e| Self::map_write_error(collection, e))?;

        Ok(id)
    }

    async fn update_one(&self, collection: Collection, filter: &Filter, mut patch: Document) -> Result<u64, StoreError> {
        patch.remove("id");
        let table = collection.name();
        let where_sql = FilterWhere::generate(filter, 1)?;
        // The row lock makes concurrent conditional updates re-check the filter
        let sql = format!(
            "UPDATE \"{t}\" SET doc = doc || $1::jsonb WHERE id = (
                SELECT id FROM \"{t}\" WHERE {w} ORDER BY created_at, id LIMIT 1 FOR UPDATE
            )",
            t = table,
            w = where_sql.query
        );

        let result = bind_params(sqlx::query(&sql).bind(Value::Object(patch)), &where_sql.params)
            .execute(&self.pool)
            .await
            .map_err(|e| Self::map_write_error(collection, e))?;

        Ok(result.rows_affected())
    }

    async fn delete_one(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let table = collection.name();
        let where_sql = FilterWhere::generate(filter, 0)?;
        let sql = format!(
            "DELETE FROM \"{t}\" WHERE id = (
                SELECT id FROM \"{t}\" WHERE {w} ORDER BY created_at, id LIMIT 1 FOR UPDATE
            )",
            t = table,
            w = where_sql.query
        );

        let result = bind_params(sqlx::query(&sql), &where_sql.params)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn count_documents(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let where_sql = FilterWhere::generate(filter, 0)?;
        let sql = format!(
            "SELECT COUNT(*) AS count FROM \"{}\" WHERE {}",
            collection.name(),
            where_sql.query
        );

        let row = bind_params(sqlx::query(&sql), &where_sql.params)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        DatabaseManager::close(&self.pool).await;
    }
}

fn bind_params<'q>(
    mut q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    params: &[SqlParam],
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    for param in params {
        q = match param {
            SqlParam::Json(v) => q.bind(v.clone()),
            SqlParam::Text(s) => q.bind(s.clone()),
            SqlParam::Uuid(id) => q.bind(*id),
        };
    }
    q
}
