//! Postgres implementation of [`CoreStore`] over the wide-row table.
//!
//! ```sql
//! CREATE TABLE core_items (
//!     pk          TEXT NOT NULL,
//!     sk          TEXT NOT NULL,
//!     entity_type TEXT NOT NULL,
//!     attrs       JSONB NOT NULL,
//!     version     BIGINT NOT NULL DEFAULT 1,
//!     gsi1_pk     TEXT, gsi1_sk TEXT,
//!     gsi2_pk     TEXT, gsi2_sk TEXT,
//!     gsi3_pk     TEXT, gsi3_sk TEXT,
//!     gsi4_pk     TEXT, gsi4_sk TEXT,
//!     gsi5_pk     TEXT, gsi5_sk TEXT,
//!     expires_at  TIMESTAMPTZ,
//!     PRIMARY KEY (pk, sk)
//! );
//! CREATE INDEX ON core_items (gsi1_pk, gsi1_sk);
//! -- ... repeated for gsi2..gsi5
//! ```
//!
//! Built against the runtime (non-macro) `sqlx` query API, since this crate
//! doesn't assume a reachable database at build time.

use async_trait::async_trait;
use base64::Engine;
use sqlx::{postgres::PgRow, PgPool, Row};

use super::{CascadeDeleteOutcome, CoreStore, Cursor, CursorPagination, GsiIndex, Page, StoreItem, TransactOp};
use crate::error::{Error, Result, StoreError, StoreOperation};

/// Table name is configurable per deployment (`core_table` / `guild_table`
/// in [`crate::config::Config`]); callers construct one `PgCoreStore` per
/// logical table.
pub struct PgCoreStore {
    pool: PgPool,
    table: String,
}

impl PgCoreStore {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    fn row_to_item(row: &PgRow) -> Result<StoreItem> {
        let entity_type_raw: String = row.try_get("entity_type").map_err(|e| store_err(StoreOperation::Query, e))?;
        let entity_type = serde_json::from_value(serde_json::Value::String(entity_type_raw))
            .map_err(|e| Error::Internal(format!("unknown entity_type in row: {e}")))?;

        Ok(StoreItem {
            pk: row.try_get("pk").map_err(|e| store_err(StoreOperation::Query, e))?,
            sk: row.try_get("sk").map_err(|e| store_err(StoreOperation::Query, e))?,
            entity_type,
            attrs: row.try_get("attrs").map_err(|e| store_err(StoreOperation::Query, e))?,
            version: row.try_get("version").map_err(|e| store_err(StoreOperation::Query, e))?,
            gsi1_pk: row.try_get("gsi1_pk").ok(),
            gsi1_sk: row.try_get("gsi1_sk").ok(),
            gsi2_pk: row.try_get("gsi2_pk").ok(),
            gsi2_sk: row.try_get("gsi2_sk").ok(),
            gsi3_pk: row.try_get("gsi3_pk").ok(),
            gsi3_sk: row.try_get("gsi3_sk").ok(),
            gsi4_pk: row.try_get("gsi4_pk").ok(),
            gsi4_sk: row.try_get("gsi4_sk").ok(),
            gsi5_pk: row.try_get("gsi5_pk").ok(),
            gsi5_sk: row.try_get("gsi5_sk").ok(),
            expires_at: row.try_get("expires_at").ok(),
        })
    }

    fn encode_cursor(sk: &str) -> Cursor {
        Cursor(base64::engine::general_purpose::STANDARD.encode(sk))
    }

    fn decode_cursor(cursor: &Cursor) -> Result<String> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&cursor.0)
            .map_err(|_| Error::Validation("invalid pagination cursor".to_string()))?;
        String::from_utf8(bytes).map_err(|_| Error::Validation("invalid pagination cursor".to_string()))
    }

    async fn put_once(&self, item: &StoreItem) -> Result<()> {
        let query = format!(
            "INSERT INTO {} (pk, sk, entity_type, attrs, version, gsi1_pk, gsi1_sk, gsi2_pk, gsi2_sk, \
             gsi3_pk, gsi3_sk, gsi4_pk, gsi4_sk, gsi5_pk, gsi5_sk, expires_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16) \
             ON CONFLICT (pk, sk) DO UPDATE SET \
             entity_type = EXCLUDED.entity_type, attrs = EXCLUDED.attrs, version = EXCLUDED.version, \
             gsi1_pk = EXCLUDED.gsi1_pk, gsi1_sk = EXCLUDED.gsi1_sk, gsi2_pk = EXCLUDED.gsi2_pk, \
             gsi2_sk = EXCLUDED.gsi2_sk, gsi3_pk = EXCLUDED.gsi3_pk, gsi3_sk = EXCLUDED.gsi3_sk, \
             gsi4_pk = EXCLUDED.gsi4_pk, gsi4_sk = EXCLUDED.gsi4_sk, gsi5_pk = EXCLUDED.gsi5_pk, \
             gsi5_sk = EXCLUDED.gsi5_sk, expires_at = EXCLUDED.expires_at",
            self.table
        );

        let entity_type_str = serde_json::to_value(item.entity_type)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        sqlx::query(&query)
            .bind(&item.pk)
            .bind(&item.sk)
            .bind(entity_type_str)
            .bind(&item.attrs)
            .bind(item.version)
            .bind(&item.gsi1_pk)
            .bind(&item.gsi1_sk)
            .bind(&item.gsi2_pk)
            .bind(&item.gsi2_sk)
            .bind(&item.gsi3_pk)
            .bind(&item.gsi3_sk)
            .bind(&item.gsi4_pk)
            .bind(&item.gsi4_sk)
            .bind(&item.gsi5_pk)
            .bind(&item.gsi5_sk)
            .bind(item.expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| store_err(StoreOperation::Insert, e))?;

        Ok(())
    }

    async fn update_with_version_once(&self, pk: &str, sk: &str, expected_version: i64, attrs: &serde_json::Value) -> Result<StoreItem> {
        let query = format!(
            "UPDATE {} SET attrs = $1, version = version + 1 \
             WHERE pk = $2 AND sk = $3 AND version = $4 RETURNING *",
            self.table
        );

        let row = sqlx::query(&query)
            .bind(attrs)
            .bind(pk)
            .bind(sk)
            .bind(expected_version)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err(StoreOperation::Update, e))?;

        match row {
            Some(row) => Self::row_to_item(&row),
            None => Err(Error::ConflictVersion(format!(
                "version mismatch updating {pk}/{sk}: expected {expected_version}"
            ))),
        }
    }
}

fn store_err(operation: StoreOperation, e: sqlx::Error) -> Error {
    let mut store_error = StoreError::from(e);
    store_error.operation = operation;
    Error::Store(store_error)
}

#[async_trait]
impl CoreStore for PgCoreStore {
    async fn put(&self, item: StoreItem) -> Result<()> {
        super::retry_store_op(|| self.put_once(&item)).await
    }

    async fn put_if_absent(&self, item: StoreItem) -> Result<()> {
        let query = format!(
            "INSERT INTO {} (pk, sk, entity_type, attrs, version) VALUES ($1,$2,$3,$4,$5)",
            self.table
        );
        let entity_type_str = serde_json::to_value(item.entity_type)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        sqlx::query(&query)
            .bind(&item.pk)
            .bind(&item.sk)
            .bind(entity_type_str)
            .bind(&item.attrs)
            .bind(item.version)
            .execute(&self.pool)
            .await
            .map_err(|e| store_err(StoreOperation::Insert, e))?;

        Ok(())
    }

    async fn get(&self, pk: &str, sk: &str) -> Result<Option<StoreItem>> {
        let query = format!("SELECT * FROM {} WHERE pk = $1 AND sk = $2", self.table);
        let row = sqlx::query(&query)
            .bind(pk)
            .bind(sk)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err(StoreOperation::Query, e))?;

        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn query_partition(
        &self,
        pk: &str,
        sk_prefix: Option<&str>,
        pagination: CursorPagination,
    ) -> Result<Page<StoreItem>> {
        let after_sk = pagination.cursor.as_ref().map(Self::decode_cursor).transpose()?;
        let limit = i64::from(pagination.limit);

        let query = format!(
            "SELECT * FROM {} WHERE pk = $1 \
             AND ($2::text IS NULL OR sk LIKE $2 || '%') \
             AND ($3::text IS NULL OR sk > $3) \
             ORDER BY sk ASC LIMIT $4",
            self.table
        );

        let rows = sqlx::query(&query)
            .bind(pk)
            .bind(sk_prefix)
            .bind(&after_sk)
            .bind(limit + 1)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_err(StoreOperation::Query, e))?;

        page_from_rows(rows, pagination.limit, Self::row_to_item, |item| item.sk.clone())
    }

    async fn query_index(
        &self,
        index: GsiIndex,
        pk: &str,
        sk_prefix: Option<&str>,
        pagination: CursorPagination,
    ) -> Result<Page<StoreItem>> {
        let after_sk = pagination.cursor.as_ref().map(Self::decode_cursor).transpose()?;
        let limit = i64::from(pagination.limit);

        let query = format!(
            "SELECT * FROM {} WHERE {} = $1 \
             AND ($2::text IS NULL OR {} LIKE $2 || '%') \
             AND ($3::text IS NULL OR {} > $3) \
             ORDER BY {} ASC LIMIT $4",
            self.table,
            index.pk_column(),
            index.sk_column(),
            index.sk_column(),
            index.sk_column(),
        );

        let rows = sqlx::query(&query)
            .bind(pk)
            .bind(sk_prefix)
            .bind(&after_sk)
            .bind(limit + 1)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_err(StoreOperation::Query, e))?;

        page_from_rows(rows, pagination.limit, Self::row_to_item, |item| item.sk.clone())
    }

    async fn update_with_version(
        &self,
        pk: &str,
        sk: &str,
        expected_version: i64,
        attrs: serde_json::Value,
    ) -> Result<StoreItem> {
        super::retry_store_op(|| self.update_with_version_once(pk, sk, expected_version, &attrs)).await
    }

    async fn delete(&self, pk: &str, sk: &str) -> Result<()> {
        let query = format!("DELETE FROM {} WHERE pk = $1 AND sk = $2", self.table);
        sqlx::query(&query)
            .bind(pk)
            .bind(sk)
            .execute(&self.pool)
            .await
            .map_err(|e| store_err(StoreOperation::Delete, e))?;
        Ok(())
    }

    async fn delete_cascade(&self, pk: &str, sk_prefix: &str, max_items: u32) -> Result<CascadeDeleteOutcome> {
        let query = format!(
            "WITH victims AS (
                 SELECT pk, sk FROM {} WHERE pk = $1 AND sk LIKE $2 || '%' LIMIT $3
             )
             DELETE FROM {} t USING victims v WHERE t.pk = v.pk AND t.sk = v.sk",
            self.table, self.table
        );

        let result = sqlx::query(&query)
            .bind(pk)
            .bind(sk_prefix)
            .bind(i64::from(max_items))
            .execute(&self.pool)
            .await
            .map_err(|e| store_err(StoreOperation::Delete, e))?;

        let deleted = result.rows_affected();
        Ok(CascadeDeleteOutcome {
            deleted,
            truncated: deleted == u64::from(max_items),
        })
    }

    async fn transact_write(&self, ops: Vec<TransactOp>) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_err(StoreOperation::Transaction, e))?;

        for op in ops {
            match op {
                TransactOp::Put(item) => {
                    let query = format!(
                        "INSERT INTO {} (pk, sk, entity_type, attrs, version) VALUES ($1,$2,$3,$4,$5) \
                         ON CONFLICT (pk, sk) DO UPDATE SET attrs = EXCLUDED.attrs, version = EXCLUDED.version",
                        self.table
                    );
                    let entity_type_str = serde_json::to_value(item.entity_type)
                        .ok()
                        .and_then(|v| v.as_str().map(str::to_string))
                        .unwrap_or_default();
                    sqlx::query(&query)
                        .bind(&item.pk)
                        .bind(&item.sk)
                        .bind(entity_type_str)
                        .bind(&item.attrs)
                        .bind(item.version)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| store_err(StoreOperation::Transaction, e))?;
                }
                TransactOp::PutIfAbsent(item) => {
                    let query = format!(
                        "INSERT INTO {} (pk, sk, entity_type, attrs, version) VALUES ($1,$2,$3,$4,$5)",
                        self.table
                    );
                    let entity_type_str = serde_json::to_value(item.entity_type)
                        .ok()
                        .and_then(|v| v.as_str().map(str::to_string))
                        .unwrap_or_default();
                    sqlx::query(&query)
                        .bind(&item.pk)
                        .bind(&item.sk)
                        .bind(entity_type_str)
                        .bind(&item.attrs)
                        .bind(item.version)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| store_err(StoreOperation::Transaction, e))?;
                }
                TransactOp::UpdateVersioned {
                    pk,
                    sk,
                    expected_version,
                    attrs,
                } => {
                    let query = format!(
                        "UPDATE {} SET attrs = $1, version = version + 1 \
                         WHERE pk = $2 AND sk = $3 AND version = $4",
                        self.table
                    );
                    let result = sqlx::query(&query)
                        .bind(&attrs)
                        .bind(&pk)
                        .bind(&sk)
                        .bind(expected_version)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| store_err(StoreOperation::Transaction, e))?;
                    if result.rows_affected() == 0 {
                        return Err(Error::ConflictVersion(format!(
                            "version mismatch updating {pk}/{sk} in transaction"
                        )));
                    }
                }
                TransactOp::Delete { pk, sk } => {
                    let query = format!("DELETE FROM {} WHERE pk = $1 AND sk = $2", self.table);
                    sqlx::query(&query)
                        .bind(&pk)
                        .bind(&sk)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| store_err(StoreOperation::Transaction, e))?;
                }
            }
        }

        tx.commit().await.map_err(|e| store_err(StoreOperation::Transaction, e))?;
        Ok(())
    }
}

fn page_from_rows(
    rows: Vec<PgRow>,
    limit: u32,
    to_item: impl Fn(&PgRow) -> Result<StoreItem>,
    sort_key: impl Fn(&StoreItem) -> String,
) -> Result<Page<StoreItem>> {
    let limit = limit as usize;
    let mut items: Vec<StoreItem> = rows.iter().map(to_item).collect::<Result<_>>()?;

    let next_cursor = if items.len() > limit {
        items.truncate(limit);
        items.last().map(|item| PgCoreStore::encode_cursor(&sort_key(item)))
    } else {
        None
    };

    Ok(Page { items, next_cursor })
}
