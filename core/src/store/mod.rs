//! Storage abstraction over the single-table data model.
//!
//! [`CoreStore`] is the seam every domain module (`identity`, `goals`,
//! `quests`, `guilds`, `collaboration`, `messaging`, `gamification`,
//! `subscription`) goes through to read and write entities. [`pg::PgCoreStore`]
//! is the production implementation over Postgres; [`memory::MemoryCoreStore`]
//! backs unit tests without a running database.

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::EntityType;
use crate::error::Result;

pub use memory::MemoryCoreStore;
pub use pg::PgCoreStore;

/// One of the five secondary-index slots mapped onto `gsi{n}_pk`/`gsi{n}_sk`
/// columns. Which semantic access pattern lives in which slot is a property
/// of the domain module that wrote the item, not of the store itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GsiIndex {
    Gsi1,
    Gsi2,
    Gsi3,
    Gsi4,
    Gsi5,
}

impl GsiIndex {
    pub fn pk_column(self) -> &'static str {
        match self {
            Self::Gsi1 => "gsi1_pk",
            Self::Gsi2 => "gsi2_pk",
            Self::Gsi3 => "gsi3_pk",
            Self::Gsi4 => "gsi4_pk",
            Self::Gsi5 => "gsi5_pk",
        }
    }

    pub fn sk_column(self) -> &'static str {
        match self {
            Self::Gsi1 => "gsi1_sk",
            Self::Gsi2 => "gsi2_sk",
            Self::Gsi3 => "gsi3_sk",
            Self::Gsi4 => "gsi4_sk",
            Self::Gsi5 => "gsi5_sk",
        }
    }
}

/// A single row in the wide table: a primary key, an entity payload, and
/// whichever GSI columns that entity's access patterns need populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreItem {
    pub pk: String,
    pub sk: String,
    pub entity_type: EntityType,
    pub attrs: serde_json::Value,
    pub version: i64,
    pub gsi1_pk: Option<String>,
    pub gsi1_sk: Option<String>,
    pub gsi2_pk: Option<String>,
    pub gsi2_sk: Option<String>,
    pub gsi3_pk: Option<String>,
    pub gsi3_sk: Option<String>,
    pub gsi4_pk: Option<String>,
    pub gsi4_sk: Option<String>,
    pub gsi5_pk: Option<String>,
    pub gsi5_sk: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoreItem {
    /// A new item with `version` 1 and no GSI columns populated. Callers set
    /// whichever `gsiN_*` fields their access patterns need.
    pub fn new(pk: impl Into<String>, sk: impl Into<String>, entity_type: EntityType, attrs: serde_json::Value) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
            entity_type,
            attrs,
            version: 1,
            gsi1_pk: None,
            gsi1_sk: None,
            gsi2_pk: None,
            gsi2_sk: None,
            gsi3_pk: None,
            gsi3_sk: None,
            gsi4_pk: None,
            gsi4_sk: None,
            gsi5_pk: None,
            gsi5_sk: None,
            expires_at: None,
        }
    }

    pub fn with_gsi(mut self, index: GsiIndex, pk: impl Into<String>, sk: impl Into<String>) -> Self {
        let pk = Some(pk.into());
        let sk = Some(sk.into());
        match index {
            GsiIndex::Gsi1 => (self.gsi1_pk, self.gsi1_sk) = (pk, sk),
            GsiIndex::Gsi2 => (self.gsi2_pk, self.gsi2_sk) = (pk, sk),
            GsiIndex::Gsi3 => (self.gsi3_pk, self.gsi3_sk) = (pk, sk),
            GsiIndex::Gsi4 => (self.gsi4_pk, self.gsi4_sk) = (pk, sk),
            GsiIndex::Gsi5 => (self.gsi5_pk, self.gsi5_sk) = (pk, sk),
        }
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn attrs_as<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        serde_json::from_value(self.attrs.clone())
            .map_err(|e| crate::error::Error::Internal(format!("item deserialization failed: {e}")))
    }
}

/// Opaque pagination cursor. Callers pass the cursor from a previous
/// [`Page`] back in verbatim; the two store implementations interpret it
/// differently (an offset for memory, a keyset bookmark for Postgres) but
/// neither exposes its internals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cursor(pub String);

/// Pagination request. `limit` is clamped to `[1, 100]` by both
/// implementations; callers default to 25 per the external list APIs.
#[derive(Debug, Clone)]
pub struct CursorPagination {
    pub limit: u32,
    pub cursor: Option<Cursor>,
}

impl CursorPagination {
    pub const DEFAULT_LIMIT: u32 = 25;
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(limit: Option<u32>, cursor: Option<Cursor>) -> Self {
        let limit = limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT);
        Self { limit, cursor }
    }
}

impl Default for CursorPagination {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            cursor: None,
        }
    }
}

/// A page of results plus the cursor to fetch the next one, if any.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<Cursor>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl Fn(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }
}

/// A single operation inside a [`CoreStore::transact_write`] batch.
pub enum TransactOp {
    Put(StoreItem),
    /// Update with an expected version; the whole transaction fails with
    /// `StoreErrorKind::ConstraintViolation` if any item's version mismatches.
    UpdateVersioned {
        pk: String,
        sk: String,
        expected_version: i64,
        attrs: serde_json::Value,
    },
    Delete { pk: String, sk: String },
    /// Fails the transaction if the key already exists, used for uniqueness
    /// guards (e.g. email-to-user-id reservation records).
    PutIfAbsent(StoreItem),
}

/// Outcome of a bounded cascading delete (e.g. deleting a guild's members
/// and join requests alongside the guild item itself).
#[derive(Debug, Clone, Default)]
pub struct CascadeDeleteOutcome {
    pub deleted: u64,
    /// `true` if the cascade hit `max_items` and more rows remain under the
    /// partition; callers should re-invoke to keep deleting.
    pub truncated: bool,
}

/// Storage seam for the single-table data model.
///
/// Every domain module is generic over `Arc<dyn CoreStore>` rather than a
/// concrete Postgres type, so unit tests can swap in
/// [`memory::MemoryCoreStore`] without a running database.
#[async_trait]
pub trait CoreStore: Send + Sync {
    async fn put(&self, item: StoreItem) -> Result<()>;

    /// Like `put`, but fails with `StoreErrorKind::ConstraintViolation` if an
    /// item already exists at `(pk, sk)`.
    async fn put_if_absent(&self, item: StoreItem) -> Result<()>;

    async fn get(&self, pk: &str, sk: &str) -> Result<Option<StoreItem>>;

    /// Query all items under a partition, optionally restricted to sort keys
    /// with the given prefix, ordered by sort key ascending.
    async fn query_partition(
        &self,
        pk: &str,
        sk_prefix: Option<&str>,
        pagination: CursorPagination,
    ) -> Result<Page<StoreItem>>;

    /// Query a secondary index, mirroring `query_partition` but against
    /// `gsi{n}_pk`/`gsi{n}_sk`.
    async fn query_index(
        &self,
        index: GsiIndex,
        pk: &str,
        sk_prefix: Option<&str>,
        pagination: CursorPagination,
    ) -> Result<Page<StoreItem>>;

    /// Optimistic-concurrency update: succeeds only if the stored version
    /// equals `expected_version`, then increments it. Returns the updated
    /// item. Fails with `StoreErrorKind::ConstraintViolation` on mismatch.
    async fn update_with_version(
        &self,
        pk: &str,
        sk: &str,
        expected_version: i64,
        attrs: serde_json::Value,
    ) -> Result<StoreItem>;

    async fn delete(&self, pk: &str, sk: &str) -> Result<()>;

    /// Delete up to `max_items` rows under `pk` with the given sort-key
    /// prefix. Used for bounded cascades; callers loop while `truncated`.
    async fn delete_cascade(&self, pk: &str, sk_prefix: &str, max_items: u32) -> Result<CascadeDeleteOutcome>;

    async fn transact_write(&self, ops: Vec<TransactOp>) -> Result<()>;
}

/// Retry a fallible store operation up to 3 attempts with exponential
/// backoff (50ms, 200ms), retrying only errors `StoreError::is_retriable`
/// (connection failures, timeouts, pool exhaustion) and never constraint
/// violations or not-found.
pub async fn retry_store_op<T, F, Fut>(mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    const DELAYS_MS: [u64; 2] = [50, 200];
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(crate::error::Error::Store(e)) if e.is_retriable() && attempt < DELAYS_MS.len() => {
                tokio::time::sleep(std::time::Duration::from_millis(DELAYS_MS[attempt])).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_pagination_clamps_limit() {
        let p = CursorPagination::new(Some(500), None);
        assert_eq!(p.limit, CursorPagination::MAX_LIMIT);

        let p = CursorPagination::new(Some(0), None);
        assert_eq!(p.limit, 1);
    }

    #[test]
    fn cursor_pagination_defaults_to_25() {
        let p = CursorPagination::default();
        assert_eq!(p.limit, 25);
        assert!(p.cursor.is_none());
    }

    #[test]
    fn gsi_index_columns_are_distinct() {
        let columns: Vec<_> = [
            GsiIndex::Gsi1,
            GsiIndex::Gsi2,
            GsiIndex::Gsi3,
            GsiIndex::Gsi4,
            GsiIndex::Gsi5,
        ]
        .iter()
        .map(|i| i.pk_column())
        .collect();
        let unique: std::collections::HashSet<_> = columns.iter().collect();
        assert_eq!(unique.len(), columns.len());
    }
}
