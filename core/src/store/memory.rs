//! In-memory [`CoreStore`] double for unit tests.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CascadeDeleteOutcome, CoreStore, Cursor, CursorPagination, GsiIndex, Page, StoreItem, TransactOp};
use crate::error::{Error, Result, StoreError, StoreErrorKind, StoreOperation};

/// Backed by a `Vec` behind an `RwLock`, scanned linearly. Fine for the
/// dataset sizes exercised in unit tests; not a performance model of
/// [`super::pg::PgCoreStore`].
#[derive(Default)]
pub struct MemoryCoreStore {
    items: RwLock<Vec<StoreItem>>,
}

impl MemoryCoreStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn index_key(item: &StoreItem, index: GsiIndex) -> Option<(&str, &str)> {
    match index {
        GsiIndex::Gsi1 => Some((item.gsi1_pk.as_deref()?, item.gsi1_sk.as_deref()?)),
        GsiIndex::Gsi2 => Some((item.gsi2_pk.as_deref()?, item.gsi2_sk.as_deref()?)),
        GsiIndex::Gsi3 => Some((item.gsi3_pk.as_deref()?, item.gsi3_sk.as_deref()?)),
        GsiIndex::Gsi4 => Some((item.gsi4_pk.as_deref()?, item.gsi4_sk.as_deref()?)),
        GsiIndex::Gsi5 => Some((item.gsi5_pk.as_deref()?, item.gsi5_sk.as_deref()?)),
    }
}

fn paginate(mut matches: Vec<StoreItem>, pagination: &CursorPagination) -> Page<StoreItem> {
    matches.sort_by(|a, b| a.sk.cmp(&b.sk));

    if let Some(cursor) = &pagination.cursor {
        let after = cursor.0.clone();
        matches.retain(|item| item.sk > after);
    }

    let limit = pagination.limit as usize;
    let next_cursor = if matches.len() > limit {
        matches.truncate(limit);
        matches.last().map(|item| Cursor(item.sk.clone()))
    } else {
        None
    };

    Page {
        items: matches,
        next_cursor,
    }
}

#[async_trait]
impl CoreStore for MemoryCoreStore {
    async fn put(&self, item: StoreItem) -> Result<()> {
        let mut items = self.items.write().await;
        if let Some(existing) = items.iter_mut().find(|i| i.pk == item.pk && i.sk == item.sk) {
            *existing = item;
        } else {
            items.push(item);
        }
        Ok(())
    }

    async fn put_if_absent(&self, item: StoreItem) -> Result<()> {
        let mut items = self.items.write().await;
        if items.iter().any(|i| i.pk == item.pk && i.sk == item.sk) {
            return Err(Error::Store(StoreError::new(
                StoreOperation::Insert,
                StoreErrorKind::ConstraintViolation,
                format!("item already exists at {}/{}", item.pk, item.sk),
            )));
        }
        items.push(item);
        Ok(())
    }

    async fn get(&self, pk: &str, sk: &str) -> Result<Option<StoreItem>> {
        let items = self.items.read().await;
        Ok(items.iter().find(|i| i.pk == pk && i.sk == sk).cloned())
    }

    async fn query_partition(
        &self,
        pk: &str,
        sk_prefix: Option<&str>,
        pagination: CursorPagination,
    ) -> Result<Page<StoreItem>> {
        let items = self.items.read().await;
        let matches: Vec<StoreItem> = items
            .iter()
            .filter(|i| i.pk == pk)
            .filter(|i| sk_prefix.map_or(true, |prefix| i.sk.starts_with(prefix)))
            .cloned()
            .collect();
        Ok(paginate(matches, &pagination))
    }

    async fn query_index(
        &self,
        index: GsiIndex,
        pk: &str,
        sk_prefix: Option<&str>,
        pagination: CursorPagination,
    ) -> Result<Page<StoreItem>> {
        let items = self.items.read().await;
        let matches: Vec<StoreItem> = items
            .iter()
            .filter(|i| {
                index_key(i, index)
                    .map(|(gpk, gsk)| gpk == pk && sk_prefix.map_or(true, |p| gsk.starts_with(p)))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        Ok(paginate(matches, &pagination))
    }

    async fn update_with_version(
        &self,
        pk: &str,
        sk: &str,
        expected_version: i64,
        attrs: serde_json::Value,
    ) -> Result<StoreItem> {
        let mut items = self.items.write().await;
        let item = items
            .iter_mut()
            .find(|i| i.pk == pk && i.sk == sk)
            .ok_or_else(|| Error::NotFound(format!("no item at {pk}/{sk}")))?;

        if item.version != expected_version {
            return Err(Error::ConflictVersion(format!(
                "version mismatch updating {pk}/{sk}: expected {expected_version}, found {}",
                item.version
            )));
        }

        item.attrs = attrs;
        item.version += 1;
        Ok(item.clone())
    }

    async fn delete(&self, pk: &str, sk: &str) -> Result<()> {
        let mut items = self.items.write().await;
        items.retain(|i| !(i.pk == pk && i.sk == sk));
        Ok(())
    }

    async fn delete_cascade(&self, pk: &str, sk_prefix: &str, max_items: u32) -> Result<CascadeDeleteOutcome> {
        let mut items = self.items.write().await;
        let max_items = max_items as usize;

        let victim_count = items.iter().filter(|i| i.pk == pk && i.sk.starts_with(sk_prefix)).count();
        let mut removed = 0usize;
        items.retain(|i| {
            if i.pk == pk && i.sk.starts_with(sk_prefix) && removed < max_items {
                removed += 1;
                false
            } else {
                true
            }
        });

        Ok(CascadeDeleteOutcome {
            deleted: removed as u64,
            truncated: victim_count > max_items,
        })
    }

    async fn transact_write(&self, ops: Vec<TransactOp>) -> Result<()> {
        // Validate every op against a snapshot before mutating, so a failure
        // partway through an all-or-nothing batch can't leave partial writes.
        let snapshot = self.items.read().await.clone();
        for op in &ops {
            if let TransactOp::UpdateVersioned { pk, sk, expected_version, .. } = op {
                let found = snapshot.iter().find(|i| &i.pk == pk && &i.sk == sk);
                match found {
                    Some(item) if item.version == *expected_version => {}
                    Some(item) => {
                        return Err(Error::ConflictVersion(format!(
                            "version mismatch updating {pk}/{sk}: expected {expected_version}, found {}",
                            item.version
                        )))
                    }
                    None => return Err(Error::NotFound(format!("no item at {pk}/{sk}"))),
                }
            }
            if let TransactOp::PutIfAbsent(item) = op {
                if snapshot.iter().any(|i| i.pk == item.pk && i.sk == item.sk) {
                    return Err(Error::ConflictState(format!("item already exists at {}/{}", item.pk, item.sk)));
                }
            }
        }

        for op in ops {
            match op {
                TransactOp::Put(item) | TransactOp::PutIfAbsent(item) => self.put(item).await?,
                TransactOp::UpdateVersioned { pk, sk, expected_version, attrs } => {
                    self.update_with_version(&pk, &sk, expected_version, attrs).await?;
                }
                TransactOp::Delete { pk, sk } => self.delete(&pk, &sk).await?,
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntityType;

    fn item(pk: &str, sk: &str) -> StoreItem {
        StoreItem::new(pk, sk, EntityType::Goal, serde_json::json!({"title": "test"}))
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryCoreStore::new();
        store.put(item("GOAL#1", "GOAL#1")).await.unwrap();
        let found = store.get("GOAL#1", "GOAL#1").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn put_if_absent_rejects_duplicate() {
        let store = MemoryCoreStore::new();
        store.put_if_absent(item("GOAL#1", "GOAL#1")).await.unwrap();
        let err = store.put_if_absent(item("GOAL#1", "GOAL#1")).await.unwrap_err();
        assert!(matches!(err, Error::Store(e) if e.kind == StoreErrorKind::ConstraintViolation));
    }

    #[tokio::test]
    async fn update_with_version_rejects_stale_version() {
        let store = MemoryCoreStore::new();
        store.put(item("GOAL#1", "GOAL#1")).await.unwrap();
        let err = store
            .update_with_version("GOAL#1", "GOAL#1", 99, serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConflictVersion(_)));
    }

    #[tokio::test]
    async fn query_partition_paginates_and_returns_cursor() {
        let store = MemoryCoreStore::new();
        for i in 0..5 {
            store.put(item("USER#1", &format!("GOAL#{i}"))).await.unwrap();
        }

        let page = store
            .query_partition("USER#1", Some("GOAL#"), CursorPagination::new(Some(2), None))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.next_cursor.is_some());

        let page2 = store
            .query_partition("USER#1", Some("GOAL#"), CursorPagination::new(Some(2), page.next_cursor))
            .await
            .unwrap();
        assert_eq!(page2.items.len(), 2);
    }

    #[tokio::test]
    async fn delete_cascade_respects_max_items() {
        let store = MemoryCoreStore::new();
        for i in 0..5 {
            store.put(item("GUILD#1", &format!("MEMBER#{i}"))).await.unwrap();
        }

        let outcome = store.delete_cascade("GUILD#1", "MEMBER#", 3).await.unwrap();
        assert_eq!(outcome.deleted, 3);
        assert!(outcome.truncated);

        let remaining = store
            .query_partition("GUILD#1", Some("MEMBER#"), CursorPagination::default())
            .await
            .unwrap();
        assert_eq!(remaining.items.len(), 2);
    }

    #[tokio::test]
    async fn transact_write_rolls_back_on_version_mismatch() {
        let store = MemoryCoreStore::new();
        store.put(item("GOAL#1", "GOAL#1")).await.unwrap();

        let ops = vec![
            TransactOp::Put(item("GOAL#2", "GOAL#2")),
            TransactOp::UpdateVersioned {
                pk: "GOAL#1".to_string(),
                sk: "GOAL#1".to_string(),
                expected_version: 99,
                attrs: serde_json::json!({}),
            },
        ];

        let err = store.transact_write(ops).await.unwrap_err();
        assert!(matches!(err, Error::ConflictVersion(_)));

        // The unrelated Put must not have been applied either.
        let found = store.get("GOAL#2", "GOAL#2").await.unwrap();
        assert!(found.is_none());
    }
}
