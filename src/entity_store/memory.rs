/// In-memory entity storage
use crate::{
    blob_store::BlobStorageEntry,
    entity_store::{
        clamp_page_size, compare_values, lookup, parse_cursor, validate_conditions,
        validate_property, Condition, EntityPage, EntityStorageConnector, SortBy,
        SortDirection,
    },
    error::BlobResult,
};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

/// Entries kept in insertion order
#[derive(Default)]
pub struct MemoryEntityStorage {
    entries: RwLock<Vec<BlobStorageEntry>>,
}

impl MemoryEntityStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn same_key(a: &BlobStorageEntry, b: &BlobStorageEntry) -> bool {
    a.id == b.id && a.user_identity == b.user_identity && a.node_identity == b.node_identity
}

fn satisfies(entry: &BlobStorageEntry, conditions: &[Condition]) -> BlobResult<bool> {
    if conditions.is_empty() {
        return Ok(true);
    }
    let document = serde_json::to_value(entry)?;
    Ok(conditions.iter().all(|c| c.matches(&document)))
}

#[async_trait]
impl EntityStorageConnector for MemoryEntityStorage {
    async fn get(
        &self,
        id: &str,
        conditions: &[Condition],
    ) -> BlobResult<Option<BlobStorageEntry>> {
        validate_conditions(conditions)?;
        let entries = self.entries.read().await;

        for entry in entries.iter().filter(|e| e.id == id) {
            if satisfies(entry, conditions)? {
                return Ok(Some(entry.clone()));
            }
        }
        Ok(None)
    }

    async fn set(&self, entry: BlobStorageEntry) -> BlobResult<()> {
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|e| same_key(e, &entry)) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        Ok(())
    }

    async fn remove(&self, id: &str, conditions: &[Condition]) -> BlobResult<bool> {
        validate_conditions(conditions)?;
        let mut entries = self.entries.write().await;

        let mut position = None;
        for (index, entry) in entries.iter().enumerate() {
            if entry.id == id && satisfies(entry, conditions)? {
                position = Some(index);
                break;
            }
        }

        Ok(match position {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        })
    }

    async fn query(
        &self,
        conditions: &[Condition],
        sort: Option<SortBy>,
        cursor: Option<String>,
        page_size: Option<usize>,
    ) -> BlobResult<EntityPage> {
        validate_conditions(conditions)?;
        if let Some(sort) = &sort {
            validate_property(&sort.property)?;
        }
        let offset = parse_cursor(cursor.as_deref())?;
        let page_size = clamp_page_size(page_size);

        let entries = self.entries.read().await;
        let mut matched: Vec<(usize, Value, &BlobStorageEntry)> = Vec::new();
        for (position, entry) in entries.iter().enumerate() {
            let document = serde_json::to_value(entry)?;
            if conditions.iter().all(|c| c.matches(&document)) {
                matched.push((position, document, entry));
            }
        }

        // Ties fall back to insertion order in the sort direction, like rowid in SQLite
        if let Some(sort) = &sort {
            matched.sort_by(|(pa, a, _), (pb, b, _)| {
                let a = lookup(a, &sort.property).unwrap_or(&Value::Null);
                let b = lookup(b, &sort.property).unwrap_or(&Value::Null);
                let ordering = compare_values(a, b).then_with(|| pa.cmp(pb));
                match sort.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }

        let total = matched.len();
        let page: Vec<BlobStorageEntry> = matched
            .into_iter()
            .skip(offset)
            .take(page_size)
            .map(|(_, _, entry)| entry.clone())
            .collect();

        let next = offset.saturating_add(page.len());
        Ok(EntityPage {
            entries: page,
            cursor: (next < total).then(|| next.to_string()),
        })
    }

    async fn count(&self, id: &str) -> BlobResult<usize> {
        Ok(self.entries.read().await.iter().filter(|e| e.id == id).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_store::Comparison;
    use crate::error::BlobError;

    fn entry(id: &str, size: u64, user: Option<&str>) -> BlobStorageEntry {
        BlobStorageEntry {
            id: id.to_string(),
            date_created: format!("2024-01-01T00:00:0{}.000Z", size % 10),
            date_modified: None,
            blob_size: size,
            blob_hash: format!("sha256:{}", size),
            encoding_format: Some("text/plain".to_string()),
            file_extension: Some("txt".to_string()),
            metadata: None,
            is_encrypted: false,
            vault_key: None,
            user_identity: user.map(str::to_string),
            node_identity: None,
        }
    }

    #[tokio::test]
    async fn test_set_replaces_by_tenant_key() {
        let store = MemoryEntityStorage::new();
        store.set(entry("blob:memory:a", 1, Some("alice"))).await.unwrap();
        store.set(entry("blob:memory:a", 1, Some("bob"))).await.unwrap();
        store.set(entry("blob:memory:a", 2, Some("alice"))).await.unwrap();

        assert_eq!(store.len().await, 2);
        assert_eq!(store.count("blob:memory:a").await.unwrap(), 2);

        let alice = store
            .get("blob:memory:a", &[Condition::equals("userIdentity", "alice")])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alice.blob_size, 2);
    }

    #[tokio::test]
    async fn test_remove_honours_conditions() {
        let store = MemoryEntityStorage::new();
        store.set(entry("blob:memory:a", 1, Some("alice"))).await.unwrap();

        let removed = store
            .remove("blob:memory:a", &[Condition::equals("userIdentity", "bob")])
            .await
            .unwrap();
        assert!(!removed);

        let removed = store
            .remove("blob:memory:a", &[Condition::equals("userIdentity", "alice")])
            .await
            .unwrap();
        assert!(removed);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_query_sorts_and_paginates() {
        let store = MemoryEntityStorage::new();
        for size in 1..=5 {
            store
                .set(entry(&format!("blob:memory:{}", size), size, None))
                .await
                .unwrap();
        }

        let sort = SortBy {
            property: "blobSize".to_string(),
            direction: SortDirection::Descending,
        };
        let first = store
            .query(&[], Some(sort.clone()), None, Some(2))
            .await
            .unwrap();
        let sizes: Vec<u64> = first.entries.iter().map(|e| e.blob_size).collect();
        assert_eq!(sizes, vec![5, 4]);
        assert_eq!(first.cursor.as_deref(), Some("2"));

        let last = store
            .query(&[], Some(sort), Some("4".to_string()), Some(2))
            .await
            .unwrap();
        assert_eq!(last.entries.len(), 1);
        assert_eq!(last.cursor, None);
    }

    #[tokio::test]
    async fn test_query_filters() {
        let store = MemoryEntityStorage::new();
        for size in 1..=5 {
            store
                .set(entry(&format!("blob:memory:{}", size), size, None))
                .await
                .unwrap();
        }

        let page = store
            .query(
                &[Condition::new("blobSize", Comparison::GreaterThan, 3)],
                None,
                None,
                None,
            )
            .await
            .unwrap();
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.cursor, None);
    }

    #[tokio::test]
    async fn test_descending_ties_list_newest_first() {
        let store = MemoryEntityStorage::new();
        for id in ["blob:memory:first", "blob:memory:second", "blob:memory:third"] {
            store.set(entry(id, 4, None)).await.unwrap();
        }

        let sort = |direction: SortDirection| SortBy {
            property: "dateCreated".to_string(),
            direction,
        };
        let page = store
            .query(&[], Some(sort(SortDirection::Descending)), None, None)
            .await
            .unwrap();
        let ids: Vec<&str> = page.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["blob:memory:third", "blob:memory:second", "blob:memory:first"]);

        let page = store
            .query(&[], Some(sort(SortDirection::Ascending)), None, None)
            .await
            .unwrap();
        assert_eq!(page.entries[0].id, "blob:memory:first");
    }

    #[tokio::test]
    async fn test_out_of_range_cursor_is_rejected() {
        let store = MemoryEntityStorage::new();
        store.set(entry("blob:memory:a", 1, None)).await.unwrap();

        let err = store
            .query(&[], None, Some(usize::MAX.to_string()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::Validation(_)));

        let past_end = store
            .query(&[], None, Some(i64::MAX.to_string()), None)
            .await
            .unwrap();
        assert!(past_end.entries.is_empty());
        assert_eq!(past_end.cursor, None);
    }
}
