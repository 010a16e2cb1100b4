use crate::{PlaceholderCache, PlaceholderCacheEntry, PlaceholderResult};
use async_trait::async_trait;
use dashmap::DashMap;

/// In-process cache rows keyed by `(organization_id, prompt_hash)`.
///
/// The first row written for a key is kept, so racing writers converge on
/// one URL.
#[derive(Debug, Default)]
pub struct MemoryPlaceholderCache {
    rows: DashMap<(String, String), PlaceholderCacheEntry>,
}

impl MemoryPlaceholderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl PlaceholderCache for MemoryPlaceholderCache {
    async fn query_by_hash(
        &self,
        organization_id: &str,
        prompt_hash: &str,
    ) -> PlaceholderResult<Option<PlaceholderCacheEntry>> {
        let key = (organization_id.to_string(), prompt_hash.to_string());
        Ok(self.rows.get(&key).map(|row| row.value().clone()))
    }

    async fn insert(&self, entry: PlaceholderCacheEntry) -> PlaceholderResult<()> {
        let key = (entry.organization_id.clone(), entry.prompt_hash.clone());
        self.rows.entry(key).or_insert(entry);
        Ok(())
    }
}
