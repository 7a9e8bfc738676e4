use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use dashmap::DashMap;
use parlor_core::{Storage, StorageResult};

/// A [Storage] keeping everything in process memory.
///
/// Every operation locks the shard of the key it touches, which makes
/// push-and-trim atomic per list the way the bound invariant requires.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    lists: DashMap<String, VecDeque<String>>,
    sets: DashMap<String, HashSet<String>>,
    counters: DashMap<String, i64>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn list_push_trim(&self, key: &str, value: String, limit: usize) -> StorageResult<()> {
        let mut list = self.lists.entry(key.to_string()).or_default();

        list.push_front(value);
        list.truncate(limit);

        Ok(())
    }

    async fn list_range(&self, key: &str, limit: usize) -> StorageResult<Vec<String>> {
        let entries = self
            .lists
            .get(key)
            .map(|list| list.iter().take(limit).cloned().collect())
            .unwrap_or_default();

        Ok(entries)
    }

    async fn set_add(&self, key: &str, member: &str) -> StorageResult<()> {
        self.sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());

        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> StorageResult<()> {
        if let Some(mut set) = self.sets.get_mut(key) {
            set.remove(member);
        }

        Ok(())
    }

    async fn set_contains(&self, key: &str, member: &str) -> StorageResult<bool> {
        let contains = self
            .sets
            .get(key)
            .map(|set| set.contains(member))
            .unwrap_or(false);

        Ok(contains)
    }

    async fn set_members(&self, key: &str) -> StorageResult<Vec<String>> {
        let members = self
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();

        Ok(members)
    }

    async fn counter_incr(&self, key: &str) -> StorageResult<i64> {
        let mut counter = self.counters.entry(key.to_string()).or_default();
        *counter += 1;

        Ok(*counter)
    }

    async fn counter_get(&self, key: &str) -> StorageResult<i64> {
        let count = self.counters.get(key).map(|c| *c).unwrap_or(0);

        Ok(count)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.lists.remove(key);
        self.sets.remove(key);
        self.counters.remove(key);

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_push_trim_keeps_the_newest() {
        let storage = MemoryStorage::new();

        for i in 0..5 {
            storage
                .list_push_trim("list", format!("{}", i), 3)
                .await
                .unwrap();
        }

        let entries = storage.list_range("list", 10).await.unwrap();

        assert_eq!(entries, vec!["4", "3", "2"], "newest first, tail trimmed");
    }

    #[tokio::test]
    async fn test_sets_are_idempotent() {
        let storage = MemoryStorage::new();

        storage.set_add("topics", "foo").await.unwrap();
        storage.set_add("topics", "foo").await.unwrap();

        assert_eq!(storage.set_members("topics").await.unwrap(), vec!["foo"]);
        assert!(storage.set_contains("topics", "foo").await.unwrap());

        storage.set_remove("topics", "foo").await.unwrap();
        storage.set_remove("topics", "foo").await.unwrap();

        assert!(!storage.set_contains("topics", "foo").await.unwrap());
    }

    #[tokio::test]
    async fn test_counters_and_delete() {
        let storage = MemoryStorage::new();

        assert_eq!(storage.counter_get("hits").await.unwrap(), 0);
        assert_eq!(storage.counter_incr("hits").await.unwrap(), 1);
        assert_eq!(storage.counter_incr("hits").await.unwrap(), 2);

        storage.delete("hits").await.unwrap();
        assert_eq!(storage.counter_get("hits").await.unwrap(), 0);
    }
}
