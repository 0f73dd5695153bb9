// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process-local key-value store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::{deadline_millis, now_millis, KvStore, Mutation, StorageError, StorageResult};

struct Entry {
    value: Vec<u8>,
    /// Unix millis; 0 means no expiry.
    expires_at: u64,
}

impl Entry {
    fn is_live(&self, now: u64) -> bool {
        self.expires_at == 0 || now < self.expires_at
    }
}

/// In-memory [`KvStore`] guarded by a single mutex.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let entries = self.lock()?;
        let now = now_millis();
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    fn put(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StorageResult<()> {
        let mut entries = self.lock()?;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at: deadline_millis(ttl),
            },
        );
        Ok(())
    }

    fn insert(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StorageResult<bool> {
        let mut entries = self.lock()?;
        if entries.get(key).is_some_and(|e| e.is_live(now_millis())) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at: deadline_millis(ttl),
            },
        );
        Ok(true)
    }

    fn take(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let mut entries = self.lock()?;
        let now = now_millis();
        Ok(entries
            .remove(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value))
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.take(key)?.is_some())
    }

    fn update(
        &self,
        key: &str,
        mutator: &mut dyn FnMut(&[u8]) -> StorageResult<Mutation>,
    ) -> StorageResult<Option<Vec<u8>>> {
        let mut entries = self.lock()?;
        let now = now_millis();
        let Some(entry) = entries.get_mut(key).filter(|e| e.is_live(now)) else {
            return Ok(None);
        };

        if let Mutation::Replace(value) = mutator(&entry.value)? {
            entry.value = value;
        }
        Ok(Some(entry.value.clone()))
    }

    fn purge_expired(&self) -> StorageResult<usize> {
        let mut entries = self.lock()?;
        let now = now_millis();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn put_get_and_delete() {
        let store = MemoryStore::new();
        store.put("a", b"1", None).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(b"1".to_vec()));
        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn expired_entries_read_as_missing() {
        let store = MemoryStore::new();
        store.put("short", b"x", Some(Duration::from_millis(1))).unwrap();
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(store.get("short").unwrap(), None);
        assert_eq!(store.take("short").unwrap(), None);
        assert_eq!(
            store.update("short", &mut |_| Ok(Mutation::Keep)).unwrap(),
            None
        );
    }

    #[test]
    fn purge_removes_only_expired() {
        let store = MemoryStore::new();
        store.put("gone", b"x", Some(Duration::from_millis(1))).unwrap();
        store.put("kept", b"y", Some(Duration::from_secs(60))).unwrap();
        store.put("forever", b"z", None).unwrap();
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(store.purge_expired().unwrap(), 1);
        assert!(store.get("kept").unwrap().is_some());
        assert!(store.get("forever").unwrap().is_some());
    }

    #[test]
    fn insert_respects_live_entries() {
        let store = MemoryStore::new();
        assert!(store.insert("k", b"first", None).unwrap());
        assert!(!store.insert("k", b"second", None).unwrap());
        assert_eq!(store.get("k").unwrap(), Some(b"first".to_vec()));

        store.put("stale", b"x", Some(Duration::from_millis(1))).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(store.insert("stale", b"fresh", None).unwrap());
    }

    #[test]
    fn update_replaces_value() {
        let store = MemoryStore::new();
        store.put("k", b"old", None).unwrap();
        let after = store
            .update("k", &mut |_| Ok(Mutation::Replace(b"new".to_vec())))
            .unwrap();
        assert_eq!(after, Some(b"new".to_vec()));
        assert_eq!(store.get("k").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn concurrent_take_has_single_winner() {
        let store = Arc::new(MemoryStore::new());
        store.put("nonce", b"n", None).unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.take("nonce").unwrap().is_some())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
