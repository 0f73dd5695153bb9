// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded key-value store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `kv`: key → envelope bytes
//!
//! The envelope is `expires_at_millis (u64 big-endian, 0 = never) || value`.
//! Every mutating operation runs in its own write transaction; redb serializes
//! write transactions, which gives `take` and `update` their atomicity.

use std::path::Path;
use std::time::Duration;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::{deadline_millis, now_millis, KvStore, Mutation, StorageError, StorageResult};

/// Single table: namespaced key → envelope.
const KV: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

const HEADER_LEN: usize = 8;

fn encode_envelope(expires_at: u64, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + value.len());
    out.extend_from_slice(&expires_at.to_be_bytes());
    out.extend_from_slice(value);
    out
}

fn decode_envelope(key: &str, raw: &[u8]) -> StorageResult<(u64, Vec<u8>)> {
    if raw.len() < HEADER_LEN {
        return Err(StorageError::Corrupt(key.to_string()));
    }
    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&raw[..HEADER_LEN]);
    Ok((u64::from_be_bytes(header), raw[HEADER_LEN..].to_vec()))
}

fn is_live(expires_at: u64, now: u64) -> bool {
    expires_at == 0 || now < expires_at
}

/// On-disk [`KvStore`].
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create the table so read transactions never hit a missing table
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(KV)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }
}

impl KvStore for RedbStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(KV)?;
        let Some(raw) = table.get(key)?.map(|g| g.value().to_vec()) else {
            return Ok(None);
        };
        let (expires_at, value) = decode_envelope(key, &raw)?;
        Ok(is_live(expires_at, now_millis()).then_some(value))
    }

    fn put(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StorageResult<()> {
        let envelope = encode_envelope(deadline_millis(ttl), value);
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(KV)?;
            table.insert(key, envelope.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn insert(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StorageResult<bool> {
        let write_txn = self.db.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(KV)?;
            let current = table.get(key)?.map(|g| g.value().to_vec());
            let occupied = match current {
                Some(raw) => is_live(decode_envelope(key, &raw)?.0, now_millis()),
                None => false,
            };
            if !occupied {
                let envelope = encode_envelope(deadline_millis(ttl), value);
                table.insert(key, envelope.as_slice())?;
            }
            !occupied
        };
        write_txn.commit()?;
        Ok(inserted)
    }

    fn take(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(KV)?;
            let removed = table.remove(key)?.map(|g| g.value().to_vec());
            removed
        };
        write_txn.commit()?;

        match removed {
            Some(raw) => {
                let (expires_at, value) = decode_envelope(key, &raw)?;
                Ok(is_live(expires_at, now_millis()).then_some(value))
            }
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.take(key)?.is_some())
    }

    fn update(
        &self,
        key: &str,
        mutator: &mut dyn FnMut(&[u8]) -> StorageResult<Mutation>,
    ) -> StorageResult<Option<Vec<u8>>> {
        let write_txn = self.db.begin_write()?;
        let result = {
            let mut table = write_txn.open_table(KV)?;
            let current = table.get(key)?.map(|g| g.value().to_vec());
            match current {
                None => None,
                Some(raw) => {
                    let (expires_at, value) = decode_envelope(key, &raw)?;
                    if !is_live(expires_at, now_millis()) {
                        None
                    } else {
                        // An Err from the mutator drops the transaction uncommitted
                        match mutator(&value)? {
                            Mutation::Keep => Some(value),
                            Mutation::Replace(next) => {
                                let envelope = encode_envelope(expires_at, &next);
                                table.insert(key, envelope.as_slice())?;
                                Some(next)
                            }
                        }
                    }
                }
            }
        };
        write_txn.commit()?;
        Ok(result)
    }

    fn purge_expired(&self) -> StorageResult<usize> {
        let now = now_millis();
        let write_txn = self.db.begin_write()?;
        let purged = {
            let mut table = write_txn.open_table(KV)?;
            let mut expired = Vec::new();
            for item in table.iter()? {
                let (k, v) = item?;
                let (expires_at, _) = decode_envelope(k.value(), v.value())?;
                if !is_live(expires_at, now) {
                    expired.push(k.value().to_string());
                }
            }
            for key in &expired {
                table.remove(key.as_str())?;
            }
            expired.len()
        };
        write_txn.commit()?;
        Ok(purged)
    }
}
