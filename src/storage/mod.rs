// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Key-Value Storage
//!
//! All claim-flow state lives in a namespaced key-value store. The core only
//! depends on the [`KvStore`] trait; two backends are provided:
//!
//! - [`MemoryStore`] - process-local map with TTLs (development and tests)
//! - [`RedbStore`] - embedded ACID database on disk (`DATA_DIR/giftgate.redb`)
//!
//! ## Atomicity
//!
//! Both backends implement `take` and `update` as single critical sections
//! (a mutex for the map, a write transaction for redb). Nonce consumption and
//! claimer promotion rely on this: of two racing callers exactly one observes
//! the pre-image.
//!
//! ## Key Layout
//!
//! ```text
//! siwe:nonce:<nonce>                   # outstanding sign-in challenge
//! preclaim:session:<token>             # claim session
//! education:<claimer>:<giftId>         # education completion
//! approval:<giftId>:<claimer>          # last issued approval
//! gift:detail:<giftId>                 # canonical gift record + analytics
//! gift:mapping:<tokenId>               # tokenId -> giftId read index
//! ```

use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};

pub mod gifts;
pub mod keys;
pub mod memory;
pub mod redb_store;
pub mod sweeper;

pub use gifts::{
    ApprovalPath, ApprovalRecord, EducationRecord, GiftAnalytics, GiftRecord, GiftRepository,
};
pub use memory::MemoryStore;
pub use redb_store::RedbStore;
pub use sweeper::ExpirySweeper;

/// Error type for key-value storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("corrupt entry under {0}")]
    Corrupt(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Decision returned by an [`KvStore::update`] mutator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Leave the stored value untouched.
    Keep,
    /// Replace the value, preserving the remaining TTL.
    Replace(Vec<u8>),
}

/// Namespaced key-value store with per-entry TTLs.
///
/// Reads of an expired entry behave exactly like reads of a missing one.
pub trait KvStore: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Write `value` under `key`, replacing any previous entry and TTL.
    fn put(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StorageResult<()>;

    /// Write `value` only if no live entry exists under `key`.
    ///
    /// Returns whether the write happened.
    fn insert(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StorageResult<bool>;

    /// Atomically read and delete `key`.
    ///
    /// When several callers race on the same key only one receives `Some`.
    fn take(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Delete `key`. Returns whether a live entry was removed.
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Atomically read-modify-write the value under `key`.
    ///
    /// The mutator sees the current value and decides whether to replace it.
    /// Returns `None` when the key is missing or expired (the mutator is not
    /// called), otherwise the value as it stands after the call.
    fn update(
        &self,
        key: &str,
        mutator: &mut dyn FnMut(&[u8]) -> StorageResult<Mutation>,
    ) -> StorageResult<Option<Vec<u8>>>;

    /// Drop every expired entry. Returns how many were removed.
    fn purge_expired(&self) -> StorageResult<usize>;
}

impl<'s> dyn KvStore + 's {
    /// Read and deserialize a JSON value.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Serialize and write a JSON value.
    pub fn put_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> StorageResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put(key, &bytes, ttl)
    }

    /// Serialize and write a JSON value if the key is vacant.
    pub fn insert_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> StorageResult<bool> {
        let bytes = serde_json::to_vec(value)?;
        self.insert(key, &bytes, ttl)
    }
}

/// Convert a TTL into an absolute unix-millisecond deadline.
pub(crate) fn deadline_millis(ttl: Option<Duration>) -> u64 {
    match ttl {
        Some(ttl) => now_millis().saturating_add(ttl.as_millis() as u64),
        None => 0,
    }
}

/// Current wall-clock time in unix milliseconds.
pub(crate) fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
