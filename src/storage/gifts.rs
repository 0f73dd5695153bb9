// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gift, education and approval records.
//!
//! `gift:detail:<giftId>` is the single source of truth for a gift. Approval
//! analytics are merged into it, but only ever into the `analytics` field:
//! claimer identity lives in the claim session, never here.

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{keys, KvStore, Mutation, StorageError, StorageResult};
use crate::blockchain::TokenId;

/// Canonical gift record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GiftRecord {
    pub gift_id: u64,
    pub token_id: TokenId,
    pub requires_education: bool,
    /// Hex-encoded per-gift HMAC salt
    pub password_salt: String,
    /// Hex-encoded HMAC-SHA256(salt, password)
    pub password_hash: String,
    pub creator: Address,
    pub registered_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<GiftAnalytics>,
}

/// Approval analytics merged into the gift record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GiftAnalytics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions_answered: Option<u32>,
    pub email_captured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_approved_at: Option<DateTime<Utc>>,
}

/// Education completion for one claimer on one gift.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EducationRecord {
    pub claimer: Address,
    pub gift_id: u64,
    pub score: u32,
    pub answered: u32,
    pub completed_at: DateTime<Utc>,
}

/// How an approval was justified.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalPath {
    /// Education completion was on record
    Education,
    /// Password-validated session on an education-gated gift
    Bypass,
}

impl ApprovalPath {
    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalPath::Education => "education",
            ApprovalPath::Bypass => "bypass",
        }
    }
}

/// Last approval issued for a claimer on a gift.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApprovalRecord {
    pub approval_id: Uuid,
    pub gift_id: u64,
    pub claimer: Address,
    pub deadline: u64,
    pub path: ApprovalPath,
    pub issued_at: DateTime<Utc>,
}

/// Repository for gift-scoped records.
pub struct GiftRepository<'a> {
    store: &'a dyn KvStore,
}

impl<'a> GiftRepository<'a> {
    pub fn new(store: &'a dyn KvStore) -> Self {
        Self { store }
    }

    /// Register a gift and its token id index.
    ///
    /// Fails with `AlreadyExists` if either the gift id or the token id is
    /// already taken; nothing is left behind in that case.
    pub fn register(&self, gift: &GiftRecord) -> StorageResult<()> {
        let detail_key = keys::gift_detail(gift.gift_id);
        if !self.store.insert_json(&detail_key, gift, None)? {
            return Err(StorageError::AlreadyExists(format!("Gift {}", gift.gift_id)));
        }

        let mapping_key = keys::gift_mapping(gift.token_id);
        if !self.store.insert_json(&mapping_key, &gift.gift_id, None)? {
            self.store.delete(&detail_key)?;
            return Err(StorageError::AlreadyExists(format!(
                "Token {} is already registered",
                gift.token_id
            )));
        }

        tracing::info!(
            gift_id = gift.gift_id,
            token_id = %gift.token_id,
            requires_education = gift.requires_education,
            "Gift registered"
        );
        Ok(())
    }

    pub fn get(&self, gift_id: u64) -> StorageResult<Option<GiftRecord>> {
        self.store.get_json(&keys::gift_detail(gift_id))
    }

    /// Resolve a token id through the read index.
    pub fn gift_id_for_token(&self, token_id: TokenId) -> StorageResult<Option<u64>> {
        self.store.get_json(&keys::gift_mapping(token_id))
    }

    pub fn record_education(&self, record: &EducationRecord) -> StorageResult<()> {
        self.store.put_json(
            &keys::education(&record.claimer, record.gift_id),
            record,
            None,
        )
    }

    pub fn education(
        &self,
        claimer: &Address,
        gift_id: u64,
    ) -> StorageResult<Option<EducationRecord>> {
        self.store.get_json(&keys::education(claimer, gift_id))
    }

    /// Overwrite the approval record for `(giftId, claimer)`.
    pub fn record_approval(&self, record: &ApprovalRecord) -> StorageResult<()> {
        self.store.put_json(
            &keys::approval(record.gift_id, &record.claimer),
            record,
            None,
        )
    }

    pub fn approval(
        &self,
        gift_id: u64,
        claimer: &Address,
    ) -> StorageResult<Option<ApprovalRecord>> {
        self.store.get_json(&keys::approval(gift_id, claimer))
    }

    /// Merge analytics into the gift record.
    ///
    /// Only fields present in `update` overwrite stored ones; every other part
    /// of the record is written back unchanged. Returns `false` when the gift
    /// is not registered.
    pub fn merge_analytics(&self, gift_id: u64, update: &GiftAnalytics) -> StorageResult<bool> {
        let key = keys::gift_detail(gift_id);
        let updated = self.store.update(&key, &mut |current| {
            let mut gift: GiftRecord = serde_json::from_slice(current)?;
            let mut analytics = gift.analytics.take().unwrap_or_default();
            if update.education_score.is_some() {
                analytics.education_score = update.education_score;
            }
            if update.questions_answered.is_some() {
                analytics.questions_answered = update.questions_answered;
            }
            analytics.email_captured |= update.email_captured;
            if update.last_approved_at.is_some() {
                analytics.last_approved_at = update.last_approved_at;
            }
            gift.analytics = Some(analytics);
            Ok(Mutation::Replace(serde_json::to_vec(&gift)?))
        })?;
        Ok(updated.is_some())
    }
}
