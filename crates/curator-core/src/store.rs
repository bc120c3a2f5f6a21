//! Upvote, donation and delegation records
//!
//! [`RecordStore`] is the persistence seam for the engine. The upvote table
//! carries the only exactly-once guarantee in the system, so
//! [`RecordStore::insert_upvote_if_absent`] must be a single atomic
//! conditional insert in every implementation.

use crate::asset::Asset;
use crate::error::Result;
use crate::platform::Platform;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A vote the bot has cast; unique per (platform, username, posturl)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpvoteRecord {
    /// Post author
    pub username: String,
    /// `author/permlink`
    pub posturl: String,
    pub platform: Platform,
    /// Hundredths of a percent
    pub upvote_percent: u16,
    pub created_at: DateTime<Utc>,
}

/// Append-only donation audit entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationRecord {
    /// Beneficiary named in the memo
    pub username: String,
    pub platform: Platform,
    pub amount: Asset,
    /// Symbol of the transferred asset
    pub token_type: String,
    pub created_at: DateTime<Utc>,
}

/// Local mirror of one on-chain delegation; unique per (platform, delegator, delegatee)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationRecord {
    pub delegator: String,
    pub delegatee: String,
    pub platform: Platform,
    pub vesting_shares: Asset,
    /// Delegated amount in the platform power unit (HP, SP or BP)
    pub power: Asset,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub trait RecordStore: Send + Sync {
    fn upvote_exists(&self, platform: Platform, username: &str, posturl: &str) -> Result<bool>;

    /// Create the record unless one exists for the same key; returns whether a row was created
    fn insert_upvote_if_absent(&self, record: &UpvoteRecord) -> Result<bool>;

    fn find_upvote(
        &self,
        platform: Platform,
        username: &str,
        posturl: &str,
    ) -> Result<Option<UpvoteRecord>>;

    fn append_donation(&self, record: &DonationRecord) -> Result<()>;

    fn donations_for(&self, platform: Platform, username: &str) -> Result<Vec<DonationRecord>>;

    fn find_delegation(
        &self,
        platform: Platform,
        delegator: &str,
        delegatee: &str,
    ) -> Result<Option<DelegationRecord>>;

    /// Insert or update in place; an existing row keeps its `created_at`
    fn upsert_delegation(&self, record: &DelegationRecord) -> Result<()>;

    /// All delegation records pointing at `delegatee`
    fn delegations_to(&self, platform: Platform, delegatee: &str) -> Result<Vec<DelegationRecord>>;

    fn has_active_delegation(
        &self,
        platform: Platform,
        delegator: &str,
        delegatee: &str,
    ) -> Result<bool> {
        Ok(self
            .find_delegation(platform, delegator, delegatee)?
            .map(|r| r.enabled)
            .unwrap_or(false))
    }
}

type UpvoteKey = (Platform, String, String);
type DelegationKey = (Platform, String, String);

#[derive(Default)]
struct MemoryTables {
    upvotes: HashMap<UpvoteKey, UpvoteRecord>,
    donations: Vec<DonationRecord>,
    delegations: HashMap<DelegationKey, DelegationRecord>,
}

/// In-process record store
#[derive(Default)]
pub struct MemoryRecordStore {
    tables: Mutex<MemoryTables>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upvote_count(&self) -> usize {
        self.tables.lock().upvotes.len()
    }

    pub fn donation_count(&self) -> usize {
        self.tables.lock().donations.len()
    }

    pub fn delegation_count(&self) -> usize {
        self.tables.lock().delegations.len()
    }
}

impl RecordStore for MemoryRecordStore {
    fn upvote_exists(&self, platform: Platform, username: &str, posturl: &str) -> Result<bool> {
        let key = (platform, username.to_string(), posturl.to_string());
        Ok(self.tables.lock().upvotes.contains_key(&key))
    }

    fn insert_upvote_if_absent(&self, record: &UpvoteRecord) -> Result<bool> {
        let key = (
            record.platform,
            record.username.clone(),
            record.posturl.clone(),
        );
        let mut tables = self.tables.lock();
        if tables.upvotes.contains_key(&key) {
            return Ok(false);
        }
        tables.upvotes.insert(key, record.clone());
        Ok(true)
    }

    fn find_upvote(
        &self,
        platform: Platform,
        username: &str,
        posturl: &str,
    ) -> Result<Option<UpvoteRecord>> {
        let key = (platform, username.to_string(), posturl.to_string());
        Ok(self.tables.lock().upvotes.get(&key).cloned())
    }

    fn append_donation(&self, record: &DonationRecord) -> Result<()> {
        self.tables.lock().donations.push(record.clone());
        Ok(())
    }

    fn donations_for(&self, platform: Platform, username: &str) -> Result<Vec<DonationRecord>> {
        Ok(self
            .tables
            .lock()
            .donations
            .iter()
            .filter(|d| d.platform == platform && d.username == username)
            .cloned()
            .collect())
    }

    fn find_delegation(
        &self,
        platform: Platform,
        delegator: &str,
        delegatee: &str,
    ) -> Result<Option<DelegationRecord>> {
        let key = (platform, delegator.to_string(), delegatee.to_string());
        Ok(self.tables.lock().delegations.get(&key).cloned())
    }

    fn upsert_delegation(&self, record: &DelegationRecord) -> Result<()> {
        let key = (
            record.platform,
            record.delegator.clone(),
            record.delegatee.clone(),
        );
        let mut tables = self.tables.lock();
        let created_at = tables
            .delegations
            .get(&key)
            .map(|existing| existing.created_at)
            .unwrap_or(record.created_at);
        let mut stored = record.clone();
        stored.created_at = created_at;
        tables.delegations.insert(key, stored);
        Ok(())
    }

    fn delegations_to(&self, platform: Platform, delegatee: &str) -> Result<Vec<DelegationRecord>> {
        let mut records: Vec<DelegationRecord> = self
            .tables
            .lock()
            .delegations
            .values()
            .filter(|d| d.platform == platform && d.delegatee == delegatee)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.delegator.cmp(&b.delegator));
        Ok(records)
    }
}
