//! In-memory ledger double shared by the engine tests

use crate::asset::Asset;
use crate::config::{Credential, KeyRole, PlatformConfig, Secret};
use crate::context::PlatformHandle;
use crate::error::{CuratorError, Result};
use crate::ledger::{
    Account, Comment, GlobalProperties, LedgerAdapter, Post, Transfer, VestingDelegation,
};
use crate::platform::Platform;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct RecordingLedger {
    inner: Arc<RecordingLedgerInner>,
}

#[derive(Default)]
struct RecordingLedgerInner {
    platform: Option<Platform>,
    operations: Mutex<Vec<String>>,
    delegations: Mutex<BTreeMap<(String, String), Asset>>,
    failing_delegatees: Mutex<HashSet<String>>,
    posts: Mutex<Vec<Post>>,
    missing_accounts: Mutex<HashSet<String>>,
    head_block: Mutex<u64>,
    transfers: Mutex<HashMap<u64, Vec<Transfer>>>,
    failing_blocks: Mutex<HashSet<u64>>,
    vote_failures: Mutex<u32>,
    comment_failures: Mutex<u32>,
    transfer_failures: Mutex<u32>,
    listing_fails: Mutex<bool>,
}

impl RecordingLedger {
    pub(crate) fn new(platform: Platform) -> Self {
        Self {
            inner: Arc::new(RecordingLedgerInner {
                platform: Some(platform),
                head_block: Mutex::new(100),
                ..Default::default()
            }),
        }
    }

    fn record(&self, entry: impl Into<String>) {
        self.inner.operations.lock().unwrap().push(entry.into());
    }

    pub(crate) fn operations(&self) -> Vec<String> {
        self.inner.operations.lock().unwrap().clone()
    }

    pub(crate) fn count_ops(&self, prefix: &str) -> usize {
        self.operations()
            .iter()
            .filter(|op| op.starts_with(prefix))
            .count()
    }

    pub(crate) fn set_delegation(&self, delegator: &str, delegatee: &str, vests: &str) {
        self.inner.delegations.lock().unwrap().insert(
            (delegator.to_string(), delegatee.to_string()),
            vests.parse().unwrap(),
        );
    }

    pub(crate) fn remove_delegation(&self, delegator: &str, delegatee: &str) {
        self.inner
            .delegations
            .lock()
            .unwrap()
            .remove(&(delegator.to_string(), delegatee.to_string()));
    }

    pub(crate) fn fail_delegations_for(&self, delegatee: &str) {
        self.inner
            .failing_delegatees
            .lock()
            .unwrap()
            .insert(delegatee.to_string());
    }

    pub(crate) fn add_post(&self, author: &str, permlink: &str, body: &str) {
        self.inner.posts.lock().unwrap().push(Post {
            author: author.to_string(),
            permlink: permlink.to_string(),
            title: format!("Post by {author}"),
            body: body.to_string(),
            tags: vec!["curated".to_string()],
        });
    }

    pub(crate) fn mark_missing(&self, account: &str) {
        self.inner
            .missing_accounts
            .lock()
            .unwrap()
            .insert(account.to_string());
    }

    pub(crate) fn set_head_block(&self, block: u64) {
        *self.inner.head_block.lock().unwrap() = block;
    }

    pub(crate) fn push_transfer(&self, block: u64, from: &str, to: &str, amount: &str, memo: &str) {
        self.inner
            .transfers
            .lock()
            .unwrap()
            .entry(block)
            .or_default()
            .push(Transfer {
                block_num: block,
                from: from.to_string(),
                to: to.to_string(),
                amount: amount.parse().unwrap(),
                memo: memo.to_string(),
            });
    }

    pub(crate) fn fail_block(&self, block: u64, failing: bool) {
        let mut blocks = self.inner.failing_blocks.lock().unwrap();
        if failing {
            blocks.insert(block);
        } else {
            blocks.remove(&block);
        }
    }

    pub(crate) fn fail_next_votes(&self, n: u32) {
        *self.inner.vote_failures.lock().unwrap() = n;
    }

    pub(crate) fn fail_next_comments(&self, n: u32) {
        *self.inner.comment_failures.lock().unwrap() = n;
    }

    pub(crate) fn fail_next_transfers(&self, n: u32) {
        *self.inner.transfer_failures.lock().unwrap() = n;
    }

    pub(crate) fn fail_listing(&self, fail: bool) {
        *self.inner.listing_fails.lock().unwrap() = fail;
    }

    fn platform_id(&self) -> Platform {
        self.inner.platform.unwrap_or(Platform::Hive)
    }

    fn take_failure(counter: &Mutex<u32>, what: &str) -> Result<()> {
        let mut remaining = counter.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(CuratorError::Platform(format!("{what} timed out")));
        }
        Ok(())
    }

    fn require_role(credential: &Credential, role: KeyRole) -> Result<()> {
        if credential.role != role {
            return Err(CuratorError::Credential(format!(
                "{} key cannot sign this operation",
                credential.role
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerAdapter for RecordingLedger {
    fn platform(&self) -> Platform {
        self.platform_id()
    }

    async fn fetch_account(&self, name: &str) -> Result<Account> {
        if self.inner.missing_accounts.lock().unwrap().contains(name) {
            return Err(CuratorError::NotFound(format!("account {name}")));
        }
        let symbol = self.platform_id().native_symbol();
        Ok(Account {
            name: name.to_string(),
            balance: Asset::from_units(100, symbol),
            vesting_shares: Asset::new(0, Asset::VESTS_PRECISION, "VESTS"),
            delegated_vesting_shares: Asset::new(0, Asset::VESTS_PRECISION, "VESTS"),
            received_vesting_shares: Asset::new(0, Asset::VESTS_PRECISION, "VESTS"),
        })
    }

    async fn fetch_vesting_delegations(
        &self,
        delegator: &str,
        start_after: &str,
        limit: u32,
    ) -> Result<Vec<VestingDelegation>> {
        if self
            .inner
            .failing_delegatees
            .lock()
            .unwrap()
            .contains(start_after)
        {
            return Err(CuratorError::Platform("delegation lookup failed".into()));
        }
        Ok(self
            .inner
            .delegations
            .lock()
            .unwrap()
            .iter()
            .filter(|((from, to), _)| from == delegator && to.as_str() >= start_after)
            .take(limit as usize)
            .map(|((from, to), vests)| VestingDelegation {
                delegator: from.clone(),
                delegatee: to.clone(),
                vesting_shares: vests.clone(),
            })
            .collect())
    }

    async fn fetch_recent_tagged_posts(&self, tag: &str, limit: u32) -> Result<Vec<Post>> {
        if *self.inner.listing_fails.lock().unwrap() {
            return Err(CuratorError::Platform("discussion query failed".into()));
        }
        self.record(format!("list:{tag}"));
        Ok(self
            .inner
            .posts
            .lock()
            .unwrap()
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn fetch_post_content(&self, author: &str, permlink: &str) -> Result<Post> {
        self.inner
            .posts
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.author == author && p.permlink == permlink)
            .cloned()
            .ok_or_else(|| CuratorError::NotFound(format!("post @{author}/{permlink}")))
    }

    async fn fetch_global_properties(&self) -> Result<GlobalProperties> {
        Ok(GlobalProperties {
            head_block_number: *self.inner.head_block.lock().unwrap(),
            head_block_id: "0000006400000000000000000000000000000000".to_string(),
            time: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            total_vesting_fund: Asset::from_units(1000, self.platform_id().native_symbol()),
            total_vesting_shares: "2000000.000000 VESTS".parse().unwrap(),
        })
    }

    async fn fetch_transfers_in_block(&self, block_num: u64) -> Result<Vec<Transfer>> {
        if self.inner.failing_blocks.lock().unwrap().contains(&block_num) {
            return Err(CuratorError::Platform(format!("block {block_num} unavailable")));
        }
        self.record(format!("block:{block_num}"));
        Ok(self
            .inner
            .transfers
            .lock()
            .unwrap()
            .get(&block_num)
            .cloned()
            .unwrap_or_default())
    }

    async fn broadcast_vote(
        &self,
        credential: &Credential,
        voter: &str,
        author: &str,
        permlink: &str,
        weight: u16,
    ) -> Result<()> {
        Self::require_role(credential, KeyRole::Posting)?;
        self.record(format!("attempt-vote:{voter}"));
        Self::take_failure(&self.inner.vote_failures, "vote")?;
        self.record(format!("vote:{author}/{permlink}:{weight}"));
        Ok(())
    }

    async fn broadcast_comment(&self, credential: &Credential, comment: &Comment) -> Result<()> {
        Self::require_role(credential, KeyRole::Posting)?;
        Self::take_failure(&self.inner.comment_failures, "comment")?;
        self.record(format!(
            "comment:{}/{}:{}",
            comment.parent_author, comment.parent_permlink, comment.permlink
        ));
        Ok(())
    }

    async fn broadcast_transfer_to_vesting(
        &self,
        credential: &Credential,
        from: &str,
        to: &str,
        amount: &Asset,
    ) -> Result<()> {
        Self::require_role(credential, KeyRole::Active)?;
        Self::take_failure(&self.inner.transfer_failures, "transfer_to_vesting")?;
        self.record(format!("transfer_to_vesting:{from}->{to}:{amount}"));
        Ok(())
    }
}

/// Handle for `account` on `ledger`'s platform with throwaway credentials
pub(crate) fn handle(ledger: &RecordingLedger, account: &str) -> PlatformHandle {
    let section = PlatformConfig {
        username: account.to_string(),
        posting: Secret::new("posting-secret"),
        active: Secret::new("active-secret"),
        rpc_url: None,
    };
    PlatformHandle::new(&section, Arc::new(ledger.clone()))
}

/// Body comfortably above the minimum length carrying `#curated`
pub(crate) fn long_body() -> String {
    format!("{} #curated", "Exploring the hills above town. ".repeat(5))
}
