//! Ledger capability surface
//!
//! Every supported network is reached through [`LedgerAdapter`]. Callers stay
//! generic over the trait and never branch on the platform name; the only
//! place that maps a [`Platform`] to a concrete adapter is startup wiring.
//!
//! Adapters never retry. Broadcasts are wrapped by
//! [`RetryExecutor`](crate::retry::RetryExecutor) at the call site, reads are
//! not retried at all.

use crate::asset::Asset;
use crate::config::Credential;
use crate::error::Result;
use crate::platform::Platform;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account state relevant to curation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub balance: Asset,
    pub vesting_shares: Asset,
    pub delegated_vesting_shares: Asset,
    pub received_vesting_shares: Asset,
}

/// One outgoing delegation of vesting shares
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingDelegation {
    pub delegator: String,
    pub delegatee: String,
    pub vesting_shares: Asset,
}

/// A post as returned by the discussion and content queries
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub author: String,
    pub permlink: String,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
}

impl Post {
    pub fn reference(&self, platform: Platform) -> PostReference {
        PostReference {
            platform,
            author: self.author.clone(),
            permlink: self.permlink.clone(),
        }
    }
}

/// Identity of a post on one platform; built per poll and never persisted
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PostReference {
    pub platform: Platform,
    pub author: String,
    pub permlink: String,
}

impl PostReference {
    /// `author/permlink`, the key used by upvote records
    pub fn posturl(&self) -> String {
        format!("{}/{}", self.author, self.permlink)
    }
}

impl fmt::Display for PostReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:@{}/{}", self.platform, self.author, self.permlink)
    }
}

/// Chain-wide counters from `get_dynamic_global_properties`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalProperties {
    pub head_block_number: u64,
    pub head_block_id: String,
    pub time: DateTime<Utc>,
    pub total_vesting_fund: Asset,
    pub total_vesting_shares: Asset,
}

/// A `transfer` operation observed in a block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub block_num: u64,
    pub from: String,
    pub to: String,
    pub amount: Asset,
    pub memo: String,
}

/// Reply payload for [`LedgerAdapter::broadcast_comment`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Comment {
    pub parent_author: String,
    pub parent_permlink: String,
    pub author: String,
    pub permlink: String,
    pub title: String,
    pub body: String,
    pub json_metadata: String,
}

/// Uniform read and broadcast operations over one ledger
#[async_trait]
pub trait LedgerAdapter: Send + Sync {
    /// Network this adapter talks to
    fn platform(&self) -> Platform;

    /// Fails with `NotFound` for unknown accounts
    async fn fetch_account(&self, name: &str) -> Result<Account>;

    /// Delegations made by `delegator`, ordered by delegatee, starting at `start_after`
    async fn fetch_vesting_delegations(
        &self,
        delegator: &str,
        start_after: &str,
        limit: u32,
    ) -> Result<Vec<VestingDelegation>>;

    async fn fetch_recent_tagged_posts(&self, tag: &str, limit: u32) -> Result<Vec<Post>>;

    async fn fetch_post_content(&self, author: &str, permlink: &str) -> Result<Post>;

    async fn fetch_global_properties(&self) -> Result<GlobalProperties>;

    async fn fetch_transfers_in_block(&self, block_num: u64) -> Result<Vec<Transfer>>;

    /// `weight` is in hundredths of a percent, 10000 = 100%
    async fn broadcast_vote(
        &self,
        credential: &Credential,
        voter: &str,
        author: &str,
        permlink: &str,
        weight: u16,
    ) -> Result<()>;

    async fn broadcast_comment(&self, credential: &Credential, comment: &Comment) -> Result<()>;

    async fn broadcast_transfer_to_vesting(
        &self,
        credential: &Credential,
        from: &str,
        to: &str,
        amount: &Asset,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posturl_joins_author_and_permlink() {
        let post = Post {
            author: "alice".into(),
            permlink: "my-first-post".into(),
            ..Default::default()
        };
        let reference = post.reference(Platform::Steem);
        assert_eq!(reference.posturl(), "alice/my-first-post");
        assert_eq!(reference.to_string(), "steem:@alice/my-first-post");
    }
}
