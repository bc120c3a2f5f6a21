//! Curation engine for Hive, Steem and Blurt
//!
//! Watches tagged posts on each platform, votes on them exactly once with a
//! weight derived from donation boosts and delegations, and turns qualifying
//! donations into vesting power and time-limited boosts.
//!
//! Network access goes through [`LedgerAdapter`]; persistence through
//! [`RecordStore`] and [`BoostStore`]. Concrete adapters live in the
//! `graphene-client` crate.

pub mod asset;
pub mod boost;
pub mod config;
pub mod context;
pub mod cycle;
pub mod delegation;
pub mod donation;
pub mod error;
pub mod ledger;
pub mod platform;
pub mod retry;
pub mod scheduler;
pub mod sqlite;
pub mod store;
pub mod upvote;
pub mod watcher;

#[cfg(test)]
pub(crate) mod test_support;

pub use asset::Asset;
pub use boost::{BoostStore, BoostTracker, JsonFileBoostStore, MemoryBoostStore};
pub use config::{resolve_rpc_url, BotConfig, Credential, KeyRole, PlatformConfig, Secret};
pub use context::{BotContext, PlatformHandle};
pub use cycle::{contains_hashtag, CycleController, CycleReport};
pub use delegation::{DelegationSynchronizer, SyncReport};
pub use donation::{parse_memo, DonationOutcome, DonationProcessor, TransferEvent};
pub use error::{CuratorError, Result};
pub use ledger::{
    Account, Comment, GlobalProperties, LedgerAdapter, Post, PostReference, Transfer,
    VestingDelegation,
};
pub use platform::{ChainSpec, Platform};
pub use retry::{RetryConfig, RetryExecutor};
pub use scheduler::{CycleGuard, Scheduler, SchedulerStats};
pub use sqlite::SqliteRecordStore;
pub use store::{DelegationRecord, DonationRecord, MemoryRecordStore, RecordStore, UpvoteRecord};
pub use upvote::{ProcessOutcome, UpvoteEngine, WeightTier};
pub use watcher::{TransferWatcher, WatchReport};
