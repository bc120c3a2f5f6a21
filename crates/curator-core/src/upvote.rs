//! Upvote decision engine
//!
//! For one candidate post the engine refreshes its content, syncs the
//! author's delegations, applies the length gate, picks a weight and, unless
//! the post was already handled, votes and replies.
//!
//! ## Weights
//! - **Boosted** (8000): author holds an unexpired boost
//! - **Delegated** (4500): author has an enabled delegation to the bot
//! - **Base** (3000): everyone else
//!
//! A boost replaces the delegation bonus, it does not stack.
//!
//! ## Exactly once
//! A post is claimed in a process-wide in-flight set before the record
//! lookup, and the record itself is written with an atomic conditional
//! insert. A second cycle touching the same post either sees the claim or
//! the record and backs off.

use crate::boost::BoostTracker;
use crate::context::PlatformHandle;
use crate::delegation::DelegationSynchronizer;
use crate::error::Result;
use crate::ledger::{Comment, Post};
use crate::platform::Platform;
use crate::retry::{RetryConfig, RetryExecutor};
use crate::store::{RecordStore, UpvoteRecord};
use chrono::Utc;
use dashmap::DashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Default weight in hundredths of a percent (30.00%)
pub const BASE_WEIGHT: u16 = 3000;
/// Added to the base weight for authors delegating to the bot
pub const DELEGATION_BONUS: u16 = 1500;
/// Weight for boosted authors; replaces base and bonus
pub const BOOST_WEIGHT: u16 = 8000;

const MAX_PERMLINK_LEN: usize = 255;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeightTier {
    Base,
    Delegated,
    Boosted,
}

impl WeightTier {
    pub fn weight(self) -> u16 {
        match self {
            WeightTier::Base => BASE_WEIGHT,
            WeightTier::Delegated => BASE_WEIGHT + DELEGATION_BONUS,
            WeightTier::Boosted => BOOST_WEIGHT,
        }
    }
}

/// Result of processing one post
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Vote landed; the reply may have failed independently
    Voted { weight: u16, commented: bool },
    /// An upvote record already exists
    AlreadyVoted,
    /// Another task is processing the same post right now
    InFlight,
    BodyTooShort,
    /// Unrecovered error, already logged
    Failed(String),
}

/// Knobs shared by every platform
#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub hashtag: String,
    pub min_body_chars: usize,
    /// Bot account names across all platforms, used for delegation sync
    pub bot_accounts: Vec<String>,
}

type PostKey = (Platform, String, String);

/// Removes the post from the in-flight set when dropped
struct InFlightClaim<'a> {
    set: &'a DashSet<PostKey>,
    key: PostKey,
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.key);
    }
}

pub struct UpvoteEngine {
    records: Arc<dyn RecordStore>,
    boosts: Arc<BoostTracker>,
    delegations: DelegationSynchronizer,
    retry: RetryExecutor,
    settings: EngineSettings,
    in_flight: DashSet<PostKey>,
}

impl UpvoteEngine {
    pub fn new(
        records: Arc<dyn RecordStore>,
        boosts: Arc<BoostTracker>,
        settings: EngineSettings,
    ) -> Self {
        Self::with_retry(records, boosts, settings, RetryConfig::default())
    }

    pub fn with_retry(
        records: Arc<dyn RecordStore>,
        boosts: Arc<BoostTracker>,
        settings: EngineSettings,
        retry: RetryConfig,
    ) -> Self {
        Self {
            delegations: DelegationSynchronizer::new(records.clone()),
            records,
            boosts,
            retry: RetryExecutor::with_config(retry),
            settings,
            in_flight: DashSet::new(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn delegations(&self) -> &DelegationSynchronizer {
        &self.delegations
    }

    /// Process one post; never returns an error, failures become [`ProcessOutcome::Failed`]
    pub async fn process(&self, handle: &PlatformHandle, post: &Post) -> ProcessOutcome {
        match self.try_process(handle, post).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    platform = %handle.platform,
                    author = %post.author,
                    permlink = %post.permlink,
                    error = %e,
                    "Failed to process post"
                );
                ProcessOutcome::Failed(e.to_string())
            }
        }
    }

    async fn try_process(&self, handle: &PlatformHandle, listed: &Post) -> Result<ProcessOutcome> {
        let platform = handle.platform;
        let adapter = handle.adapter.as_ref();
        let post = adapter
            .fetch_post_content(&listed.author, &listed.permlink)
            .await?;
        let author = post.author.as_str();

        self.delegations
            .sync(adapter, &self.settings.bot_accounts, author)
            .await;

        let body_chars = post.body.chars().count();
        if body_chars <= self.settings.min_body_chars {
            debug!(
                platform = %platform,
                author = %author,
                permlink = %post.permlink,
                body_chars,
                "Skipping short post"
            );
            return Ok(ProcessOutcome::BodyTooShort);
        }

        let tier = self.weight_tier(platform, author, &handle.account)?;
        let weight = tier.weight();
        let posturl = post.reference(platform).posturl();

        let key: PostKey = (platform, author.to_string(), posturl.clone());
        if !self.in_flight.insert(key.clone()) {
            debug!(platform = %platform, posturl = %posturl, "Post already in flight");
            return Ok(ProcessOutcome::InFlight);
        }
        let _claim = InFlightClaim {
            set: &self.in_flight,
            key,
        };

        if self.records.upvote_exists(platform, author, &posturl)? {
            debug!(platform = %platform, posturl = %posturl, "Post already upvoted");
            return Ok(ProcessOutcome::AlreadyVoted);
        }

        info!(
            platform = %platform,
            posturl = %posturl,
            ?tier,
            weight,
            "Upvoting post"
        );

        let posting = &handle.posting;
        let voter = handle.account.as_str();
        let permlink = post.permlink.as_str();
        self.retry
            .run("vote", move || {
                adapter.broadcast_vote(posting, voter, author, permlink, weight)
            })
            .await?;

        let comment = acknowledgement(&post, voter, &self.settings.hashtag);
        let comment = &comment;
        let commented = match self
            .retry
            .run("comment", move || adapter.broadcast_comment(posting, comment))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(platform = %platform, posturl = %posturl, error = %e, "Reply failed after vote");
                false
            }
        };

        let record = UpvoteRecord {
            username: author.to_string(),
            posturl: posturl.clone(),
            platform,
            upvote_percent: weight,
            created_at: Utc::now(),
        };
        match self.records.insert_upvote_if_absent(&record) {
            Ok(true) => {}
            Ok(false) => warn!(platform = %platform, posturl = %posturl, "Upvote record already present"),
            Err(e) => error!(platform = %platform, posturl = %posturl, error = %e, "Failed to record upvote"),
        }

        Ok(ProcessOutcome::Voted { weight, commented })
    }

    /// Weight tier for `author` voting from `bot_account`
    pub fn weight_tier(&self, platform: Platform, author: &str, bot_account: &str) -> Result<WeightTier> {
        if self.boosts.is_active(author) {
            return Ok(WeightTier::Boosted);
        }
        if self
            .delegations
            .has_active_delegation(platform, author, bot_account)?
        {
            return Ok(WeightTier::Delegated);
        }
        Ok(WeightTier::Base)
    }
}

/// Reply posted under a voted post
pub fn acknowledgement(post: &Post, bot_account: &str, hashtag: &str) -> Comment {
    let metadata = serde_json::json!({
        "tags": [hashtag],
        "app": format!("curator/{}", env!("CARGO_PKG_VERSION")),
    });
    Comment {
        parent_author: post.author.clone(),
        parent_permlink: post.permlink.clone(),
        author: bot_account.to_string(),
        permlink: reply_permlink(&post.author, &post.permlink),
        title: String::new(),
        body: format!(
            "Thank you @{}! Your post has been verified and upvoted! Keep up the great work!",
            post.author
        ),
        json_metadata: metadata.to_string(),
    }
}

/// `re-<author>-<permlink>` reduced to `[a-z0-9-]`
pub fn reply_permlink(author: &str, permlink: &str) -> String {
    let mut out: String = format!("re-{author}-{permlink}")
        .chars()
        .map(|c| c.to_ascii_lowercase())
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' { c } else { '-' })
        .collect();
    out.truncate(MAX_PERMLINK_LEN);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boost::{BoostTracker, MemoryBoostStore};
    use crate::store::MemoryRecordStore;
    use crate::test_support::{handle, long_body, RecordingLedger};
    use std::time::Duration;

    struct Harness {
        engine: UpvoteEngine,
        records: Arc<MemoryRecordStore>,
        boosts: Arc<BoostTracker>,
        ledger: RecordingLedger,
        handle: PlatformHandle,
    }

    fn harness() -> Harness {
        harness_with_delay(Duration::ZERO)
    }

    fn harness_with_delay(delay: Duration) -> Harness {
        let records = Arc::new(MemoryRecordStore::new());
        let boosts = Arc::new(BoostTracker::load(Box::new(MemoryBoostStore::new())).unwrap());
        let settings = EngineSettings {
            hashtag: "curated".into(),
            min_body_chars: 100,
            bot_accounts: vec!["curator".into()],
        };
        let engine = UpvoteEngine::with_retry(
            records.clone(),
            boosts.clone(),
            settings,
            RetryConfig {
                max_attempts: 3,
                delay,
            },
        );
        let ledger = RecordingLedger::new(Platform::Hive);
        let handle = handle(&ledger, "curator");
        Harness {
            engine,
            records,
            boosts,
            ledger,
            handle,
        }
    }

    fn post(h: &Harness, author: &str, permlink: &str, body: &str) -> Post {
        h.ledger.add_post(author, permlink, body);
        Post {
            author: author.into(),
            permlink: permlink.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_weight_ordering() {
        assert!(WeightTier::Boosted.weight() > WeightTier::Delegated.weight());
        assert!(WeightTier::Delegated.weight() > WeightTier::Base.weight());
        assert_eq!(WeightTier::Delegated.weight(), 4500);
    }

    #[tokio::test]
    async fn test_plain_author_gets_base_weight() {
        let h = harness();
        let body = "a".repeat(150);
        let p = post(&h, "alice", "walk", &body);

        let outcome = h.engine.process(&h.handle, &p).await;

        assert_eq!(
            outcome,
            ProcessOutcome::Voted {
                weight: 3000,
                commented: true
            }
        );
        assert_eq!(h.ledger.operations().iter().filter(|op| *op == "vote:alice/walk:3000").count(), 1);
        assert!(h
            .ledger
            .operations()
            .iter()
            .any(|op| op == "comment:alice/walk:re-alice-walk"));
        let record = h
            .records
            .find_upvote(Platform::Hive, "alice", "alice/walk")
            .unwrap()
            .unwrap();
        assert_eq!(record.upvote_percent, 3000);
    }

    #[tokio::test]
    async fn test_boost_overrides_delegation() {
        let h = harness();
        h.boosts.grant("bob", 30).unwrap();
        h.ledger.set_delegation("bob", "curator", "500.000000 VESTS");
        let p = post(&h, "bob", "boosted", &long_body());

        let outcome = h.engine.process(&h.handle, &p).await;

        assert_eq!(
            outcome,
            ProcessOutcome::Voted {
                weight: 8000,
                commented: true
            }
        );
        assert!(h.ledger.operations().contains(&"vote:bob/boosted:8000".to_string()));
    }

    #[tokio::test]
    async fn test_delegating_author_gets_bonus() {
        let h = harness();
        h.ledger.set_delegation("dan", "curator", "500.000000 VESTS");
        let p = post(&h, "dan", "thanks", &long_body());

        h.engine.process(&h.handle, &p).await;

        assert!(h.ledger.operations().contains(&"vote:dan/thanks:4500".to_string()));
        assert_eq!(h.records.delegation_count(), 1);
    }

    #[tokio::test]
    async fn test_second_process_is_noop() {
        let h = harness();
        let p = post(&h, "alice", "once", &long_body());

        h.engine.process(&h.handle, &p).await;
        let second = h.engine.process(&h.handle, &p).await;

        assert_eq!(second, ProcessOutcome::AlreadyVoted);
        assert_eq!(h.ledger.count_ops("vote:"), 1);
        assert_eq!(h.ledger.count_ops("comment:"), 1);
        assert_eq!(h.records.upvote_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_processing_votes_once() {
        // The first vote attempt fails, so the first task sleeps in the
        // retry delay while still holding its claim on the post.
        let h = harness_with_delay(Duration::from_millis(5));
        h.ledger.fail_next_votes(1);
        let p = post(&h, "alice", "race", &long_body());

        let (a, b) = tokio::join!(
            h.engine.process(&h.handle, &p),
            h.engine.process(&h.handle, &p)
        );

        assert_eq!(
            a,
            ProcessOutcome::Voted {
                weight: 3000,
                commented: true
            }
        );
        assert_eq!(b, ProcessOutcome::InFlight);
        assert_eq!(h.ledger.count_ops("vote:"), 1);
        assert_eq!(h.ledger.count_ops("attempt-vote:"), 2);
        assert_eq!(h.records.upvote_count(), 1);
    }

    #[tokio::test]
    async fn test_claim_is_released_after_processing() {
        let h = harness();
        let p = post(&h, "alice", "again", &long_body());

        h.engine.process(&h.handle, &p).await;
        assert!(h.engine.in_flight.is_empty());
        assert_eq!(
            h.engine.process(&h.handle, &p).await,
            ProcessOutcome::AlreadyVoted
        );
    }

    #[tokio::test]
    async fn test_short_body_is_skipped() {
        let h = harness();
        let p = post(&h, "erin", "tiny", &"x".repeat(100));

        let outcome = h.engine.process(&h.handle, &p).await;

        assert_eq!(outcome, ProcessOutcome::BodyTooShort);
        assert_eq!(h.ledger.count_ops("vote:"), 0);
        assert_eq!(h.records.upvote_count(), 0);
    }

    #[tokio::test]
    async fn test_vote_retried_until_success() {
        let h = harness();
        h.ledger.fail_next_votes(2);
        let p = post(&h, "alice", "flaky", &long_body());

        let outcome = h.engine.process(&h.handle, &p).await;

        assert!(matches!(outcome, ProcessOutcome::Voted { weight: 3000, .. }));
        assert_eq!(h.ledger.count_ops("attempt-vote:"), 3);
        assert_eq!(h.records.upvote_count(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_vote_leaves_no_record() {
        let h = harness();
        h.ledger.fail_next_votes(5);
        let p = post(&h, "alice", "down", &long_body());

        let outcome = h.engine.process(&h.handle, &p).await;

        assert!(matches!(outcome, ProcessOutcome::Failed(_)));
        assert_eq!(h.ledger.count_ops("comment:"), 0);
        assert_eq!(h.records.upvote_count(), 0);
    }

    #[tokio::test]
    async fn test_comment_failure_keeps_vote_record() {
        let h = harness();
        h.ledger.fail_next_comments(3);
        let p = post(&h, "alice", "quiet", &long_body());

        let outcome = h.engine.process(&h.handle, &p).await;

        assert_eq!(
            outcome,
            ProcessOutcome::Voted {
                weight: 3000,
                commented: false
            }
        );
        assert_eq!(h.records.upvote_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_content_fails_post_only() {
        let h = harness();
        let ghost = Post {
            author: "ghost".into(),
            permlink: "gone".into(),
            body: long_body(),
            ..Default::default()
        };
        assert!(matches!(
            h.engine.process(&h.handle, &ghost).await,
            ProcessOutcome::Failed(_)
        ));

        let p = post(&h, "alice", "fine", &long_body());
        assert!(matches!(
            h.engine.process(&h.handle, &p).await,
            ProcessOutcome::Voted { .. }
        ));
    }

    #[test]
    fn test_reply_permlink_is_sanitized() {
        assert_eq!(reply_permlink("alice", "my-post"), "re-alice-my-post");
        assert_eq!(reply_permlink("john.doe", "Hello_World"), "re-john-doe-hello-world");
        assert_eq!(reply_permlink("a", &"p".repeat(300)).len(), 255);
    }

    #[test]
    fn test_acknowledgement_metadata() {
        let post = Post {
            author: "alice".into(),
            permlink: "walk".into(),
            ..Default::default()
        };
        let comment = acknowledgement(&post, "curator", "curated");
        assert_eq!(comment.author, "curator");
        assert_eq!(comment.parent_author, "alice");
        assert!(comment.body.starts_with("Thank you @alice!"));
        let meta: serde_json::Value = serde_json::from_str(&comment.json_metadata).unwrap();
        assert_eq!(meta["tags"][0], "curated");
        assert!(meta["app"].as_str().unwrap().starts_with("curator/"));
    }
}
