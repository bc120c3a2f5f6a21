//! Per-platform curation pass
//!
//! Lists the newest posts under the configured tag, keeps the ones whose
//! body actually carries `#<hashtag>` and hands each to the
//! [`UpvoteEngine`]. Posts are handled one after another; a failing post
//! never stops its siblings.

use crate::context::PlatformHandle;
use crate::platform::Platform;
use crate::upvote::{ProcessOutcome, UpvoteEngine};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Tally of one platform pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleReport {
    pub platform: Platform,
    pub fetched: usize,
    pub filtered: usize,
    pub voted: usize,
    pub already_voted: usize,
    pub in_flight: usize,
    pub too_short: usize,
    pub failed: usize,
    /// Set when the pass stopped before looking at posts
    pub aborted: Option<String>,
}

impl CycleReport {
    fn new(platform: Platform) -> Self {
        Self {
            platform,
            fetched: 0,
            filtered: 0,
            voted: 0,
            already_voted: 0,
            in_flight: 0,
            too_short: 0,
            failed: 0,
            aborted: None,
        }
    }

    fn tally(&mut self, outcome: &ProcessOutcome) {
        match outcome {
            ProcessOutcome::Voted { .. } => self.voted += 1,
            ProcessOutcome::AlreadyVoted => self.already_voted += 1,
            ProcessOutcome::InFlight => self.in_flight += 1,
            ProcessOutcome::BodyTooShort => self.too_short += 1,
            ProcessOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Case-insensitive check for `#<hashtag>` anywhere in `body`
pub fn contains_hashtag(body: &str, hashtag: &str) -> bool {
    let needle = format!("#{}", hashtag.trim_start_matches('#')).to_lowercase();
    body.to_lowercase().contains(&needle)
}

pub struct CycleController {
    engine: Arc<UpvoteEngine>,
    post_limit: u32,
}

impl CycleController {
    pub fn new(engine: Arc<UpvoteEngine>, post_limit: u32) -> Self {
        Self { engine, post_limit }
    }

    pub async fn run_platform(&self, handle: &PlatformHandle) -> CycleReport {
        let platform = handle.platform;
        let adapter = handle.adapter.as_ref();
        let hashtag = self.engine.settings().hashtag.as_str();
        // chain tags are stored lowercase
        let tag = hashtag.to_lowercase();
        let mut report = CycleReport::new(platform);

        if let Err(e) = adapter.fetch_account(&handle.account).await {
            error!(platform = %platform, account = %handle.account, error = %e, "Bot account unavailable");
            report.aborted = Some(e.to_string());
            return report;
        }

        let posts = match adapter
            .fetch_recent_tagged_posts(&tag, self.post_limit)
            .await
        {
            Ok(posts) => posts,
            Err(e) => {
                error!(platform = %platform, tag = %tag, error = %e, "Failed to list tagged posts");
                report.aborted = Some(e.to_string());
                return report;
            }
        };
        report.fetched = posts.len();

        for post in &posts {
            if !contains_hashtag(&post.body, hashtag) {
                debug!(
                    platform = %platform,
                    author = %post.author,
                    permlink = %post.permlink,
                    "Post does not carry the hashtag"
                );
                report.filtered += 1;
                continue;
            }
            let outcome = self.engine.process(handle, post).await;
            report.tally(&outcome);
        }

        info!(
            platform = %platform,
            fetched = report.fetched,
            voted = report.voted,
            already_voted = report.already_voted,
            failed = report.failed,
            "Curation pass finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boost::{BoostTracker, MemoryBoostStore};
    use crate::retry::RetryConfig;
    use crate::store::MemoryRecordStore;
    use crate::test_support::{handle, long_body, RecordingLedger};
    use crate::upvote::EngineSettings;
    use std::time::Duration;

    fn controller(post_limit: u32) -> (CycleController, Arc<MemoryRecordStore>) {
        controller_with_tag(post_limit, "curated")
    }

    fn controller_with_tag(
        post_limit: u32,
        hashtag: &str,
    ) -> (CycleController, Arc<MemoryRecordStore>) {
        let records = Arc::new(MemoryRecordStore::new());
        let boosts = Arc::new(BoostTracker::load(Box::new(MemoryBoostStore::new())).unwrap());
        let engine = UpvoteEngine::with_retry(
            records.clone(),
            boosts,
            EngineSettings {
                hashtag: hashtag.into(),
                min_body_chars: 100,
                bot_accounts: vec!["curator".into()],
            },
            RetryConfig {
                max_attempts: 2,
                delay: Duration::ZERO,
            },
        );
        (CycleController::new(Arc::new(engine), post_limit), records)
    }

    #[test]
    fn test_hashtag_match_ignores_case() {
        assert!(contains_hashtag("Loving the #Curated life", "curated"));
        assert!(contains_hashtag("#curated", "#CURATED"));
        assert!(!contains_hashtag("curated without the marker", "curated"));
    }

    #[tokio::test]
    async fn test_pass_filters_and_votes() {
        let (controller, records) = controller(3);
        let ledger = RecordingLedger::new(Platform::Steem);
        ledger.add_post("alice", "one", &long_body());
        ledger.add_post("bob", "two", &"no tag here, just words. ".repeat(10));
        ledger.add_post("carl", "three", "#curated short");

        let report = controller.run_platform(&handle(&ledger, "curator")).await;

        assert_eq!(report.fetched, 3);
        assert_eq!(report.filtered, 1);
        assert_eq!(report.voted, 1);
        assert_eq!(report.too_short, 1);
        assert_eq!(records.upvote_count(), 1);
    }

    #[tokio::test]
    async fn test_listing_uses_lowercase_tag() {
        let (controller, records) = controller_with_tag(3, "Curated");
        let ledger = RecordingLedger::new(Platform::Hive);
        ledger.add_post("alice", "one", &long_body());

        let report = controller.run_platform(&handle(&ledger, "curator")).await;

        assert!(ledger.operations().contains(&"list:curated".to_string()));
        assert_eq!(report.voted, 1);
        assert_eq!(records.upvote_count(), 1);
    }

    #[tokio::test]
    async fn test_post_limit_is_passed_to_listing() {
        let (controller, _) = controller(1);
        let ledger = RecordingLedger::new(Platform::Hive);
        ledger.add_post("alice", "one", &long_body());
        ledger.add_post("bob", "two", &long_body());

        let report = controller.run_platform(&handle(&ledger, "curator")).await;
        assert_eq!(report.fetched, 1);
    }

    #[tokio::test]
    async fn test_failing_post_does_not_stop_siblings() {
        let (controller, records) = controller(3);
        let ledger = RecordingLedger::new(Platform::Hive);
        ledger.add_post("alice", "one", &long_body());
        ledger.add_post("bob", "two", &long_body());
        ledger.fail_next_votes(2);

        let report = controller.run_platform(&handle(&ledger, "curator")).await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.voted, 1);
        assert_eq!(records.upvote_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_bot_account_aborts_pass() {
        let (controller, _) = controller(3);
        let ledger = RecordingLedger::new(Platform::Blurt);
        ledger.add_post("alice", "one", &long_body());
        ledger.mark_missing("curator");

        let report = controller.run_platform(&handle(&ledger, "curator")).await;

        assert!(report.aborted.is_some());
        assert_eq!(report.fetched, 0);
        assert_eq!(ledger.count_ops("vote:"), 0);
    }
}
