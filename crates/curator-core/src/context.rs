//! Explicit bot context
//!
//! Everything a cycle needs lives here: one [`PlatformHandle`] per enabled
//! platform plus the shared stores and engines. The context is built once at
//! startup and passed around by reference or `Arc`.

use crate::boost::BoostTracker;
use crate::config::{BotConfig, Credential, PlatformConfig};
use crate::cycle::{CycleController, CycleReport};
use crate::donation::DonationProcessor;
use crate::ledger::LedgerAdapter;
use crate::platform::Platform;
use crate::retry::RetryConfig;
use crate::store::RecordStore;
use crate::upvote::{EngineSettings, UpvoteEngine};
use crate::watcher::{TransferWatcher, WatchReport};
use std::sync::Arc;
use tracing::info;

/// Bot account, credentials and adapter for one platform
#[derive(Clone)]
pub struct PlatformHandle {
    pub platform: Platform,
    pub account: String,
    pub posting: Credential,
    pub active: Credential,
    pub adapter: Arc<dyn LedgerAdapter>,
}

impl PlatformHandle {
    pub fn new(section: &PlatformConfig, adapter: Arc<dyn LedgerAdapter>) -> Self {
        Self {
            platform: adapter.platform(),
            account: section.username.clone(),
            posting: section.posting_credential(),
            active: section.active_credential(),
            adapter,
        }
    }
}

impl std::fmt::Debug for PlatformHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformHandle")
            .field("platform", &self.platform)
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

pub struct BotContext {
    handles: Vec<PlatformHandle>,
    records: Arc<dyn RecordStore>,
    boosts: Arc<BoostTracker>,
    engine: Arc<UpvoteEngine>,
    cycle: CycleController,
    watcher: TransferWatcher,
}

impl BotContext {
    pub fn new(
        config: &BotConfig,
        records: Arc<dyn RecordStore>,
        boosts: Arc<BoostTracker>,
        handles: Vec<PlatformHandle>,
    ) -> Self {
        Self::with_retry(config, records, boosts, handles, RetryConfig::default())
    }

    pub fn with_retry(
        config: &BotConfig,
        records: Arc<dyn RecordStore>,
        boosts: Arc<BoostTracker>,
        mut handles: Vec<PlatformHandle>,
        retry: RetryConfig,
    ) -> Self {
        handles.sort_by_key(|h| h.platform);
        let settings = EngineSettings {
            hashtag: config.hashtag.clone(),
            min_body_chars: config.min_body_chars,
            bot_accounts: config.bot_accounts(),
        };
        let engine = Arc::new(UpvoteEngine::with_retry(
            records.clone(),
            boosts.clone(),
            settings,
            retry.clone(),
        ));
        let processor = Arc::new(DonationProcessor::with_retry(
            records.clone(),
            boosts.clone(),
            retry,
        ));
        Self {
            cycle: CycleController::new(engine.clone(), config.post_limit),
            watcher: TransferWatcher::new(processor),
            handles,
            records,
            boosts,
            engine,
        }
    }

    pub fn handles(&self) -> &[PlatformHandle] {
        &self.handles
    }

    pub fn handle(&self, platform: Platform) -> Option<&PlatformHandle> {
        self.handles.iter().find(|h| h.platform == platform)
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    pub fn boosts(&self) -> &Arc<BoostTracker> {
        &self.boosts
    }

    pub fn engine(&self) -> &Arc<UpvoteEngine> {
        &self.engine
    }

    /// One curation pass over every platform, sequentially
    pub async fn run_cycle(&self) -> Vec<CycleReport> {
        let mut reports = Vec::with_capacity(self.handles.len());
        for handle in &self.handles {
            reports.push(self.cycle.run_platform(handle).await);
        }
        let voted: usize = reports.iter().map(|r| r.voted).sum();
        info!(platforms = reports.len(), voted, "Cycle finished");
        reports
    }

    /// One transfer poll over every platform, sequentially
    pub async fn poll_donations(&self) -> Vec<(Platform, WatchReport)> {
        let mut reports = Vec::with_capacity(self.handles.len());
        for handle in &self.handles {
            reports.push((handle.platform, self.watcher.poll(handle).await));
        }
        reports
    }
}
