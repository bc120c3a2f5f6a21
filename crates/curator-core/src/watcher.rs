//! Incoming transfer watcher
//!
//! Walks new blocks on each platform and feeds transfers addressed to the
//! bot account into the [`DonationProcessor`]. The first poll of a platform
//! starts at the current head block; older history is never replayed.

use crate::context::PlatformHandle;
use crate::donation::{DonationOutcome, DonationProcessor, TransferEvent};
use crate::platform::Platform;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Upper bound on blocks read in one poll
pub const DEFAULT_MAX_BLOCKS_PER_POLL: u64 = 100;

/// Tally of one poll
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WatchReport {
    pub blocks: u64,
    pub transfers: usize,
    pub donations: usize,
    pub failed: usize,
}

pub struct TransferWatcher {
    processor: Arc<DonationProcessor>,
    /// Next block to read, per platform
    cursors: Mutex<HashMap<Platform, u64>>,
    max_blocks_per_poll: u64,
}

impl TransferWatcher {
    pub fn new(processor: Arc<DonationProcessor>) -> Self {
        Self::with_batch(processor, DEFAULT_MAX_BLOCKS_PER_POLL)
    }

    pub fn with_batch(processor: Arc<DonationProcessor>, max_blocks_per_poll: u64) -> Self {
        Self {
            processor,
            cursors: Mutex::new(HashMap::new()),
            max_blocks_per_poll: max_blocks_per_poll.max(1),
        }
    }

    pub fn cursor(&self, platform: Platform) -> Option<u64> {
        self.cursors.lock().get(&platform).copied()
    }

    /// Read blocks up to the current head and process transfers to the bot
    ///
    /// A block that cannot be read ends the poll; it is retried next time.
    pub async fn poll(&self, handle: &PlatformHandle) -> WatchReport {
        let platform = handle.platform;
        let adapter = handle.adapter.as_ref();
        let mut report = WatchReport::default();

        let head = match adapter.fetch_global_properties().await {
            Ok(props) => props.head_block_number,
            Err(e) => {
                warn!(platform = %platform, error = %e, "Cannot read head block");
                return report;
            }
        };

        let start = *self.cursors.lock().entry(platform).or_insert(head);
        if start > head {
            return report;
        }
        let end = head.min(start + self.max_blocks_per_poll - 1);

        let mut next = start;
        while next <= end {
            let transfers = match adapter.fetch_transfers_in_block(next).await {
                Ok(transfers) => transfers,
                Err(e) => {
                    warn!(platform = %platform, block = next, error = %e, "Block read failed");
                    break;
                }
            };
            report.blocks += 1;

            for transfer in transfers.iter().filter(|t| t.to == handle.account) {
                report.transfers += 1;
                let event = TransferEvent::from_transfer(platform, transfer);
                match self.processor.process(handle, &event).await {
                    DonationOutcome::Donated { .. } => report.donations += 1,
                    DonationOutcome::Failed(_) => report.failed += 1,
                    DonationOutcome::Ignored(_) => {}
                }
            }
            next += 1;
        }

        self.cursors.lock().insert(platform, next);
        debug!(platform = %platform, from = start, to = next, ?report, "Transfer poll finished");
        report
    }
}
