//! Donation processor
//!
//! Incoming transfers whose memo reads `BOOST <username>` and whose amount
//! is exactly five native tokens are converted into vesting power for the
//! named user. When the memo also carries the platform's dollar-token symbol
//! as a third token (`BOOST carol HBD`), the user is boosted for 30 days.
//! Anything else is ignored without side effects.
//!
//! The vesting transfer goes first. The donation record and the boost are
//! only written once it has been broadcast.

use crate::asset::Asset;
use crate::boost::{BoostTracker, BOOST_DURATION_DAYS};
use crate::context::PlatformHandle;
use crate::ledger::Transfer;
use crate::platform::Platform;
use crate::retry::{RetryConfig, RetryExecutor};
use crate::store::{DonationRecord, RecordStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Whole native tokens a donation must carry
pub const DONATION_UNITS: i64 = 5;

const MEMO_KEYWORD: &str = "BOOST";

/// A transfer as seen by the processor
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferEvent {
    pub platform: Platform,
    pub sender: String,
    pub amount: Asset,
    pub memo: String,
}

impl TransferEvent {
    pub fn from_transfer(platform: Platform, transfer: &Transfer) -> Self {
        Self {
            platform,
            sender: transfer.from.clone(),
            amount: transfer.amount.clone(),
            memo: transfer.memo.clone(),
        }
    }
}

/// Parsed `BOOST` memo
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoostRequest {
    pub username: String,
    /// Memo carried the dollar-token marker
    pub boost: bool,
}

/// Parse a donation memo; `None` for anything that is not a boost request
///
/// `dollar_symbol` is the platform's dollar-token marker. Platforms without
/// one only accept the two-token form.
pub fn parse_memo(memo: &str, dollar_symbol: Option<&str>) -> Option<BoostRequest> {
    let tokens: Vec<&str> = memo.split_whitespace().collect();
    let (username, boost) = match tokens.as_slice() {
        [MEMO_KEYWORD, username] => (*username, false),
        [MEMO_KEYWORD, username, marker] if Some(*marker) == dollar_symbol => (*username, true),
        _ => return None,
    };
    let username = username.strip_prefix('@').unwrap_or(username);
    if !is_valid_account_name(username) {
        return None;
    }
    Some(BoostRequest {
        username: username.to_string(),
        boost,
    })
}

/// Graphene account name rules: 3 to 16 chars, dot-separated segments of at
/// least 3 chars that start with a letter and end with a letter or digit
pub fn is_valid_account_name(name: &str) -> bool {
    if !(3..=16).contains(&name.len()) {
        return false;
    }
    name.split('.').all(|segment| {
        let bytes = segment.as_bytes();
        bytes.len() >= 3
            && bytes[0].is_ascii_lowercase()
            && bytes[bytes.len() - 1].is_ascii_alphanumeric()
            && bytes
                .iter()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
    })
}

/// What happened to one transfer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DonationOutcome {
    /// Not a donation; nothing was written
    Ignored(&'static str),
    /// Vesting power sent
    Donated {
        username: String,
        recorded: bool,
        boosted: bool,
    },
    /// Vesting transfer failed; nothing was written
    Failed(String),
}

pub struct DonationProcessor {
    records: Arc<dyn RecordStore>,
    boosts: Arc<BoostTracker>,
    retry: RetryExecutor,
}

impl DonationProcessor {
    pub fn new(records: Arc<dyn RecordStore>, boosts: Arc<BoostTracker>) -> Self {
        Self::with_retry(records, boosts, RetryConfig::default())
    }

    pub fn with_retry(
        records: Arc<dyn RecordStore>,
        boosts: Arc<BoostTracker>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            records,
            boosts,
            retry: RetryExecutor::with_config(retry),
        }
    }

    pub async fn process(&self, handle: &PlatformHandle, event: &TransferEvent) -> DonationOutcome {
        let platform = handle.platform;
        if event.platform != platform {
            return DonationOutcome::Ignored("platform mismatch");
        }
        let Some(request) = parse_memo(&event.memo, platform.dollar_symbol()) else {
            debug!(platform = %platform, sender = %event.sender, memo = %event.memo, "Ignoring transfer memo");
            return DonationOutcome::Ignored("memo");
        };
        let native = platform.native_symbol();
        if !event.amount.is_whole_units(DONATION_UNITS, native) {
            debug!(
                platform = %platform,
                sender = %event.sender,
                amount = %event.amount,
                "Ignoring donation with wrong amount"
            );
            return DonationOutcome::Ignored("amount");
        }

        let amount = Asset::from_units(DONATION_UNITS, native);
        let active = &handle.active;
        let from = handle.account.as_str();
        let to = request.username.as_str();
        let grant = &amount;
        if let Err(e) = self
            .retry
            .run("transfer_to_vesting", move || {
                handle.adapter.broadcast_transfer_to_vesting(active, from, to, grant)
            })
            .await
        {
            error!(
                platform = %platform,
                sender = %event.sender,
                beneficiary = %request.username,
                error = %e,
                "Vesting transfer failed"
            );
            return DonationOutcome::Failed(e.to_string());
        }

        let record = DonationRecord {
            username: request.username.clone(),
            platform,
            amount: amount.clone(),
            token_type: native.to_string(),
            created_at: Utc::now(),
        };
        let recorded = match self.records.append_donation(&record) {
            Ok(()) => true,
            Err(e) => {
                error!(platform = %platform, beneficiary = %request.username, error = %e, "Failed to record donation");
                false
            }
        };

        let boosted = request.boost
            && match self.boosts.grant(&request.username, BOOST_DURATION_DAYS) {
                Ok(_) => true,
                Err(e) => {
                    error!(platform = %platform, beneficiary = %request.username, error = %e, "Failed to grant boost");
                    false
                }
            };

        info!(
            platform = %platform,
            sender = %event.sender,
            beneficiary = %request.username,
            amount = %amount,
            boosted,
            "Donation processed"
        );
        DonationOutcome::Donated {
            username: request.username,
            recorded,
            boosted,
        }
    }
}
