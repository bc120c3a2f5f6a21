//! Delegation synchronizer
//!
//! Mirrors on-chain delegations from post authors to the bot's accounts into
//! the record store. A record's `enabled` flag is what the upvote engine
//! reads; it is true only while an on-chain delegation with a positive
//! amount exists. Records are never deleted, a withdrawn delegation just
//! flips `enabled` off.

use crate::asset::Asset;
use crate::error::Result;
use crate::ledger::{GlobalProperties, LedgerAdapter, VestingDelegation};
use crate::platform::Platform;
use crate::store::{DelegationRecord, RecordStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What one `sync` call changed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: u32,
    pub updated: u32,
    pub unchanged: u32,
    pub failed: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Reconciled {
    Created,
    Updated,
    Unchanged,
}

pub struct DelegationSynchronizer {
    records: Arc<dyn RecordStore>,
}

impl DelegationSynchronizer {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    /// Reconcile delegations from `owner` to each of `bot_accounts`
    ///
    /// Empty account names are skipped. A failure for one bot account is
    /// logged and counted; the remaining accounts are still synced.
    pub async fn sync(
        &self,
        adapter: &dyn LedgerAdapter,
        bot_accounts: &[String],
        owner: &str,
    ) -> SyncReport {
        let platform = adapter.platform();
        let mut report = SyncReport::default();
        let mut props: Option<GlobalProperties> = None;

        for account in bot_accounts.iter().filter(|a| !a.trim().is_empty()) {
            match self.sync_account(adapter, &mut props, owner, account).await {
                Ok(Reconciled::Created) => report.created += 1,
                Ok(Reconciled::Updated) => report.updated += 1,
                Ok(Reconciled::Unchanged) => report.unchanged += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        platform = %platform,
                        delegator = %owner,
                        delegatee = %account,
                        error = %e,
                        "Delegation sync failed"
                    );
                }
            }
        }

        debug!(platform = %platform, delegator = %owner, ?report, "Delegation sync finished");
        report
    }

    async fn sync_account(
        &self,
        adapter: &dyn LedgerAdapter,
        props: &mut Option<GlobalProperties>,
        owner: &str,
        account: &str,
    ) -> Result<Reconciled> {
        let platform = adapter.platform();
        let on_chain: Option<VestingDelegation> = adapter
            .fetch_vesting_delegations(owner, account, 1)
            .await?
            .into_iter()
            .find(|d| d.delegatee == account);
        let existing = self.records.find_delegation(platform, owner, account)?;

        let Some(delegation) = on_chain else {
            return match existing {
                Some(record) if record.enabled => {
                    let now = Utc::now();
                    let vesting_shares = Asset::new(
                        0,
                        record.vesting_shares.precision,
                        record.vesting_shares.symbol.clone(),
                    );
                    let record = DelegationRecord {
                        vesting_shares,
                        power: zero_power(platform),
                        enabled: false,
                        updated_at: now,
                        ..record
                    };
                    self.records.upsert_delegation(&record)?;
                    info!(
                        platform = %platform,
                        delegator = %owner,
                        delegatee = %account,
                        "Delegation withdrawn"
                    );
                    Ok(Reconciled::Updated)
                }
                _ => Ok(Reconciled::Unchanged),
            };
        };

        let enabled = delegation.vesting_shares.amount > 0;
        if let Some(record) = &existing {
            if record.vesting_shares == delegation.vesting_shares && record.enabled == enabled {
                return Ok(Reconciled::Unchanged);
            }
        } else if !enabled {
            return Ok(Reconciled::Unchanged);
        }

        let power = self.normalize(adapter, props, &delegation.vesting_shares).await;
        let now = Utc::now();
        let record = DelegationRecord {
            delegator: owner.to_string(),
            delegatee: account.to_string(),
            platform,
            vesting_shares: delegation.vesting_shares.clone(),
            power,
            enabled,
            created_at: existing.as_ref().map(|r| r.created_at).unwrap_or(now),
            updated_at: now,
        };
        self.records.upsert_delegation(&record)?;

        info!(
            platform = %platform,
            delegator = %owner,
            delegatee = %account,
            vesting_shares = %record.vesting_shares,
            power = %record.power,
            enabled,
            "Delegation recorded"
        );
        Ok(if existing.is_some() {
            Reconciled::Updated
        } else {
            Reconciled::Created
        })
    }

    /// Vests in the platform power unit; zero when global properties are unavailable
    async fn normalize(
        &self,
        adapter: &dyn LedgerAdapter,
        props: &mut Option<GlobalProperties>,
        vests: &Asset,
    ) -> Asset {
        let platform = adapter.platform();
        if props.is_none() {
            match adapter.fetch_global_properties().await {
                Ok(fetched) => *props = Some(fetched),
                Err(e) => {
                    warn!(platform = %platform, error = %e, "Cannot normalize delegation power");
                    return zero_power(platform);
                }
            }
        }
        match props.as_ref() {
            Some(p) => {
                let power = vests.vests_to_power(&p.total_vesting_fund, &p.total_vesting_shares);
                Asset::new(power.amount, power.precision, platform.power_unit())
            }
            None => zero_power(platform),
        }
    }

    pub fn has_active_delegation(
        &self,
        platform: Platform,
        delegator: &str,
        delegatee: &str,
    ) -> Result<bool> {
        self.records.has_active_delegation(platform, delegator, delegatee)
    }

    /// Normalized power of the `selected` delegators with an enabled delegation to `delegatee`
    ///
    /// Every selected name is reported; names without an enabled record get zero.
    pub fn delegated_power(
        &self,
        platform: Platform,
        delegatee: &str,
        selected: &[String],
    ) -> Result<Vec<(String, Asset)>> {
        let records = self.records.delegations_to(platform, delegatee)?;
        Ok(selected
            .iter()
            .map(|name| {
                let power = records
                    .iter()
                    .find(|r| &r.delegator == name && r.enabled)
                    .map(|r| r.power.clone())
                    .unwrap_or_else(|| zero_power(platform));
                (name.clone(), power)
            })
            .collect())
    }
}

fn zero_power(platform: Platform) -> Asset {
    Asset::new(0, Asset::TOKEN_PRECISION, platform.power_unit())
}
