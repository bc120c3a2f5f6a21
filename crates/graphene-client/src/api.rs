//! Condenser response shapes
//!
//! The three chains share the condenser API but differ in a few field names.
//! Those differences are absorbed here with serde aliases.

use crate::error::ClientError;
use chrono::{NaiveDateTime, TimeZone, Utc};
use curator_core::{Account, Asset, GlobalProperties, Post, Transfer};
use serde::Deserialize;
use serde_json::Value;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Deserialize)]
pub struct ApiAccount {
    pub name: String,
    pub balance: Asset,
    pub vesting_shares: Asset,
    #[serde(default)]
    pub delegated_vesting_shares: Option<Asset>,
    #[serde(default)]
    pub received_vesting_shares: Option<Asset>,
}

impl From<ApiAccount> for Account {
    fn from(api: ApiAccount) -> Self {
        let zero = || Asset::new(0, Asset::VESTS_PRECISION, "VESTS");
        Account {
            name: api.name,
            balance: api.balance,
            vesting_shares: api.vesting_shares,
            delegated_vesting_shares: api.delegated_vesting_shares.unwrap_or_else(zero),
            received_vesting_shares: api.received_vesting_shares.unwrap_or_else(zero),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiDiscussion {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub permlink: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub json_metadata: String,
}

impl ApiDiscussion {
    /// Tags from the metadata string, falling back to the category
    pub fn tags(&self) -> Vec<String> {
        let parsed = serde_json::from_str::<Value>(&self.json_metadata)
            .ok()
            .and_then(|meta| match meta.get("tags") {
                Some(Value::Array(tags)) => Some(
                    tags.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect::<Vec<_>>(),
                ),
                _ => None,
            });
        match parsed {
            Some(tags) => tags,
            None if !self.category.is_empty() => vec![self.category.clone()],
            None => Vec::new(),
        }
    }
}

impl From<ApiDiscussion> for Post {
    fn from(api: ApiDiscussion) -> Self {
        let tags = api.tags();
        Post {
            author: api.author,
            permlink: api.permlink,
            title: api.title,
            body: api.body,
            tags,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiGlobalProperties {
    pub head_block_number: u64,
    pub head_block_id: String,
    pub time: String,
    #[serde(
        alias = "total_vesting_fund_hive",
        alias = "total_vesting_fund_steem",
        alias = "total_vesting_fund_blurt"
    )]
    pub total_vesting_fund: Asset,
    pub total_vesting_shares: Asset,
}

impl TryFrom<ApiGlobalProperties> for GlobalProperties {
    type Error = ClientError;

    fn try_from(api: ApiGlobalProperties) -> Result<Self, Self::Error> {
        let time = NaiveDateTime::parse_from_str(api.time.trim_end_matches('Z'), TIME_FORMAT)
            .map_err(|e| ClientError::Decode(format!("time {:?}: {e}", api.time)))?;
        Ok(GlobalProperties {
            head_block_number: api.head_block_number,
            head_block_id: api.head_block_id,
            time: Utc.from_utc_datetime(&time),
            total_vesting_fund: api.total_vesting_fund,
            total_vesting_shares: api.total_vesting_shares,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiOperation {
    #[serde(default)]
    pub block: u64,
    pub op: (String, Value),
}

#[derive(Debug, Deserialize)]
struct ApiTransfer {
    from: String,
    to: String,
    amount: Asset,
    #[serde(default)]
    memo: String,
}

impl ApiOperation {
    /// `Some` for transfer operations, `None` for everything else
    pub fn into_transfer(self, block_num: u64) -> Result<Option<Transfer>, ClientError> {
        let (name, body) = self.op;
        if name != "transfer" {
            return Ok(None);
        }
        let t: ApiTransfer = serde_json::from_value(body)?;
        Ok(Some(Transfer {
            block_num: if self.block == 0 { block_num } else { self.block },
            from: t.from,
            to: t.to,
            amount: t.amount,
            memo: t.memo,
        }))
    }
}
