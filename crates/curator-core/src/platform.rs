//! Supported ledgers and their static chain metadata
//!
//! This is the only place where a platform identifier is mapped to
//! platform-specific data. Everything else works against [`ChainSpec`].

use crate::error::CuratorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Static description of one ledger network
#[derive(Debug)]
pub struct ChainSpec {
    /// Lowercase identifier used in records and logs
    pub name: &'static str,
    /// Liquid token symbol
    pub native_symbol: &'static str,
    /// Dollar-pegged token symbol, absent on chains without one
    pub dollar_symbol: Option<&'static str>,
    /// Label for vesting power expressed in native units
    pub power_unit: &'static str,
    /// Hex-encoded chain id mixed into transaction digests
    pub chain_id: &'static str,
    /// Public condenser endpoint
    pub default_rpc_url: &'static str,
    /// Environment variable overriding the endpoint
    pub rpc_url_env: &'static str,
    /// Symbols that serialize under a legacy name in binary transactions
    pub wire_symbols: &'static [(&'static str, &'static str)],
}

const HIVE_SPEC: ChainSpec = ChainSpec {
    name: "hive",
    native_symbol: "HIVE",
    dollar_symbol: Some("HBD"),
    power_unit: "HP",
    chain_id: "beeab0de00000000000000000000000000000000000000000000000000000000",
    default_rpc_url: "https://api.hive.blog",
    rpc_url_env: "HIVE_RPC_URL",
    wire_symbols: &[("HIVE", "STEEM"), ("HBD", "SBD")],
};

const STEEM_SPEC: ChainSpec = ChainSpec {
    name: "steem",
    native_symbol: "STEEM",
    dollar_symbol: Some("SBD"),
    power_unit: "SP",
    chain_id: "0000000000000000000000000000000000000000000000000000000000000000",
    default_rpc_url: "https://api.steemit.com",
    rpc_url_env: "STEEM_RPC_URL",
    wire_symbols: &[],
};

const BLURT_SPEC: ChainSpec = ChainSpec {
    name: "blurt",
    native_symbol: "BLURT",
    dollar_symbol: None,
    power_unit: "BP",
    chain_id: "cd8d90f29ae273abec3eaa7731e25934c63eb654d55080caff2ebb7f5df6381f",
    default_rpc_url: "https://rpc.blurt.world",
    rpc_url_env: "BLURT_RPC_URL",
    wire_symbols: &[],
};

/// Ledger networks watched by the bot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Hive,
    Steem,
    Blurt,
}

impl Platform {
    /// All platforms in processing order
    pub const ALL: [Platform; 3] = [Platform::Hive, Platform::Steem, Platform::Blurt];

    pub fn spec(self) -> &'static ChainSpec {
        match self {
            Platform::Hive => &HIVE_SPEC,
            Platform::Steem => &STEEM_SPEC,
            Platform::Blurt => &BLURT_SPEC,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.spec().name
    }

    pub fn native_symbol(self) -> &'static str {
        self.spec().native_symbol
    }

    pub fn dollar_symbol(self) -> Option<&'static str> {
        self.spec().dollar_symbol
    }

    /// Label for vesting power expressed in native units (HP, SP, BP)
    pub fn power_unit(self) -> &'static str {
        self.spec().power_unit
    }

    /// Symbol written into binary transactions for `symbol`
    pub fn wire_symbol(self, symbol: &str) -> &str {
        self.spec()
            .wire_symbols
            .iter()
            .find(|(display, _)| *display == symbol)
            .map(|(_, wire)| *wire)
            .unwrap_or(symbol)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = CuratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CuratorError::Validation(format!("unknown platform: {s}")))
    }
}
