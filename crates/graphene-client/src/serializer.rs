//! Graphene binary transaction encoding
//!
//! Only the three operations the bot broadcasts are supported. The binary
//! form is what gets signed; the JSON form is what gets submitted.

use crate::error::ClientError;
use chrono::{DateTime, Duration, Utc};
use curator_core::{Asset, Comment, GlobalProperties, Platform};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// Lifetime of a signed transaction
pub const EXPIRATION_SECS: i64 = 60;
const SYMBOL_WIDTH: usize = 7;
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Little-endian byte sink
#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// LEB128 unsigned varint
    pub fn varint(&mut self, mut v: u64) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    pub fn string(&mut self, s: &str) {
        self.varint(s.len() as u64);
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Amount, precision, then the symbol zero-padded to seven bytes
    pub fn asset(&mut self, asset: &Asset, platform: Platform) -> Result<(), ClientError> {
        let symbol = platform.wire_symbol(&asset.symbol);
        if symbol.len() > SYMBOL_WIDTH {
            return Err(ClientError::Serialize(format!("symbol too long: {symbol}")));
        }
        self.i64(asset.amount);
        self.u8(asset.precision);
        let mut padded = [0u8; SYMBOL_WIDTH];
        padded[..symbol.len()].copy_from_slice(symbol.as_bytes());
        self.buf.extend_from_slice(&padded);
        Ok(())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    Vote {
        voter: String,
        author: String,
        permlink: String,
        weight: i16,
    },
    Comment(Comment),
    TransferToVesting {
        from: String,
        to: String,
        amount: Asset,
    },
}

impl Operation {
    pub fn id(&self) -> u64 {
        match self {
            Operation::Vote { .. } => 0,
            Operation::Comment(_) => 1,
            Operation::TransferToVesting { .. } => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Vote { .. } => "vote",
            Operation::Comment(_) => "comment",
            Operation::TransferToVesting { .. } => "transfer_to_vesting",
        }
    }

    fn write(&self, w: &mut Writer, platform: Platform) -> Result<(), ClientError> {
        w.varint(self.id());
        match self {
            Operation::Vote {
                voter,
                author,
                permlink,
                weight,
            } => {
                w.string(voter);
                w.string(author);
                w.string(permlink);
                w.i16(*weight);
            }
            Operation::Comment(c) => {
                for field in [
                    &c.parent_author,
                    &c.parent_permlink,
                    &c.author,
                    &c.permlink,
                    &c.title,
                    &c.body,
                    &c.json_metadata,
                ] {
                    w.string(field);
                }
            }
            Operation::TransferToVesting { from, to, amount } => {
                w.string(from);
                w.string(to);
                w.asset(amount, platform)?;
            }
        }
        Ok(())
    }

    /// Condenser `[name, {fields}]` pair
    pub fn to_json(&self) -> Value {
        let body = match self {
            Operation::Vote {
                voter,
                author,
                permlink,
                weight,
            } => json!({
                "voter": voter,
                "author": author,
                "permlink": permlink,
                "weight": weight,
            }),
            Operation::Comment(c) => json!({
                "parent_author": c.parent_author,
                "parent_permlink": c.parent_permlink,
                "author": c.author,
                "permlink": c.permlink,
                "title": c.title,
                "body": c.body,
                "json_metadata": c.json_metadata,
            }),
            Operation::TransferToVesting { from, to, amount } => json!({
                "from": from,
                "to": to,
                "amount": amount.to_string(),
            }),
        };
        json!([self.name(), body])
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    pub platform: Platform,
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
    pub expiration: DateTime<Utc>,
    pub operations: Vec<Operation>,
}

impl Transaction {
    /// Reference the current head block and expire shortly after chain time
    pub fn from_props(
        platform: Platform,
        props: &GlobalProperties,
        operations: Vec<Operation>,
    ) -> Result<Self, ClientError> {
        let block_id = hex::decode(&props.head_block_id)
            .map_err(|e| ClientError::Decode(format!("head_block_id: {e}")))?;
        let prefix: [u8; 4] = block_id
            .get(4..8)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| ClientError::Decode("head_block_id too short".into()))?;
        Ok(Self {
            platform,
            ref_block_num: (props.head_block_number & 0xffff) as u16,
            ref_block_prefix: u32::from_le_bytes(prefix),
            expiration: props.time + Duration::seconds(EXPIRATION_SECS),
            operations,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ClientError> {
        let expiration = u32::try_from(self.expiration.timestamp())
            .map_err(|_| ClientError::Serialize("expiration out of range".into()))?;
        let mut w = Writer::new();
        w.u16(self.ref_block_num);
        w.u32(self.ref_block_prefix);
        w.u32(expiration);
        w.varint(self.operations.len() as u64);
        for op in &self.operations {
            op.write(&mut w, self.platform)?;
        }
        // extensions
        w.varint(0);
        Ok(w.into_bytes())
    }

    /// `sha256(chain_id || tx)`, the value that gets signed
    pub fn digest(&self) -> Result<[u8; 32], ClientError> {
        let chain_id = hex::decode(self.platform.spec().chain_id)
            .map_err(|e| ClientError::Serialize(format!("chain id: {e}")))?;
        let mut hasher = Sha256::new();
        hasher.update(&chain_id);
        hasher.update(self.to_bytes()?);
        Ok(hasher.finalize().into())
    }

    pub fn to_json(&self, signatures: &[[u8; 65]]) -> Value {
        json!({
            "ref_block_num": self.ref_block_num,
            "ref_block_prefix": self.ref_block_prefix,
            "expiration": self.expiration.format(TIME_FORMAT).to_string(),
            "operations": self.operations.iter().map(Operation::to_json).collect::<Vec<_>>(),
            "extensions": [],
            "signatures": signatures.iter().map(hex::encode).collect::<Vec<_>>(),
        })
    }
}
