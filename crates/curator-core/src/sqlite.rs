//! SQLite-backed record store
//!
//! One connection behind a mutex. Dedup keys are enforced with unique
//! indexes so that the conditional upvote insert stays atomic even if two
//! processes share the database file.

use crate::asset::Asset;
use crate::error::{CuratorError, Result};
use crate::platform::Platform;
use crate::store::{DelegationRecord, DonationRecord, RecordStore, UpvoteRecord};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::info;

/// File name of the record database inside the data directory
pub const DB_FILE_NAME: &str = "curator.db";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS upvotes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    posturl TEXT NOT NULL,
    platform TEXT NOT NULL,
    upvote_percent INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (platform, username, posturl)
);
CREATE TABLE IF NOT EXISTS donations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    platform TEXT NOT NULL,
    amount TEXT NOT NULL,
    type TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS donations_by_user ON donations (platform, username);
CREATE TABLE IF NOT EXISTS delegations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    delegator TEXT NOT NULL,
    delegatee TEXT NOT NULL,
    platform TEXT NOT NULL,
    vesting_shares TEXT NOT NULL,
    power TEXT NOT NULL,
    enabled INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (platform, delegator, delegatee)
);
";

pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self::init(conn)?;
        info!(path = %path.display(), "Opened record store");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn ts(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CuratorError::Persistence(format!("bad timestamp {value:?}: {e}")))
}

fn parse_platform(value: &str) -> Result<Platform> {
    value
        .parse()
        .map_err(|_| CuratorError::Persistence(format!("bad platform {value:?}")))
}

fn parse_asset(value: &str) -> Result<Asset> {
    value
        .parse()
        .map_err(|_| CuratorError::Persistence(format!("bad asset {value:?}")))
}

type UpvoteRow = (String, String, String, u16, String);
type DonationRow = (String, String, String, String, String);
type DelegationRow = (String, String, String, String, String, bool, String, String);

fn upvote_from_row(row: UpvoteRow) -> Result<UpvoteRecord> {
    let (username, posturl, platform, upvote_percent, created_at) = row;
    Ok(UpvoteRecord {
        username,
        posturl,
        platform: parse_platform(&platform)?,
        upvote_percent,
        created_at: parse_ts(&created_at)?,
    })
}

fn donation_from_row(row: DonationRow) -> Result<DonationRecord> {
    let (username, platform, amount, token_type, created_at) = row;
    Ok(DonationRecord {
        username,
        platform: parse_platform(&platform)?,
        amount: parse_asset(&amount)?,
        token_type,
        created_at: parse_ts(&created_at)?,
    })
}

fn delegation_from_row(row: DelegationRow) -> Result<DelegationRecord> {
    let (delegator, delegatee, platform, vesting_shares, power, enabled, created_at, updated_at) = row;
    Ok(DelegationRecord {
        delegator,
        delegatee,
        platform: parse_platform(&platform)?,
        vesting_shares: parse_asset(&vesting_shares)?,
        power: parse_asset(&power)?,
        enabled,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

const DELEGATION_COLUMNS: &str =
    "delegator, delegatee, platform, vesting_shares, power, enabled, created_at, updated_at";

fn read_delegation(row: &rusqlite::Row<'_>) -> rusqlite::Result<DelegationRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

impl RecordStore for SqliteRecordStore {
    fn upvote_exists(&self, platform: Platform, username: &str, posturl: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM upvotes WHERE platform = ?1 AND username = ?2 AND posturl = ?3",
                params![platform.as_str(), username, posturl],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn insert_upvote_if_absent(&self, record: &UpvoteRecord) -> Result<bool> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT INTO upvotes (username, posturl, platform, upvote_percent, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (platform, username, posturl) DO NOTHING",
            params![
                record.username,
                record.posturl,
                record.platform.as_str(),
                record.upvote_percent,
                ts(&record.created_at)
            ],
        )?;
        Ok(inserted == 1)
    }

    fn find_upvote(
        &self,
        platform: Platform,
        username: &str,
        posturl: &str,
    ) -> Result<Option<UpvoteRecord>> {
        let conn = self.conn.lock();
        let row: Option<UpvoteRow> = conn
            .query_row(
                "SELECT username, posturl, platform, upvote_percent, created_at FROM upvotes
                 WHERE platform = ?1 AND username = ?2 AND posturl = ?3",
                params![platform.as_str(), username, posturl],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()?;
        row.map(upvote_from_row).transpose()
    }

    fn append_donation(&self, record: &DonationRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO donations (username, platform, amount, type, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.username,
                record.platform.as_str(),
                record.amount.to_string(),
                record.token_type,
                ts(&record.created_at)
            ],
        )?;
        Ok(())
    }

    fn donations_for(&self, platform: Platform, username: &str) -> Result<Vec<DonationRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT username, platform, amount, type, created_at FROM donations
             WHERE platform = ?1 AND username = ?2 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![platform.as_str(), username], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?
            .collect::<rusqlite::Result<Vec<DonationRow>>>()?;
        rows.into_iter().map(donation_from_row).collect()
    }

    fn find_delegation(
        &self,
        platform: Platform,
        delegator: &str,
        delegatee: &str,
    ) -> Result<Option<DelegationRecord>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {DELEGATION_COLUMNS} FROM delegations
                     WHERE platform = ?1 AND delegator = ?2 AND delegatee = ?3"
                ),
                params![platform.as_str(), delegator, delegatee],
                read_delegation,
            )
            .optional()?;
        row.map(delegation_from_row).transpose()
    }

    fn upsert_delegation(&self, record: &DelegationRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO delegations
                 (delegator, delegatee, platform, vesting_shares, power, enabled, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (platform, delegator, delegatee) DO UPDATE SET
                 vesting_shares = excluded.vesting_shares,
                 power = excluded.power,
                 enabled = excluded.enabled,
                 updated_at = excluded.updated_at",
            params![
                record.delegator,
                record.delegatee,
                record.platform.as_str(),
                record.vesting_shares.to_string(),
                record.power.to_string(),
                record.enabled,
                ts(&record.created_at),
                ts(&record.updated_at)
            ],
        )?;
        Ok(())
    }

    fn delegations_to(&self, platform: Platform, delegatee: &str) -> Result<Vec<DelegationRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DELEGATION_COLUMNS} FROM delegations
             WHERE platform = ?1 AND delegatee = ?2 ORDER BY delegator"
        ))?;
        let rows = stmt
            .query_map(params![platform.as_str(), delegatee], read_delegation)?
            .collect::<rusqlite::Result<Vec<DelegationRow>>>()?;
        rows.into_iter().map(delegation_from_row).collect()
    }
}
