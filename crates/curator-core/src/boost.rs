//! Boost lifecycle
//!
//! A boost lifts a user's upvote weight until it expires. The tracker keeps
//! the full username -> expiry mapping in memory and mirrors it to a
//! [`BoostStore`] after every mutation. Expired entries are only purged when
//! they are looked up.

use crate::error::{CuratorError, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Days a qualifying donation keeps its sender boosted
pub const BOOST_DURATION_DAYS: i64 = 30;

/// File name of the boost mirror inside the data directory
pub const BOOST_FILE_NAME: &str = "boosted_users.json";

pub type BoostMap = HashMap<String, DateTime<Utc>>;

/// Whole-mapping persistence for boosts
pub trait BoostStore: Send + Sync {
    fn load(&self) -> Result<BoostMap>;
    fn save(&self, boosts: &BoostMap) -> Result<()>;
}

/// JSON object of `{ "username": "ISO-8601 expiry" }` rewritten on every save
pub struct JsonFileBoostStore {
    path: PathBuf,
}

impl JsonFileBoostStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<dir>/boosted_users.json`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(BOOST_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BoostStore for JsonFileBoostStore {
    fn load(&self) -> Result<BoostMap> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BoostMap::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(BoostMap::new());
        }

        let entries: BTreeMap<String, String> = serde_json::from_str(&raw).map_err(|e| {
            CuratorError::Persistence(format!("corrupt boost file {}: {e}", self.path.display()))
        })?;

        let mut boosts = BoostMap::with_capacity(entries.len());
        for (username, expiry) in entries {
            match DateTime::parse_from_rfc3339(&expiry) {
                Ok(expiry) => {
                    boosts.insert(username, expiry.with_timezone(&Utc));
                }
                Err(e) => warn!(username = %username, expiry = %expiry, "Skipping unreadable boost entry: {}", e),
            }
        }
        Ok(boosts)
    }

    fn save(&self, boosts: &BoostMap) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let ordered: BTreeMap<&str, String> = boosts
            .iter()
            .map(|(user, expiry)| (user.as_str(), expiry.to_rfc3339_opts(SecondsFormat::Millis, true)))
            .collect();
        let json = serde_json::to_string_pretty(&ordered)
            .map_err(|e| CuratorError::Persistence(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Volatile store, used by tests and dry runs
#[derive(Default)]
pub struct MemoryBoostStore {
    boosts: Mutex<BoostMap>,
    fail_saves: Mutex<bool>,
}

impl MemoryBoostStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> BoostMap {
        self.boosts.lock().clone()
    }

    /// Make subsequent saves fail until reset
    pub fn set_fail_saves(&self, fail: bool) {
        *self.fail_saves.lock() = fail;
    }
}

impl BoostStore for MemoryBoostStore {
    fn load(&self) -> Result<BoostMap> {
        Ok(self.boosts.lock().clone())
    }

    fn save(&self, boosts: &BoostMap) -> Result<()> {
        if *self.fail_saves.lock() {
            return Err(CuratorError::Persistence("boost store unavailable".into()));
        }
        *self.boosts.lock() = boosts.clone();
        Ok(())
    }
}

/// Username -> expiry mapping with lazy expiry
///
/// The tracker is the only writer of its store for the process lifetime.
/// All mutations happen under one lock, so writes for the same user are
/// serialized.
pub struct BoostTracker {
    boosts: Mutex<BoostMap>,
    store: Box<dyn BoostStore>,
}

impl BoostTracker {
    /// Load the persisted mapping
    pub fn load(store: Box<dyn BoostStore>) -> Result<Self> {
        let boosts = store.load()?;
        info!(entries = boosts.len(), "Loaded boost entries");
        Ok(Self {
            boosts: Mutex::new(boosts),
            store,
        })
    }

    pub fn is_active(&self, username: &str) -> bool {
        self.is_active_at(username, Utc::now())
    }

    /// Whether `username` is boosted at `now`
    ///
    /// An entry found expired is removed and the removal persisted. A failed
    /// persist is logged; the entry stays dropped from memory and the answer
    /// is still `false`.
    pub fn is_active_at(&self, username: &str, now: DateTime<Utc>) -> bool {
        let mut boosts = self.boosts.lock();
        let Some(expiry) = boosts.get(username).copied() else {
            return false;
        };
        if now < expiry {
            return true;
        }

        boosts.remove(username);
        debug!(username = %username, expired_at = %expiry, "Boost expired");
        if let Err(e) = self.store.save(&boosts) {
            error!(username = %username, error = %e, "Failed to persist expired boost removal");
        }
        false
    }

    pub fn grant(&self, username: &str, duration_days: i64) -> Result<DateTime<Utc>> {
        self.grant_at(username, duration_days, Utc::now())
    }

    /// Set the expiry of `username` to `now + duration_days`, replacing any previous one
    ///
    /// The mapping is only changed in memory once the store accepted it.
    pub fn grant_at(
        &self,
        username: &str,
        duration_days: i64,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        let expiry = now + Duration::days(duration_days);
        let mut boosts = self.boosts.lock();
        let mut next = boosts.clone();
        next.insert(username.to_string(), expiry);
        self.store.save(&next)?;
        *boosts = next;
        info!(username = %username, expires_at = %expiry, "Boost granted");
        Ok(expiry)
    }

    /// Current expiry without purging
    pub fn expiry(&self, username: &str) -> Option<DateTime<Utc>> {
        self.boosts.lock().get(username).copied()
    }

    pub fn len(&self) -> usize {
        self.boosts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.boosts.lock().is_empty()
    }
}
