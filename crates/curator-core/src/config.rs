//! Bot configuration and credentials
//!
//! The config is loaded once by the binary and handed by reference to every
//! component. Nothing here is global.

use crate::error::{CuratorError, Result};
use crate::platform::Platform;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Default number of tagged posts fetched per platform and cycle
pub const DEFAULT_POST_LIMIT: u32 = 3;
/// Bodies at or below this many characters are skipped
pub const DEFAULT_MIN_BODY_CHARS: usize = 100;

/// Which authority a credential signs for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyRole {
    Posting,
    Active,
}

impl KeyRole {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyRole::Posting => "posting",
            KeyRole::Active => "active",
        }
    }
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Private key or master password; never printed
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Signing material for one account and role
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
    pub account: String,
    pub role: KeyRole,
    pub secret: Secret,
}

/// Per-platform section of the config file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub posting: Secret,
    #[serde(default)]
    pub active: Secret,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
}

impl Default for Secret {
    fn default() -> Self {
        Secret::new("")
    }
}

impl PlatformConfig {
    pub fn posting_credential(&self) -> Credential {
        Credential {
            account: self.username.clone(),
            role: KeyRole::Posting,
            secret: self.posting.clone(),
        }
    }

    pub fn active_credential(&self) -> Credential {
        Credential {
            account: self.username.clone(),
            role: KeyRole::Active,
            secret: self.active.clone(),
        }
    }
}

/// Top-level configuration file
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BotConfig {
    /// Tag searched on every platform, without the leading `#`
    pub hashtag: String,
    #[serde(default)]
    pub hive: Option<PlatformConfig>,
    #[serde(default)]
    pub steem: Option<PlatformConfig>,
    #[serde(default)]
    pub blurt: Option<PlatformConfig>,
    #[serde(default = "default_post_limit")]
    pub post_limit: u32,
    #[serde(default = "default_min_body_chars")]
    pub min_body_chars: usize,
}

fn default_post_limit() -> u32 {
    DEFAULT_POST_LIMIT
}

fn default_min_body_chars() -> usize {
    DEFAULT_MIN_BODY_CHARS
}

impl BotConfig {
    pub fn new(hashtag: impl Into<String>) -> Self {
        Self {
            hashtag: hashtag.into(),
            hive: None,
            steem: None,
            blurt: None,
            post_limit: DEFAULT_POST_LIMIT,
            min_body_chars: DEFAULT_MIN_BODY_CHARS,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CuratorError::Validation(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let mut config: BotConfig = serde_json::from_str(raw)
            .map_err(|e| CuratorError::Validation(format!("invalid config: {e}")))?;
        config.hashtag = config.hashtag.trim().trim_start_matches('#').to_string();
        if config.hashtag.is_empty() {
            return Err(CuratorError::Validation("hashtag must not be empty".into()));
        }
        Ok(config)
    }

    /// Section for `platform`, `None` when absent or without a username
    pub fn platform(&self, platform: Platform) -> Option<&PlatformConfig> {
        let section = match platform {
            Platform::Hive => self.hive.as_ref(),
            Platform::Steem => self.steem.as_ref(),
            Platform::Blurt => self.blurt.as_ref(),
        };
        section.filter(|s| !s.username.trim().is_empty())
    }

    pub fn set_platform(&mut self, platform: Platform, section: PlatformConfig) {
        let slot = match platform {
            Platform::Hive => &mut self.hive,
            Platform::Steem => &mut self.steem,
            Platform::Blurt => &mut self.blurt,
        };
        *slot = Some(section);
    }

    /// Platforms with a configured bot account, in processing order
    pub fn enabled_platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.platform(*p).is_some())
            .collect()
    }

    /// The bot's own account names across all configured platforms
    pub fn bot_accounts(&self) -> Vec<String> {
        self.enabled_platforms()
            .into_iter()
            .filter_map(|p| self.platform(p).map(|s| s.username.clone()))
            .collect()
    }
}

/// RPC endpoint for `platform`: config value, then env override, then default
pub fn resolve_rpc_url(platform: Platform, section: Option<&PlatformConfig>) -> String {
    if let Some(url) = section
        .and_then(|s| s.rpc_url.as_deref())
        .map(str::trim)
        .filter(|u| !u.is_empty())
    {
        return url.to_string();
    }
    let spec = platform.spec();
    std::env::var(spec.rpc_url_env)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| spec.default_rpc_url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const SAMPLE: &str = r##"{
        "hashtag": "#Curated",
        "hive": { "username": "curator", "posting": "posting-pass", "active": "active-pass" },
        "steem": { "username": "", "posting": "x", "active": "y" },
        "blurt": { "username": "curator.blurt", "posting": "p", "active": "a",
                   "rpc_url": "http://127.0.0.1:8091" }
    }"##;

    fn reset_env() {
        for platform in Platform::ALL {
            std::env::remove_var(platform.spec().rpc_url_env);
        }
    }

    #[test]
    fn test_parse_applies_defaults_and_filters_empty_accounts() {
        let config = BotConfig::from_json_str(SAMPLE).unwrap();
        assert_eq!(config.hashtag, "Curated");
        assert_eq!(config.post_limit, DEFAULT_POST_LIMIT);
        assert_eq!(config.min_body_chars, DEFAULT_MIN_BODY_CHARS);
        assert_eq!(config.enabled_platforms(), vec![Platform::Hive, Platform::Blurt]);
        assert_eq!(config.bot_accounts(), vec!["curator", "curator.blurt"]);
        assert!(config.platform(Platform::Steem).is_none());
    }

    #[test]
    fn test_empty_hashtag_rejected() {
        let err = BotConfig::from_json_str(r##"{"hashtag": " # "}"##).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let config = BotConfig::from_json_str(SAMPLE).unwrap();
        let credential = config.platform(Platform::Hive).unwrap().posting_credential();
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("posting-pass"));
        assert!(rendered.contains("redacted"));
        assert_eq!(credential.secret.expose(), "posting-pass");
    }

    #[test]
    #[serial]
    fn test_rpc_url_resolution_order() {
        reset_env();
        let config = BotConfig::from_json_str(SAMPLE).unwrap();

        assert_eq!(
            resolve_rpc_url(Platform::Hive, config.platform(Platform::Hive)),
            "https://api.hive.blog"
        );

        std::env::set_var("HIVE_RPC_URL", "http://localhost:8090");
        assert_eq!(
            resolve_rpc_url(Platform::Hive, config.platform(Platform::Hive)),
            "http://localhost:8090"
        );

        std::env::set_var("BLURT_RPC_URL", "http://ignored");
        assert_eq!(
            resolve_rpc_url(Platform::Blurt, config.platform(Platform::Blurt)),
            "http://127.0.0.1:8091"
        );

        reset_env();
    }
}
