//! Configuration management for Transcast
//!
//! Credentials and account names come from the environment only. Tunables
//! may also be set in an optional TOML file; environment variables take
//! precedence over the file.
//!
//! ```toml
//! [forwarding]
//! poll_interval = "5m"
//! post_delay = "30s"
//! batch_size = 5
//! backlog = "cap"
//! attribution_prefix = "स्रोत"
//!
//! [translation]
//! source_lang = "en"
//! target_lang = "hi"
//!
//! [cursor]
//! path = "~/.local/share/transcast/lastTweetId.txt"
//! ```

use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, Result, TranscastError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_POST_DELAY: Duration = Duration::from_secs(30);
pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const DEFAULT_ATTRIBUTION_PREFIX: &str = "स्रोत";
pub const DEFAULT_CURSOR_FILE: &str = "lastTweetId.txt";

/// The timeline endpoint accepts `max_results` between 5 and 100.
const BATCH_SIZE_RANGE: std::ops::RangeInclusive<usize> = 5..=100;

pub struct Config {
    pub credentials: Credentials,
    pub accounts: AccountsConfig,
    pub forwarding: ForwardingConfig,
    pub translation: TranslationConfig,
    pub cursor: CursorConfig,
}

/// API credentials. Values are zeroed on drop and redacted in `Debug`.
#[derive(Debug)]
pub struct Credentials {
    pub consumer_key: SecretString,
    pub consumer_secret: SecretString,
    pub access_token: SecretString,
    pub access_token_secret: SecretString,
    /// App-only token for the read-only client
    pub bearer_token: SecretString,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountsConfig {
    /// Handle or numeric id of the account being mirrored
    pub source_user: String,
    /// Handle of the account the translations are posted as
    pub target_user: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingConfig {
    pub poll_interval: Duration,
    pub post_delay: Duration,
    pub batch_size: usize,
    pub backlog: BacklogPolicy,
    pub attribution_prefix: String,
}

#[derive(Debug)]
pub struct TranslationConfig {
    pub source_lang: String,
    pub target_lang: String,
    /// Cloud Translation API key; the keyless endpoint is used when absent
    pub api_key: Option<SecretString>,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorConfig {
    pub path: PathBuf,
}

/// What to do when more posts accumulated than fit in one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BacklogPolicy {
    /// Fetch a single page per poll; anything older is skipped
    #[default]
    Cap,
    /// Follow pagination until every post newer than the cursor is fetched
    Drain,
}

impl FromStr for BacklogPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cap" => Ok(BacklogPolicy::Cap),
            "drain" => Ok(BacklogPolicy::Drain),
            _ => Err(format!(
                "Invalid backlog policy: '{}'. Valid options: cap, drain",
                s
            )),
        }
    }
}

/// On-disk representation; every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub forwarding: FileForwarding,
    pub translation: FileTranslation,
    pub cursor: FileCursor,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileForwarding {
    pub poll_interval: Option<String>,
    pub post_delay: Option<String>,
    pub batch_size: Option<usize>,
    pub backlog: Option<BacklogPolicy>,
    pub attribution_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileTranslation {
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub api_key: Option<String>,
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileCursor {
    pub path: Option<String>,
}

impl FileConfig {
    /// Read a config file; a missing file yields the defaults
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: FileConfig = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }
}

impl Config {
    /// Load configuration from the default file location and the process
    /// environment
    pub fn load() -> Result<Self> {
        let file = FileConfig::load_from_path(&resolve_config_path()?)?;
        Self::from_lookup(file, |key| std::env::var(key).ok())
    }

    /// Build a configuration from file values and a variable lookup
    pub fn from_lookup<F>(file: FileConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };

        let credentials = Credentials {
            consumer_key: env.secret("CONSUMER_KEY")?,
            consumer_secret: env.secret("CONSUMER_SECRET")?,
            access_token: env.secret("ACCESS_TOKEN")?,
            access_token_secret: env.secret("ACCESS_TOKEN_SECRET")?,
            bearer_token: env.secret("BEARER_TOKEN")?,
        };

        let accounts = AccountsConfig {
            source_user: normalize_handle(&env.required("SOURCE_USER")?),
            target_user: normalize_handle(&env.required("TARGET_USER")?),
        };

        let forwarding = ForwardingConfig {
            poll_interval: env
                .duration("POLL_INTERVAL", file.forwarding.poll_interval)?
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            post_delay: env
                .duration("POST_DELAY", file.forwarding.post_delay)?
                .unwrap_or(DEFAULT_POST_DELAY),
            batch_size: env
                .parsed("BATCH_SIZE", file.forwarding.batch_size)?
                .unwrap_or(DEFAULT_BATCH_SIZE),
            backlog: env
                .parsed("BACKLOG_POLICY", file.forwarding.backlog)?
                .unwrap_or_default(),
            attribution_prefix: env
                .optional("ATTRIBUTION_PREFIX")
                .or(file.forwarding.attribution_prefix)
                .unwrap_or_else(|| DEFAULT_ATTRIBUTION_PREFIX.to_string()),
        };

        if !BATCH_SIZE_RANGE.contains(&forwarding.batch_size) {
            return Err(ConfigError::InvalidValue {
                field: "BATCH_SIZE".to_string(),
                reason: format!(
                    "must be between {} and {} (got {})",
                    BATCH_SIZE_RANGE.start(),
                    BATCH_SIZE_RANGE.end(),
                    forwarding.batch_size
                ),
            }
            .into());
        }
        if forwarding.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "POLL_INTERVAL".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }

        let translation = TranslationConfig {
            source_lang: env
                .optional("SOURCE_LANG")
                .or(file.translation.source_lang)
                .unwrap_or_else(|| "en".to_string()),
            target_lang: env
                .optional("TARGET_LANG")
                .or(file.translation.target_lang)
                .unwrap_or_else(|| "hi".to_string()),
            api_key: env
                .optional("GOOGLE_TRANSLATE_API_KEY")
                .or(file.translation.api_key)
                .map(SecretString::from),
            max_attempts: env
                .parsed("TRANSLATE_MAX_ATTEMPTS", file.translation.max_attempts)?
                .unwrap_or(3)
                .max(1),
        };

        let cursor_path = env
            .optional("CURSOR_FILE")
            .or(file.cursor.path)
            .unwrap_or_else(|| DEFAULT_CURSOR_FILE.to_string());
        let cursor = CursorConfig {
            path: PathBuf::from(shellexpand::tilde(&cursor_path).to_string()),
        };

        Ok(Self {
            credentials,
            accounts,
            forwarding,
            translation,
            cursor,
        })
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Blank values count as unset
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingField(key.to_string()).into())
    }

    fn secret(&self, key: &str) -> Result<SecretString> {
        self.required(key).map(SecretString::from)
    }

    fn parsed<T>(&self, key: &str, fallback: Option<T>) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw.parse::<T>().map(Some).map_err(|e| {
                TranscastError::from(ConfigError::InvalidValue {
                    field: key.to_string(),
                    reason: e.to_string(),
                })
            }),
            None => Ok(fallback),
        }
    }

    fn duration(&self, key: &str, fallback: Option<String>) -> Result<Option<Duration>> {
        self.optional(key)
            .or(fallback)
            .map(|raw| {
                humantime::parse_duration(&raw).map_err(|e| {
                    TranscastError::from(ConfigError::InvalidValue {
                        field: key.to_string(),
                        reason: format!("'{}' is not a duration: {}", raw, e),
                    })
                })
            })
            .transpose()
    }
}

/// Strip a leading `@` so handles can be written either way
pub fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_string()
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("TRANSCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("transcast").join("config.toml"))
}
