//! TOML-based bot configuration.
//!
//! Stores:
//! - Instance and bot account name
//! - Housekeeping cadence, timezone and rollover offset
//! - Database location
//! - Community targets and recurring post definitions
//!
//! Configuration is stored at `~/.config/featurebot/config.toml`. The
//! `INSTANCE` and `USERNAME` environment variables override `bot.*`; the
//! password is only ever read from `PASSWORD`.

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::definitions::{default_communities, default_posts, CommunityTarget, PostDefinition};
use crate::error::ConfigError;
use crate::matcher::shadowed_definitions;

/// Bot account configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    /// Instance host, e.g. `programming.dev`.
    #[serde(default)]
    pub instance: String,
    /// Account the bot posts as; only its own posts are pinned.
    #[serde(default)]
    pub username: String,
}

/// Schedule configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_housekeeping_cron")]
    pub housekeeping_cron: String,
    /// The rollover detector looks this far ahead of the wall clock.
    #[serde(default = "default_rollover_offset_minutes")]
    pub rollover_offset_minutes: i64,
    #[serde(default = "default_watch_interval_secs")]
    pub watch_interval_secs: u64,
    /// Posts fetched per community on each watch poll.
    #[serde(default = "default_watch_limit")]
    pub watch_limit: u32,
}

/// Database configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Defaults to `<data_dir>/posts.sqlite3`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/featurebot/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub communities: Vec<CommunityTarget>,
    #[serde(default)]
    pub posts: Vec<PostDefinition>,
}

/// Login details, assembled from config and environment.
#[derive(Clone)]
pub struct Credentials {
    pub instance: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("instance", &self.instance)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// Default functions
fn default_timezone() -> String {
    "America/Toronto".into()
}
fn default_housekeeping_cron() -> String {
    "0 */5 * * * *".into()
}
fn default_rollover_offset_minutes() -> i64 {
    30
}
fn default_watch_interval_secs() -> u64 {
    60
}
fn default_watch_limit() -> u32 {
    20
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            housekeeping_cron: default_housekeeping_cron(),
            rollover_offset_minutes: default_rollover_offset_minutes(),
            watch_interval_secs: default_watch_interval_secs(),
            watch_limit: default_watch_limit(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig::default(),
            schedule: ScheduleConfig::default(),
            database: DatabaseConfig::default(),
            communities: default_communities(),
            posts: default_posts(),
        }
    }
}

fn invalid(key: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.into(),
        message: message.into(),
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = match current {
                serde_json::Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                other => other.get(part)?,
            };
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let (parent_path, leaf) = match key.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, key),
        };
        if leaf.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        if let Some(parent_path) = parent_path {
            for part in parent_path.split('.') {
                current = match current {
                    serde_json::Value::Array(items) => {
                        let index = part.parse::<usize>().map_err(|_| unknown())?;
                        items.get_mut(index).ok_or_else(unknown)?
                    }
                    other => other.get_mut(part).ok_or_else(unknown)?,
                };
            }
        }

        let slot = match current {
            serde_json::Value::Array(items) => {
                let index = leaf.parse::<usize>().map_err(|_| unknown())?;
                items.get_mut(index).ok_or_else(unknown)?
            }
            serde_json::Value::Object(obj) => obj.get_mut(leaf).ok_or_else(unknown)?,
            _ => return Err(unknown()),
        };

        let parse_err = |message: String| invalid(key, message);
        let new_value = match &*slot {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|e| parse_err(e.to_string()))?,
            ),
            serde_json::Value::Number(_) => {
                if let Ok(n) = value.parse::<i64>() {
                    serde_json::Value::Number(n.into())
                } else {
                    return Err(parse_err(format!("cannot parse '{value}' as integer")));
                }
            }
            serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                serde_json::from_str(value).map_err(|e| parse_err(e.to_string()))?
            }
            _ => serde_json::Value::String(value.into()),
        };

        *slot = new_value;
        Ok(())
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if the file is missing,
    /// then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = Self::load_from(&Self::path()?)?;
        cfg.apply_overrides(|name| std::env::var(name).ok());
        Ok(cfg)
    }

    /// Load from `path` without consulting the environment.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_err = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_err(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_err(e.to_string()))
    }

    /// Apply `INSTANCE` and `USERNAME` from `lookup` over the file values.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(instance) = lookup("INSTANCE").filter(|v| !v.is_empty()) {
            self.bot.instance = instance;
        }
        if let Some(username) = lookup("USERNAME").filter(|v| !v.is_empty()) {
            self.bot.username = username;
        }
    }

    /// Gather login details; the password comes from `PASSWORD` via `lookup`.
    pub fn credentials(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Credentials, ConfigError> {
        if self.bot.instance.is_empty() {
            return Err(ConfigError::MissingKey("bot.instance (or INSTANCE)".into()));
        }
        if self.bot.username.is_empty() {
            return Err(ConfigError::MissingKey("bot.username (or USERNAME)".into()));
        }
        let password = lookup("PASSWORD")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingKey("PASSWORD".into()))?;

        Ok(Credentials {
            instance: self.bot.instance.clone(),
            username: self.bot.username.clone(),
            password,
        })
    }

    /// Get a config value as string by dot-separated key.
    /// List entries are addressed by index, e.g. `posts.0.pin_days`.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key, leaving the file untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(key, e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| invalid(key, e.to_string()))?;
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.schedule
            .timezone
            .parse::<Tz>()
            .map_err(|e| invalid("schedule.timezone", e.to_string()))
    }

    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("posts.sqlite3")),
        }
    }

    /// Check the configuration for errors; returns warnings that do not
    /// prevent the bot from running.
    ///
    /// # Errors
    ///
    /// Returns the first invalid value found.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        self.timezone()?;
        check_cron("schedule.housekeeping_cron", &self.schedule.housekeeping_cron)?;

        if !(0..=720).contains(&self.schedule.rollover_offset_minutes) {
            return Err(invalid(
                "schedule.rollover_offset_minutes",
                "must be between 0 and 720",
            ));
        }
        if self.schedule.watch_interval_secs == 0 {
            return Err(invalid("schedule.watch_interval_secs", "must be positive"));
        }

        for (i, post) in self.posts.iter().enumerate() {
            check_cron(&format!("posts.{i}.cron"), &post.cron)?;
            if post.pinnable && post.pin_check.is_empty() {
                return Err(invalid(
                    format!("posts.{i}.pin_check"),
                    "pinnable posts need a pin_check prefix",
                ));
            }
            if !self.communities.iter().any(|c| c.accepts(&post.category)) {
                return Err(invalid(
                    format!("posts.{i}.category"),
                    format!("no community accepts category '{}'", post.category),
                ));
            }
        }

        let mut warnings: Vec<String> = self
            .posts
            .iter()
            .enumerate()
            .filter(|(_, post)| post.pin_check.is_empty())
            .map(|(i, _)| format!("posts.{i} has no pin_check and never matches a post"))
            .collect();
        warnings.extend(shadowed_definitions(&self.posts).into_iter().map(|(earlier, later)| {
            format!(
                "posts.{later} (pin_check '{}') is shadowed by posts.{earlier} (pin_check '{}'); the earlier definition wins",
                self.posts[later].pin_check, self.posts[earlier].pin_check
            )
        }));
        Ok(warnings)
    }
}

fn check_cron(key: &str, expr: &str) -> Result<(), ConfigError> {
    tokio_cron_scheduler::Job::new(expr, |_uuid, _lock| {})
        .map(|_| ())
        .map_err(|e| invalid(key, format!("invalid cron expression '{expr}': {e:?}")))
}
