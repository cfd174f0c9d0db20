use anyhow::{Context, Result, anyhow};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::model::action::ActionType;

/// Config file name inside a data directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable overriding the default data directory.
pub const HOME_ENV: &str = "IR_HOME";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// IANA zone whose calendar decides "today" for deadlines.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub deadlines: DeadlineConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            deadlines: DeadlineConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Config {
    /// Parsed [`Config::timezone`].
    ///
    /// # Errors
    ///
    /// Returns an error if the zone name is not a known IANA zone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|err| anyhow!("invalid timezone '{}': {err}", self.timezone))
    }
}

/// Statutory periods in calendar days, per action type.
///
/// Affirmation, reversion, and appeal expiration close the conversation and
/// have no period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineConfig {
    #[serde(default = "default_fifteen")]
    pub request: u32,
    #[serde(default = "default_fifteen")]
    pub clarification_response: u32,
    #[serde(default = "default_fifteen")]
    pub confirmation: u32,
    #[serde(default = "default_extension")]
    pub extension: u32,
    #[serde(default = "default_fifteen")]
    pub advancement: u32,
    #[serde(default = "default_clarification_request")]
    pub clarification_request: u32,
    #[serde(default = "default_fifteen")]
    pub disclosure: u32,
    #[serde(default = "default_fifteen")]
    pub refusal: u32,
    #[serde(default = "default_fifteen")]
    pub appeal: u32,
    #[serde(default = "default_fifteen")]
    pub remandment: u32,
    #[serde(default = "default_fifteen")]
    pub advanced_request: u32,
    #[serde(default = "default_fifteen")]
    pub expiration: u32,
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            request: default_fifteen(),
            clarification_response: default_fifteen(),
            confirmation: default_fifteen(),
            extension: default_extension(),
            advancement: default_fifteen(),
            clarification_request: default_clarification_request(),
            disclosure: default_fifteen(),
            refusal: default_fifteen(),
            appeal: default_fifteen(),
            remandment: default_fifteen(),
            advanced_request: default_fifteen(),
            expiration: default_fifteen(),
        }
    }
}

impl DeadlineConfig {
    /// Configured period for `action_type`, or `None` when the type has no
    /// deadline.
    #[must_use]
    pub const fn days_for(&self, action_type: ActionType) -> Option<u32> {
        match action_type {
            ActionType::Request => Some(self.request),
            ActionType::ClarificationResponse => Some(self.clarification_response),
            ActionType::Confirmation => Some(self.confirmation),
            ActionType::Extension => Some(self.extension),
            ActionType::Advancement => Some(self.advancement),
            ActionType::ClarificationRequest => Some(self.clarification_request),
            ActionType::Disclosure => Some(self.disclosure),
            ActionType::Refusal => Some(self.refusal),
            ActionType::Appeal => Some(self.appeal),
            ActionType::Remandment => Some(self.remandment),
            ActionType::AdvancedRequest => Some(self.advanced_request),
            ActionType::Expiration => Some(self.expiration),
            ActionType::Affirmation | ActionType::Reversion | ActionType::AppealExpiration => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How long `expire` waits for another sweep to release its lock.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lock_timeout_secs: default_lock_timeout_secs(),
        }
    }
}

/// Load `<data_dir>/config.toml`, falling back to defaults when absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(data_dir: &Path) -> Result<Config> {
    let path = data_dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<Config>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Render the default config, for `init` to write out.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_default_config() -> Result<String> {
    toml::to_string_pretty(&Config::default()).context("serialize default config")
}

/// Pick the data directory: explicit flag, then `IR_HOME`, then the
/// platform data directory.
///
/// # Errors
///
/// Returns an error if no candidate is available.
pub fn resolve_data_dir(cli_data_dir: Option<&Path>) -> Result<PathBuf> {
    resolve_data_dir_from(
        cli_data_dir,
        env::var_os(HOME_ENV).map(PathBuf::from),
        dirs::data_dir(),
    )
}

fn resolve_data_dir_from(
    cli_data_dir: Option<&Path>,
    env_home: Option<PathBuf>,
    platform_dir: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(dir) = cli_data_dir {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = env_home.filter(|dir| !dir.as_os_str().is_empty()) {
        return Ok(dir);
    }
    platform_dir
        .map(|dir| dir.join("inforequests"))
        .ok_or_else(|| anyhow!("no data directory: pass --data-dir or set {HOME_ENV}"))
}

fn default_timezone() -> String {
    "Europe/Prague".to_string()
}

const fn default_fifteen() -> u32 {
    15
}

const fn default_extension() -> u32 {
    10
}

const fn default_clarification_request() -> u32 {
    30
}

const fn default_lock_timeout_secs() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_uses_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cfg = load_config(dir.path()).expect("load should succeed");
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.deadlines.days_for(ActionType::Request), Some(15));
        assert_eq!(cfg.deadlines.days_for(ActionType::Extension), Some(10));
        assert_eq!(
            cfg.deadlines.days_for(ActionType::ClarificationRequest),
            Some(30)
        );
        assert_eq!(cfg.deadlines.days_for(ActionType::Affirmation), None);
        assert_eq!(cfg.scheduler.lock_timeout_secs, 5);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "timezone = \"UTC\"\n\n[deadlines]\nrequest = 8\n",
        )
        .expect("write config");

        let cfg = load_config(dir.path()).expect("load should succeed");
        assert_eq!(cfg.timezone, "UTC");
        assert_eq!(cfg.deadlines.request, 8);
        assert_eq!(cfg.deadlines.appeal, 15);
        assert_eq!(cfg.tz().expect("valid zone"), chrono_tz::UTC);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join(CONFIG_FILE), "[deadlines\n").expect("write config");
        let err = load_config(dir.path()).unwrap_err();
        assert_eq!(
            crate::error::classify(&err),
            crate::error::ErrorCode::ConfigParseError
        );
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let cfg = Config {
            timezone: "Mars/Olympus".to_string(),
            ..Config::default()
        };
        assert!(cfg.tz().is_err());
    }

    #[test]
    fn default_config_renders_and_parses_back() {
        let rendered = render_default_config().expect("render");
        let parsed: Config = toml::from_str(&rendered).expect("parse");
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn data_dir_precedence() {
        let flag = PathBuf::from("/tmp/flag");
        let env_home = PathBuf::from("/tmp/env");
        let platform = PathBuf::from("/tmp/platform");

        assert_eq!(
            resolve_data_dir_from(Some(&flag), Some(env_home.clone()), Some(platform.clone()))
                .expect("resolve"),
            flag
        );
        assert_eq!(
            resolve_data_dir_from(None, Some(env_home.clone()), Some(platform.clone()))
                .expect("resolve"),
            env_home
        );
        assert_eq!(
            resolve_data_dir_from(None, None, Some(platform.clone())).expect("resolve"),
            platform.join("inforequests")
        );
        assert!(resolve_data_dir_from(None, None, None).is_err());
    }
}
