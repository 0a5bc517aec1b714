//! Shared configuration for fleetsync consumers.
//!
//! TOML profiles, session credential resolution (env + keyring +
//! plaintext), and translation to a [`ConnectionSettings`] carrying the
//! websocket endpoint and a `fleetsync_core::EngineConfig`. The core
//! crate never reads files; consumers load a profile here and hand the
//! result in.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use fleetsync_core::EngineConfig;

/// Keyring service name. Entries are stored as `<profile>/session`.
pub const KEYRING_SERVICE: &str = "fleetsync";

/// Prefix for environment overrides (`FLEETSYNC_DEFAULTS__TIMEOUT=10`).
pub const ENV_PREFIX: &str = "FLEETSYNC_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' is not defined in {path}")]
    UnknownProfile { profile: String, path: String },

    #[error("no session credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named service profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Keep-alive cadence (`"50s"`, `"2m"`). `"off"` or `"0s"` disables it.
    #[serde(default = "default_ping_interval")]
    pub ping_interval: String,

    #[serde(default = "default_optimistic")]
    pub optimistic: bool,

    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
            ping_interval: default_ping_interval(),
            optimistic: default_optimistic(),
            page_size: default_page_size(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_ping_interval() -> String {
    "50s".into()
}
fn default_optimistic() -> bool {
    true
}
fn default_page_size() -> usize {
    50
}

/// A named service profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Service endpoint. `http(s)://` is rewritten to `ws(s)://`.
    pub url: String,

    /// Session token (plaintext; prefer keyring or env var).
    pub session: Option<String>,

    /// Environment variable name containing the session token.
    pub session_env: Option<String>,

    /// Cookie the session token is sent under.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Fail instead of connecting anonymously when no token resolves.
    #[serde(default)]
    pub require_session: bool,

    /// Override request timeout (seconds).
    pub timeout: Option<u64>,

    /// Override keep-alive cadence.
    pub ping_interval: Option<String>,

    /// Override optimistic updates.
    pub optimistic: Option<bool>,

    /// Override default page size.
    pub page_size: Option<usize>,
}

fn default_cookie_name() -> String {
    "sessionid".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "fleetsync", "fleetsync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("fleetsync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment.
///
/// A missing file is not an error; defaults and environment still apply.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Profile selection ───────────────────────────────────────────────

impl Config {
    /// Name of the profile to use: the explicit one, else
    /// `default_profile`, else `"default"`.
    pub fn profile_name<'a>(&'a self, explicit: Option<&'a str>) -> &'a str {
        explicit
            .or(self.default_profile.as_deref())
            .unwrap_or("default")
    }

    /// Look up a profile by name.
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
                path: config_path().display().to_string(),
            })
    }
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve a session token from the credential chain.
///
/// Order: the profile's `session_env` variable, the system keyring,
/// then the plaintext `session` field. `Ok(None)` means "connect
/// anonymously"; `require_session` turns that into an error.
pub fn resolve_session(
    profile: &Profile,
    profile_name: &str,
) -> Result<Option<SecretString>, ConfigError> {
    // 1. Profile's session_env → env var lookup
    if let Some(ref env_name) = profile.session_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(Some(SecretString::from(val)));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/session")) {
        if let Ok(secret) = entry.get_password() {
            return Ok(Some(SecretString::from(secret)));
        }
    }

    // 3. Plaintext in config
    if let Some(ref token) = profile.session {
        return Ok(Some(SecretString::from(token.clone())));
    }

    if profile.require_session {
        return Err(ConfigError::NoCredentials {
            profile: profile_name.into(),
        });
    }
    Ok(None)
}

/// Store a session token in the system keyring for `profile_name`.
pub fn store_session(profile_name: &str, token: &SecretString) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/session"))
        .and_then(|entry| entry.set_password(token.expose_secret()))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

// ── Translation to runtime settings ─────────────────────────────────

/// Everything a consumer needs to open a transport and start an engine.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub profile: String,
    /// Websocket endpoint.
    pub url: Url,
    /// Full `Cookie` header value, when a session resolved.
    pub cookie: Option<SecretString>,
    pub engine: EngineConfig,
}

/// Build [`ConnectionSettings`] from a profile layered over `defaults`.
pub fn profile_to_settings(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ConnectionSettings, ConfigError> {
    let url = websocket_url(&profile.url)?;

    let cookie = resolve_session(profile, profile_name)?.map(|token| {
        SecretString::from(format!("{}={}", profile.cookie_name, token.expose_secret()))
    });

    let ping = profile
        .ping_interval
        .as_deref()
        .unwrap_or(&defaults.ping_interval);

    let engine = EngineConfig {
        request_timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        ping_interval: parse_interval(ping)?,
        optimistic_updates: profile.optimistic.unwrap_or(defaults.optimistic),
        default_page_size: positive_page_size(profile.page_size.unwrap_or(defaults.page_size))?,
    };

    Ok(ConnectionSettings {
        profile: profile_name.into(),
        url,
        cookie,
        engine,
    })
}

/// Parse an endpoint, mapping `http`/`https` onto `ws`/`wss`.
pub fn websocket_url(raw: &str) -> Result<Url, ConfigError> {
    let mut url: Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {raw}"),
    })?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ConfigError::Validation {
                field: "url".into(),
                reason: format!("expected http, https, ws or wss, got '{other}'"),
            });
        }
    };
    if url.scheme() != scheme && url.set_scheme(scheme).is_err() {
        return Err(ConfigError::Validation {
            field: "url".into(),
            reason: format!("cannot use {raw} as a websocket endpoint"),
        });
    }
    Ok(url)
}

/// `"off"` and zero durations disable the interval.
pub fn parse_interval(raw: &str) -> Result<Option<Duration>, ConfigError> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("off") {
        return Ok(None);
    }
    let interval = humantime::parse_duration(raw).map_err(|e| ConfigError::Validation {
        field: "ping_interval".into(),
        reason: e.to_string(),
    })?;
    Ok((!interval.is_zero()).then_some(interval))
}

fn positive_page_size(size: usize) -> Result<usize, ConfigError> {
    if size == 0 {
        return Err(ConfigError::Validation {
            field: "page_size".into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(size)
}
