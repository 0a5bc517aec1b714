//! CLI configuration: a thin wrapper around `fleetsync_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--url, --session, --timeout) on top of the shared profile logic.

use std::time::Duration;

use secrecy::SecretString;

use fleetsync_config::{ConnectionSettings, Profile};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use fleetsync_config::{Config, config_path, load_config_or_default};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.profile_name(global.profile.as_deref()).to_owned()
}

/// Build connection settings from the config file, profile and CLI flags.
///
/// Flags win over the profile. Without a matching profile, `--url` alone
/// is enough to connect with the default engine settings.
pub fn resolve_settings(global: &GlobalOpts) -> Result<ConnectionSettings, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let adhoc;
    let profile = if let Some(profile) = cfg.profiles.get(&profile_name) {
        profile
    } else if global.profile.is_some() {
        let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
        available.sort_unstable();
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: if available.is_empty() {
                "(none)".into()
            } else {
                available.join(", ")
            },
        });
    } else {
        let url = global.url.clone().ok_or_else(|| CliError::NoConfig {
            path: config_path().display().to_string(),
        })?;
        adhoc = Profile {
            url,
            cookie_name: "sessionid".into(),
            ..Profile::default()
        };
        &adhoc
    };

    let mut settings = fleetsync_config::profile_to_settings(profile, &profile_name, &cfg.defaults)?;

    if let Some(ref url) = global.url {
        settings.url = fleetsync_config::websocket_url(url)?;
    }
    if let Some(ref token) = global.session {
        settings.cookie = Some(SecretString::from(format!(
            "{}={token}",
            profile.cookie_name
        )));
    }
    if let Some(secs) = global.timeout {
        settings.engine.request_timeout = Duration::from_secs(secs);
    }

    Ok(settings)
}
