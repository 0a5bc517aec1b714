//! Config subcommand handlers.

use std::fmt::Write as _;

use secrecy::SecretString;
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sessions.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "ping_interval = \"{}\"", cfg.defaults.ping_interval);
    let _ = writeln!(out, "optimistic = {}", cfg.defaults.optimistic);
    let _ = writeln!(out, "page_size = {}", cfg.defaults.page_size);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let Some(p) = cfg.profiles.get(name) else {
            continue;
        };
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "url = \"{}\"", p.url);
        if p.session.is_some() {
            let _ = writeln!(out, "session = \"****\"");
        }
        if let Some(ref env) = p.session_env {
            let _ = writeln!(out, "session_env = \"{env}\"");
        }
        let _ = writeln!(out, "cookie_name = \"{}\"", p.cookie_name);
        if p.require_session {
            let _ = writeln!(out, "require_session = true");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(ref ping) = p.ping_interval {
            let _ = writeln!(out, "ping_interval = \"{ping}\"");
        }
        if let Some(optimistic) = p.optimistic {
            let _ = writeln!(out, "optimistic = {optimistic}");
        }
        if let Some(size) = p.page_size {
            let _ = writeln!(out, "page_size = {size}");
        }
    }

    out
}

#[derive(Serialize)]
struct ProfileInfo {
    name: String,
    url: String,
    default: bool,
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "URL")]
    url: String,
}

impl From<&ProfileInfo> for ProfileRow {
    fn from(p: &ProfileInfo) -> Self {
        Self {
            marker: if p.default { "*" } else { "" },
            name: p.name.clone(),
            url: p.url.clone(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            output::print_output(format_config_redacted(&cfg).trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = config::active_profile_name(global, &cfg);
            let mut profiles: Vec<ProfileInfo> = cfg
                .profiles
                .iter()
                .map(|(name, p)| ProfileInfo {
                    name: name.clone(),
                    url: p.url.clone(),
                    default: *name == default,
                })
                .collect();
            profiles.sort_by(|a, b| a.name.cmp(&b.name));

            let out = output::render_list(&global.output, &profiles, |p| ProfileRow::from(p), |p| {
                p.name.clone()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::SetSession { token } => {
            let cfg = config::load_config_or_default();
            let profile = config::active_profile_name(global, &cfg);
            let token = match token {
                Some(t) => t,
                None => dialoguer::Password::new()
                    .with_prompt(format!("Session token for '{profile}'"))
                    .interact()
                    .map_err(|e| CliError::Validation {
                        field: "interactive".into(),
                        reason: format!("prompt failed: {e}"),
                    })?,
            };
            if token.is_empty() {
                return Err(CliError::Validation {
                    field: "token".into(),
                    reason: "cannot be empty".into(),
                });
            }

            fleetsync_config::store_session(&profile, &SecretString::from(token))?;
            output::print_note(&format!("Session stored in keyring for '{profile}'"), global.quiet);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use fleetsync_config::Profile;

    use super::*;

    #[test]
    fn redacted_config_masks_sessions() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "lab".into(),
            Profile {
                url: "wss://lab/ws".into(),
                session: Some("plaintext-secret".into()),
                cookie_name: "sessionid".into(),
                ..Profile::default()
            },
        );

        let shown = format_config_redacted(&cfg);
        assert!(shown.contains("[profiles.lab]"));
        assert!(shown.contains("session = \"****\""));
        assert!(!shown.contains("plaintext-secret"));
    }
}
