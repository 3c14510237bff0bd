use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use url::Url;

use crate::error::BpsError;

pub const DEFAULT_CONFIG_FILE: &str = "bps.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    pub auth_token: Option<String>,
    pub branch_id: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080/api".into(),
            auth_token: None,
            branch_id: None,
            request_timeout_secs: 30,
        }
    }
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Defaults, then the TOML file, then environment variables.
///
/// A missing default file is ignored; a missing file passed explicitly is an
/// error.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file '{}'", path.display()))?;
            apply_file(&mut settings, &raw)
                .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
        }
        None => {
            if let Ok(raw) = fs::read_to_string(DEFAULT_CONFIG_FILE) {
                apply_file(&mut settings, &raw).with_context(|| {
                    format!("failed to parse config file '{DEFAULT_CONFIG_FILE}'")
                })?;
            }
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut ClientSettings, raw: &str) -> anyhow::Result<()> {
    let table: toml::Table = toml::from_str(raw)?;

    if let Some(v) = table.get("server_url").and_then(|v| v.as_str()) {
        settings.server_url = v.to_string();
    }
    if let Some(v) = table.get("auth_token").and_then(|v| v.as_str()) {
        settings.auth_token = Some(v.to_string());
    }
    if let Some(v) = table.get("branch_id") {
        settings.branch_id = match v {
            toml::Value::String(s) => Some(s.clone()),
            toml::Value::Integer(i) => Some(i.to_string()),
            other => anyhow::bail!("branch_id must be a string or integer, got {other}"),
        };
    }
    if let Some(v) = table.get("request_timeout_secs") {
        let secs = v
            .as_integer()
            .and_then(|secs| u64::try_from(secs).ok())
            .context("request_timeout_secs must be a non-negative integer")?;
        settings.request_timeout_secs = secs;
    }

    Ok(())
}

fn apply_env(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("BPS_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = lookup("BPS_AUTH_TOKEN") {
        settings.auth_token = Some(v);
    }

    if let Some(v) = lookup("BPS_BRANCH_ID") {
        settings.branch_id = Some(v);
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }
}

/// Checks that `raw` is an absolute http(s) URL and strips trailing slashes
/// so endpoint paths can be appended with `format!`.
pub fn normalize_server_url(raw: &str) -> Result<String, BpsError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed)
        .map_err(|err| BpsError::Config(format!("server_url {raw:?} is not a valid URL: {err}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        scheme => Err(BpsError::Config(format!(
            "server_url must use http or https, got {scheme}"
        ))),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
