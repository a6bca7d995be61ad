use std::{fs, time::Duration};

use anyhow::{bail, Context};
use serde::Deserialize;
use url::Url;

pub const CONFIG_FILE: &str = "catalog.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:3000".into(),
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
}

/// Defaults, then `catalog.toml` in the working directory, then the
/// environment, then the `--api-url` flag.
pub fn load_settings(api_url_flag: Option<&str>) -> anyhow::Result<Settings> {
    let file = fs::read_to_string(CONFIG_FILE).ok();
    let settings = resolve_settings(file.as_deref(), |key| std::env::var(key).ok(), api_url_flag)?;
    Ok(settings)
}

pub(crate) fn resolve_settings(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
    api_url_flag: Option<&str>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        let file_cfg: FileSettings =
            toml::from_str(raw).with_context(|| format!("invalid {CONFIG_FILE}"))?;
        if let Some(v) = file_cfg.api_base_url {
            settings.api_base_url = v;
        }
        if let Some(v) = file_cfg.request_timeout_secs {
            settings.request_timeout_secs = v;
        }
    }

    if let Some(v) = env("CATALOG_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }

    if let Some(v) = api_url_flag {
        settings.api_base_url = v.to_string();
    }

    settings.api_base_url = normalize_api_base_url(&settings.api_base_url)?;
    Ok(settings)
}

pub(crate) fn normalize_api_base_url(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).with_context(|| format!("invalid api base url '{raw}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("api base url must be http or https, got '{raw}'");
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
