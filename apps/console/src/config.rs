use std::{collections::BTreeMap, fs, path::Path, time::Duration};

use anyhow::Context;
use client_core::HOME_LAYER;

pub const CONFIG_FILE: &str = "console.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server_url: String,
    pub stream_path: String,
    pub reconnect_delay_ms: u64,
    pub home_layer: String,
    pub log_filter: String,
    pub preferences: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".into(),
            stream_path: "/stream".into(),
            reconnect_delay_ms: 3000,
            home_layer: HOME_LAYER.into(),
            log_filter: "info".into(),
            preferences: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new(CONFIG_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid config file '{}'", path.display()))?;
    }

    if let Some(v) = env("CONSOLE_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("APP__SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("APP__STREAM_PATH") {
        settings.stream_path = v;
    }
    if let Some(v) = env("APP__RECONNECT_DELAY_MS") {
        settings.reconnect_delay_ms = v
            .parse()
            .with_context(|| format!("APP__RECONNECT_DELAY_MS is not a number: '{v}'"))?;
    }
    if let Some(v) = env("APP__HOME_LAYER") {
        settings.home_layer = v;
    }
    if let Some(v) = env("APP__LOG_FILTER") {
        settings.log_filter = v;
    }

    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let table: toml::Table = toml::from_str(raw)?;

    if let Some(v) = string_value(&table, "server_url")? {
        settings.server_url = v;
    }
    if let Some(v) = string_value(&table, "stream_path")? {
        settings.stream_path = v;
    }
    if let Some(v) = table.get("reconnect_delay_ms") {
        let ms = v
            .as_integer()
            .and_then(|ms| u64::try_from(ms).ok())
            .context("reconnect_delay_ms must be a non-negative integer")?;
        settings.reconnect_delay_ms = ms;
    }
    if let Some(v) = string_value(&table, "home_layer")? {
        settings.home_layer = v;
    }
    if let Some(v) = string_value(&table, "log_filter")? {
        settings.log_filter = v;
    }
    if let Some(preferences) = table.get("preferences") {
        let preferences = preferences
            .as_table()
            .context("[preferences] must be a table")?;
        for (key, value) in preferences {
            let value = match value {
                toml::Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            settings.preferences.insert(key.clone(), value);
        }
    }

    Ok(())
}

fn string_value(table: &toml::Table, key: &str) -> anyhow::Result<Option<String>> {
    match table.get(key) {
        None => Ok(None),
        Some(toml::Value::String(v)) => Ok(Some(v.clone())),
        Some(other) => anyhow::bail!("{key} must be a string, found {}", other.type_str()),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
