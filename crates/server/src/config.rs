use std::fs;

use serde::Deserialize;

const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:5001".into(),
            database_url: "sqlite://./data/calendars.db".into(),
            max_body_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    database_url: Option<String>,
    max_body_bytes: Option<usize>,
}

pub fn load_settings() -> Settings {
    let raw = fs::read_to_string(SETTINGS_FILE).ok();
    settings_from_sources(raw.as_deref(), |key| std::env::var(key).ok())
}

/// Layers `server.toml` over the defaults, then the environment over both.
pub(crate) fn settings_from_sources(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        match toml::from_str::<FileSettings>(raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.bind_addr {
                    settings.server_bind = v;
                }
                if let Some(v) = file_cfg.database_url {
                    settings.database_url = v;
                }
                if let Some(v) = file_cfg.max_body_bytes {
                    settings.max_body_bytes = v;
                }
            }
            Err(error) => {
                tracing::warn!(%error, file = SETTINGS_FILE, "ignoring unreadable settings file");
            }
        }
    }

    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = env("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = env("APP__MAX_BODY_BYTES") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.max_body_bytes = parsed;
        }
    }

    settings
}

/// Turns a bare path or `sqlite:path` into a `sqlite://` URL. The database
/// directory itself is created when the store opens it.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
