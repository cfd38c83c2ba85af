use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;

const SETTINGS_FILE: &str = "server.toml";

/// Longest bearer-token lifetime the server will issue: one year.
pub const MAX_TOKEN_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_seconds: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/care_connect.db".into(),
            jwt_secret: "care-connect-dev-secret".into(),
            token_ttl_seconds: 7 * 24 * 60 * 60,
        }
    }
}

/// Defaults, then `server.toml` in the working directory, then the environment.
pub fn load_settings() -> Settings {
    let file = fs::read_to_string(SETTINGS_FILE).ok();
    load_settings_from(file.as_deref(), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    file_contents: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file_contents {
        match toml::from_str::<HashMap<String, String>>(raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.get("bind_addr") {
                    settings.server_bind = v.clone();
                }
                if let Some(v) = file_cfg.get("database_url") {
                    settings.database_url = v.clone();
                }
                if let Some(v) = file_cfg.get("jwt_secret") {
                    settings.jwt_secret = v.clone();
                }
                if let Some(ttl) = file_cfg.get("token_ttl_seconds").and_then(|v| parse_ttl(v)) {
                    settings.token_ttl_seconds = ttl;
                }
            }
            Err(error) => {
                tracing::warn!(%error, file = SETTINGS_FILE, "ignoring unreadable settings file");
            }
        }
    }

    for key in ["SERVER_BIND", "APP__BIND_ADDR"] {
        if let Some(v) = env(key) {
            settings.server_bind = v;
        }
    }
    for key in ["DATABASE_URL", "APP__DATABASE_URL"] {
        if let Some(v) = env(key) {
            settings.database_url = v;
        }
    }
    for key in ["JWT_SECRET", "APP__JWT_SECRET"] {
        if let Some(v) = env(key) {
            settings.jwt_secret = v;
        }
    }
    if let Some(ttl) = env("APP__TOKEN_TTL_SECONDS").and_then(|v| parse_ttl(&v)) {
        settings.token_ttl_seconds = ttl;
    }

    settings
}

fn parse_ttl(raw: &str) -> Option<i64> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|ttl| (1..=MAX_TOKEN_TTL_SECONDS).contains(ttl))
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url)?;
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Ok(Settings::default().database_url);
    }
    if raw_database_url.starts_with("sqlite::memory:") {
        return Ok(raw_database_url.to_string());
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite://") {
        return Ok(sqlite_url_for_path(path));
    }
    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        return Ok(sqlite_url_for_path(path));
    }
    if let Some((scheme, _)) = raw_database_url.split_once("://") {
        anyhow::bail!("unsupported database scheme '{scheme}'; only sqlite is available");
    }

    Ok(sqlite_url_for_path(raw_database_url))
}

fn sqlite_url_for_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    if has_drive_prefix(&path) {
        format!("sqlite:{path}")
    } else {
        format!("sqlite://{path}")
    }
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/'
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
