use crate::error::{ClientError, Result};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_API_URL: &str =
    "https://full-stack-to-do-list-backend-q7t3-i9j3khhu5.vercel.app/api";
const APP_DIR: &str = "todo_term";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_url: String,
    pub storage_path: PathBuf,
    pub log_file: PathBuf,
    pub delete_delay_ms: u64,
    pub error_display_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);
        Self {
            api_url: DEFAULT_API_URL.into(),
            storage_path: data_dir.join("storage.json"),
            log_file: data_dir.join("todo_term.log"),
            delete_delay_ms: 300,
            error_display_secs: 5,
        }
    }
}

impl Settings {
    pub fn delete_delay(&self) -> Duration {
        Duration::from_millis(self.delete_delay_ms)
    }

    pub fn error_display(&self) -> Duration {
        Duration::from_secs(self.error_display_secs)
    }
}

/// Optional keys accepted in `config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    api_url: Option<String>,
    storage_path: Option<PathBuf>,
    log_file: Option<PathBuf>,
    delete_delay_ms: Option<u64>,
    error_display_secs: Option<u64>,
}

/// Values given on the command line; they win over every other layer.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub api_url: Option<String>,
    pub storage_path: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

/// Builds settings from defaults, the TOML file, the environment and `overrides`, in that order.
pub fn load_settings(overrides: &Overrides) -> Result<Settings> {
    let env = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
    load_settings_with(overrides, env, default_config_path())
}

/// `fallback_config` is read only when no explicit path was given and the file exists.
fn load_settings_with(
    overrides: &Overrides,
    env: impl Fn(&str) -> Option<String>,
    fallback_config: Option<PathBuf>,
) -> Result<Settings> {
    let mut settings = Settings::default();

    if let Some(path) = &overrides.config_path {
        apply_file(&mut settings, path)?;
    } else if let Some(path) = fallback_config.filter(|p| p.exists()) {
        apply_file(&mut settings, &path)?;
    }

    if let Some(v) = env("TODO_TERM_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = env("TODO_TERM_STORAGE") {
        settings.storage_path = PathBuf::from(v);
    }

    if let Some(v) = &overrides.api_url {
        settings.api_url = v.clone();
    }
    if let Some(v) = &overrides.storage_path {
        settings.storage_path = v.clone();
    }
    if let Some(v) = &overrides.log_file {
        settings.log_file = v.clone();
    }

    settings.api_url = normalize_api_url(&settings.api_url)?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, path: &Path) -> Result<()> {
    let raw = fs::read_to_string(path)?;
    let file: FileSettings = toml::from_str(&raw)
        .map_err(|err| ClientError::Config(format!("{}: {err}", path.display())))?;
    if let Some(v) = file.api_url {
        settings.api_url = v;
    }
    if let Some(v) = file.storage_path {
        settings.storage_path = v;
    }
    if let Some(v) = file.log_file {
        settings.log_file = v;
    }
    if let Some(v) = file.delete_delay_ms {
        settings.delete_delay_ms = v;
    }
    if let Some(v) = file.error_display_secs {
        settings.error_display_secs = v;
    }
    Ok(())
}

fn normalize_api_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ClientError::Config(format!(
            "api url `{raw}` must start with http:// or https://"
        )));
    }
    Ok(trimmed.to_string())
}
