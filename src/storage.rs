//! Persisted key/value store for the session token, user and theme.
//!
//! Every value is a string, and `user` holds JSON text, so the file reads the
//! same as browser local storage would. Writes go straight to disk.

use crate::error::Result;
use crate::session::{Session, User};
use crate::theme::Theme;
use std::{collections::BTreeMap, fs, path::PathBuf};
use tracing::{debug, warn};

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";
pub const THEME_KEY: &str = "theme";

#[derive(Debug)]
pub struct ClientStorage {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl ClientStorage {
    /// Opens the store at `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = if path.exists() {
            match fs::read_to_string(&path) {
                Ok(data) => serde_json::from_str(&data).unwrap_or_else(|err| {
                    warn!(path = %path.display(), %err, "ignoring unparsable storage file");
                    BTreeMap::new()
                }),
                Err(err) => {
                    warn!(path = %path.display(), %err, "failed to read storage file");
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        Self { path, entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        self.entries.insert(key.to_string(), value.into());
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)?;
        debug!(path = %self.path.display(), keys = self.entries.len(), "storage saved");
        Ok(())
    }

    pub fn load_session(&self) -> Session {
        let token = self.get(TOKEN_KEY).map(str::to_string);
        let user = self
            .get(USER_KEY)
            .and_then(|raw| serde_json::from_str::<User>(raw).ok());
        Session::restore(token, user)
    }

    pub fn save_session(&mut self, session: &Session) -> Result<()> {
        match (session.token(), session.user()) {
            (Some(token), Some(user)) => {
                let user = serde_json::to_string(user)?;
                self.entries.insert(TOKEN_KEY.to_string(), token.to_string());
                self.entries.insert(USER_KEY.to_string(), user);
                self.save()
            }
            _ => self.clear_session(),
        }
    }

    pub fn clear_session(&mut self) -> Result<()> {
        let had_token = self.entries.remove(TOKEN_KEY).is_some();
        let had_user = self.entries.remove(USER_KEY).is_some();
        if had_token || had_user {
            self.save()?;
        }
        Ok(())
    }

    pub fn load_theme(&self) -> Theme {
        Theme::from_stored(self.get(THEME_KEY))
    }

    pub fn save_theme(&mut self, theme: Theme) -> Result<()> {
        self.set(THEME_KEY, theme.as_str())
    }
}
