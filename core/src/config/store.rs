use std::{
    io::ErrorKind,
    path::{Path, PathBuf}
};

use tokio::fs;
use tracing::{debug, error, warn};

use super::GuildConfig;
use crate::env::Env;


pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config is not valid json: {0}")]
    Format(#[from] serde_json::Error),
    #[error("invalid guild id: {0:?}")]
    InvalidGuildId(String)
}

/// One JSON document per guild under a base directory.
#[derive(Debug, Clone)]
pub struct GuildConfigStore {
    base_dir: PathBuf
}

impl GuildConfigStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into()
        }
    }

    pub fn from_env(env: &Env) -> Self {
        Self::new(env.config_dir.clone())
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// `<base>/<guild_id>/config.json`
    pub fn path(&self, guild_id: &str) -> Result<PathBuf, ConfigError> {
        // ? the id becomes a directory name, so anything that could
        // ? climb out of the base directory is refused
        let invalid = guild_id.is_empty() ||
            guild_id == "." ||
            guild_id == ".." ||
            guild_id.contains(['/', '\\', '\0']);

        if invalid {
            return Err(ConfigError::InvalidGuildId(guild_id.to_string()));
        }

        Ok(self.base_dir.join(guild_id).join(CONFIG_FILE))
    }

    /// Reads the guild's config. A missing file is `Ok(None)`, not an error.
    pub async fn get(
        &self,
        guild_id: &str
    ) -> Result<Option<GuildConfig>, ConfigError> {
        let path = self.path(guild_id)?;

        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(guild_id, "config file not found for guild");
                return Ok(None);
            }
            Err(e) => {
                error!(guild_id, path = %path.display(), error = %e,
                    "error reading config file");
                return Err(e.into());
            }
        };

        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| {
                error!(guild_id, path = %path.display(), error = %e,
                    "error parsing config file");
                e.into()
            })
    }

    /// Like [`get`](Self::get), with missing subsections filled in.
    pub async fn get_or_default(
        &self,
        guild_id: &str
    ) -> Result<Option<GuildConfig>, ConfigError> {
        Ok(self
            .get(guild_id)
            .await?
            .map(GuildConfig::with_default_structure))
    }

    /// Writes the whole document, replacing whatever was there.
    pub async fn save(
        &self,
        guild_id: &str,
        config: &GuildConfig
    ) -> Result<(), ConfigError> {
        let path = self.path(guild_id)?;

        self.write(&path, config).await.inspect_err(|e| {
            error!(guild_id, path = %path.display(), error = %e,
                "error saving config file");
        })?;

        debug!(guild_id, "saved guild config");

        Ok(())
    }

    async fn write(
        &self,
        path: &Path,
        config: &GuildConfig
    ) -> Result<(), ConfigError> {
        // ? serde_json's pretty printer indents with two spaces
        let mut body = serde_json::to_vec_pretty(config)?;
        body.push(b'\n');

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(path, body).await?;

        Ok(())
    }
}
