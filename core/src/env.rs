use std::{env::var, path::PathBuf, sync::OnceLock};


static ENV: OnceLock<Env> = OnceLock::new();

pub const DEFAULT_USER_TABLE: &str = "DiscordAccounts";
pub const DEFAULT_SCAN_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct Env {
    pub mongo_url:      String,
    pub mongo_database: String,
    pub user_table:     String,
    pub config_dir:     PathBuf,
    pub scan_page_size: usize
}

impl Default for Env {
    fn default() -> Self {
        // ? a missing .env file is the normal case in prod
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| var(key).ok())
    }
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an [`Env`] from an arbitrary variable lookup, falling back to
    /// the defaults for anything unset or unparsable.
    pub fn from_lookup<F>(lookup: F) -> Self
    where F: Fn(&str) -> Option<String> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            mongo_url: non_empty("MONGO_URL")
                .unwrap_or("mongodb://localhost:27017".to_string()),
            mongo_database: non_empty("MONGO_DATABASE")
                .unwrap_or("streakbot".to_string()),
            user_table: non_empty("USER_TABLE")
                .unwrap_or(DEFAULT_USER_TABLE.to_string()),
            config_dir: non_empty("CONFIG_DIR")
                .map(PathBuf::from)
                .unwrap_or(PathBuf::from("databases")),
            scan_page_size: non_empty("SCAN_PAGE_SIZE")
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|size| *size > 0)
                .unwrap_or(DEFAULT_SCAN_PAGE_SIZE)
        }
    }
}

pub fn env() -> &'static Env {
    ENV.get_or_init(Env::new)
}
