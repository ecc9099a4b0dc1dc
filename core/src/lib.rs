pub mod config;
pub mod db;

mod env;
pub use env::{DEFAULT_SCAN_PAGE_SIZE, DEFAULT_USER_TABLE, Env, env};

mod logging;
pub use logging::init_logging;

pub use config::{ConfigError, GuildConfig, GuildConfigStore};
pub use db::{
    BackendError,
    FieldValue,
    Fields,
    MemoryBackend,
    RecordBackend,
    UserRecord,
    UserStore,
    UserStoreError
};
#[cfg(feature = "mongo")]
pub use db::MongoBackend;
