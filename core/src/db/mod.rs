mod memory;
#[cfg(feature = "mongo")]
mod mongo;
mod user;
mod value;

use async_trait::async_trait;

pub use memory::MemoryBackend;
#[cfg(feature = "mongo")]
pub use mongo::MongoBackend;
pub use user::{
    KEY_ATTRIBUTE,
    MESSAGE_LEADER_WINS,
    UserRecord,
    UserStore,
    UserStoreError
};
pub use value::{FieldValue, Fields};


#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Driver(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("backend rejected request: {0}")]
    Rejected(String),
    #[error("stored record could not be decoded: {0}")]
    Decode(String),
    #[error("scan returned the cursor it was given: {0:?}")]
    StalledCursor(String)
}

/// One page of a table scan. `next` is the continuation cursor, `None`
/// once the table is exhausted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<UserRecord>,
    pub next:  Option<String>
}

/// The key-value table behind [`UserStore`].
///
/// Implementations only move records; identifier merging, reserved field
/// checks, logging and the pagination loop live in the store.
#[async_trait]
pub trait RecordBackend: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<UserRecord>, BackendError>;

    /// Replaces the whole record, creating it if needed.
    async fn put_item(&self, record: &UserRecord) -> Result<(), BackendError>;

    /// Sets only the given attributes, creating the record if needed.
    async fn set_fields(&self, key: &str, fields: &Fields) -> Result<(), BackendError>;

    /// Atomically adds `by` to an integer attribute, treating a missing
    /// record or attribute as 0.
    async fn increment(&self, key: &str, field: &str, by: i64) -> Result<(), BackendError>;

    /// Returns up to `limit` records ordered after `cursor`.
    async fn scan(&self, cursor: Option<&str>, limit: usize) -> Result<Page, BackendError>;
}
