use futures::{Stream, TryStreamExt, stream};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{BackendError, FieldValue, Fields, RecordBackend};
use crate::env::DEFAULT_SCAN_PAGE_SIZE;


/// Key attribute every user record is stored under.
pub const KEY_ATTRIBUTE: &str = "DiscordId";
pub const MESSAGE_LEADER_WINS: &str = "messageLeaderWins";

// ? `_id` is what the key attribute becomes on mongo
const RESERVED_FIELDS: [&str; 2] = [KEY_ATTRIBUTE, "_id"];

fn is_reserved(name: &str) -> bool {
    RESERVED_FIELDS.contains(&name)
}

// ? mongo reads dots as paths and `$` as operators, so such names would
// ? not land as the top level attribute they spell
fn check_names(fields: &Fields) -> Result<(), UserStoreError> {
    match fields
        .keys()
        .find(|name| name.is_empty() || name.contains('.') || name.starts_with('$'))
    {
        Some(name) => Err(UserStoreError::InvalidFieldName(name.clone())),
        None => Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UserStoreError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("field {0:?} is reserved for the record key")]
    ReservedField(String),
    #[error("field name {0:?} must be non-empty without '.' or a leading '$'")]
    InvalidFieldName(String),
    #[error("messageLeaderWins must be an integer, got {0:?}")]
    InvalidCounter(FieldValue)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "DiscordId")]
    discord_id: String,
    #[serde(flatten)]
    fields:     Fields
}

impl UserRecord {
    pub fn new(discord_id: impl Into<String>) -> Self {
        Self {
            discord_id: discord_id.into(),
            fields:     Fields::new()
        }
    }

    /// Builds a record, dropping any field that would shadow the key.
    pub fn with_fields(discord_id: impl Into<String>, fields: Fields) -> Self {
        let mut record = Self::new(discord_id);

        for (name, value) in fields {
            record.insert(name, value);
        }

        record
    }

    pub fn discord_id(&self) -> &str {
        &self.discord_id
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn into_fields(self) -> Fields {
        self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Sets a field. Reserved key names are ignored and return `None`.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<FieldValue>
    ) -> Option<FieldValue> {
        let name = name.into();

        if is_reserved(&name) {
            return None;
        }

        self.fields.insert(name, value.into())
    }

    /// Wins so far, 0 if the counter was never incremented.
    pub fn message_leader_wins(&self) -> i64 {
        self.get(MESSAGE_LEADER_WINS)
            .and_then(FieldValue::as_i64)
            .unwrap_or(0)
    }
}

fn check_counter(fields: &Fields) -> Result<(), UserStoreError> {
    match fields.get(MESSAGE_LEADER_WINS) {
        Some(value) if value.as_i64().is_none() => {
            Err(UserStoreError::InvalidCounter(value.clone()))
        }
        _ => Ok(())
    }
}

/// User records in a key-value table, keyed by discord id.
///
/// The backend handle is created once by the caller and shared by every
/// operation; the store itself holds no other state.
#[derive(Debug, Clone)]
pub struct UserStore<B> {
    backend:   B,
    page_size: usize
}

impl<B: RecordBackend> UserStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            page_size: DEFAULT_SCAN_PAGE_SIZE
        }
    }

    /// Records requested per scan call in [`list_all`](Self::list_all).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Point lookup. A missing record is `Ok(None)`; backend failures are
    /// errors, never `None`.
    pub async fn get(&self, user_id: &str) -> Result<Option<UserRecord>, UserStoreError> {
        self.backend.get_item(user_id).await.map_err(|e| {
            error!(user_id, error = %e, "error getting user data");
            e.into()
        })
    }

    /// Replaces the whole record with `fields` plus the key.
    pub async fn save(&self, user_id: &str, fields: &Fields) -> Result<(), UserStoreError> {
        check_names(fields)?;
        check_counter(fields)?;

        let record = UserRecord::with_fields(user_id, fields.clone());

        if record.fields.len() != fields.len() {
            debug!(user_id, "dropped reserved fields from saved record");
        }

        self.backend.put_item(&record).await.map_err(|e| {
            error!(user_id, error = %e, "error saving user data");
            e.into()
        })
    }

    /// Sets only the named fields, leaving the rest of the record as is.
    pub async fn update(&self, user_id: &str, fields: &Fields) -> Result<(), UserStoreError> {
        if let Some(name) = fields.keys().find(|name| is_reserved(name)) {
            return Err(UserStoreError::ReservedField(name.clone()));
        }

        check_names(fields)?;
        check_counter(fields)?;

        if fields.is_empty() {
            return Ok(());
        }

        self.backend.set_fields(user_id, fields).await.map_err(|e| {
            error!(user_id, error = %e, "error updating user data");
            e.into()
        })
    }

    /// Adds one to `messageLeaderWins`, starting from 0. Uses the backend's
    /// atomic increment, so concurrent callers never lose a win.
    pub async fn increment_message_leader_wins(
        &self,
        user_id: &str
    ) -> Result<(), UserStoreError> {
        self.backend
            .increment(user_id, MESSAGE_LEADER_WINS, 1)
            .await
            .map_err(|e| {
                error!(user_id, error = %e, "error incrementing message leader wins");
                e.into()
            })
    }

    /// Every record in the table, following the scan cursor until the
    /// backend runs out of pages. Holds the whole table in memory.
    pub async fn list_all(&self) -> Result<Vec<UserRecord>, UserStoreError> {
        self.stream_all().try_collect().await
    }

    /// Lazy form of [`list_all`](Self::list_all), fetching one page at a
    /// time as the stream is polled.
    pub fn stream_all(
        &self
    ) -> impl Stream<Item = Result<UserRecord, UserStoreError>> + Send + '_ {
        // ? outer None = done, Some(None) = first page
        stream::try_unfold(Some(None::<String>), move |state| async move {
            let Some(cursor) = state else {
                return Ok(None);
            };

            let page = match self
                .backend
                .scan(cursor.as_deref(), self.page_size)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    error!(error = %e, "error listing user data");
                    return Err(UserStoreError::from(e));
                }
            };

            debug!(records = page.items.len(), more = page.next.is_some(),
                "scanned user page");

            // ? handing back the same cursor would page forever
            if page.next.is_some() && page.next == cursor {
                error!(cursor = ?cursor, "scan cursor did not advance");
                return Err(UserStoreError::from(BackendError::StalledCursor(
                    cursor.unwrap_or_default()
                )));
            }

            let items = stream::iter(
                page.items.into_iter().map(Ok::<_, UserStoreError>)
            );

            Ok(Some((items, page.next.map(Some))))
        })
        .try_flatten()
    }
}
