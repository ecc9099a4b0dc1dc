use std::{collections::BTreeMap, ops::Bound};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{BackendError, FieldValue, Fields, Page, RecordBackend, UserRecord};


/// Process-local table, ordered by key. Every operation runs under one
/// lock, which makes [`increment`](RecordBackend::increment) atomic.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    table: Mutex<BTreeMap<String, Fields>>
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }
}

#[async_trait]
impl RecordBackend for MemoryBackend {
    async fn get_item(&self, key: &str) -> Result<Option<UserRecord>, BackendError> {
        Ok(self
            .table
            .lock()
            .get(key)
            .map(|fields| UserRecord::with_fields(key, fields.clone())))
    }

    async fn put_item(&self, record: &UserRecord) -> Result<(), BackendError> {
        self.table
            .lock()
            .insert(record.discord_id().to_string(), record.fields().clone());

        Ok(())
    }

    async fn set_fields(&self, key: &str, fields: &Fields) -> Result<(), BackendError> {
        let mut table = self.table.lock();
        let existing = table.entry(key.to_string()).or_default();

        for (name, value) in fields {
            existing.insert(name.clone(), value.clone());
        }

        Ok(())
    }

    async fn increment(&self, key: &str, field: &str, by: i64) -> Result<(), BackendError> {
        let mut table = self.table.lock();

        let current = match table.get(key).and_then(|fields| fields.get(field)) {
            None => 0,
            Some(FieldValue::Int(i)) => *i,
            Some(other) => {
                return Err(BackendError::Rejected(format!(
                    "cannot increment non-integer {field}: {other:?}"
                )));
            }
        };

        let next = current.checked_add(by).ok_or_else(|| {
            BackendError::Rejected(format!("{field} would overflow"))
        })?;

        table
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), FieldValue::Int(next));

        Ok(())
    }

    async fn scan(&self, cursor: Option<&str>, limit: usize) -> Result<Page, BackendError> {
        let table = self.table.lock();

        let start = match cursor {
            Some(cursor) => Bound::Excluded(cursor),
            None => Bound::Unbounded
        };

        let mut remaining = table.range::<str, _>((start, Bound::Unbounded));

        let items: Vec<UserRecord> = remaining
            .by_ref()
            .take(limit)
            .map(|(key, fields)| UserRecord::with_fields(key.clone(), fields.clone()))
            .collect();

        // ? only hand out a cursor when something is actually left
        let next = match remaining.next() {
            Some(_) => items.last().map(|record| record.discord_id().to_string()),
            None => None
        };

        Ok(Page { items, next })
    }
}
