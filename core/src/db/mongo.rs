use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mongodb::{Client, Collection};
use mongodb::error::Error as MongoError;
use opentelemetry::{
    global,
    trace::{FutureExt, Tracer}
};

use super::{
    BackendError,
    FieldValue,
    Fields,
    KEY_ATTRIBUTE,
    Page,
    RecordBackend,
    UserRecord,
    UserStore
};
use crate::env::Env;


const MONGO_KEY: &str = "_id";

impl From<MongoError> for BackendError {
    fn from(error: MongoError) -> Self {
        BackendError::Driver(Box::new(error))
    }
}

/// User table as a mongo collection, the discord id stored as `_id`.
#[derive(Debug, Clone)]
pub struct MongoBackend {
    collection: Collection<Document>
}

impl MongoBackend {
    pub fn new(collection: Collection<Document>) -> Self {
        Self { collection }
    }

    /// Connects to `MONGO_URL` and opens the `USER_TABLE` collection.
    pub async fn connect(env: &Env, ping: bool) -> Result<Self, BackendError> {
        let tracer = global::tracer("");

        let collection = tracer
            .in_span("initializing mongo", |cx| {
                async {
                    let database = Client::with_uri_str(&env.mongo_url)
                        .await?
                        .database(&env.mongo_database);

                    // ? creating the client doesn't actually connect,
                    // ? so ping when the caller wants to fail fast
                    if ping {
                        database.run_command(doc! {"ping": 1}).await?;
                    }

                    Ok::<Collection<Document>, MongoError>(
                        database.collection(&env.user_table)
                    )
                }
                .with_context(cx)
            })
            .await?;

        Ok(Self::new(collection))
    }
}

impl UserStore<MongoBackend> {
    /// Store over the configured collection, paged by `SCAN_PAGE_SIZE`.
    pub async fn connect(env: &Env, ping: bool) -> Result<Self, BackendError> {
        Ok(UserStore::new(MongoBackend::connect(env, ping).await?)
            .with_page_size(env.scan_page_size))
    }
}

fn key_filter(key: &str) -> Document {
    let mut filter = Document::new();
    filter.insert(MONGO_KEY, key);
    filter
}

fn to_bson(value: &FieldValue) -> Bson {
    match value {
        FieldValue::Null => Bson::Null,
        FieldValue::Bool(b) => Bson::Boolean(*b),
        FieldValue::Int(i) => Bson::Int64(*i),
        FieldValue::Float(f) => Bson::Double(*f),
        FieldValue::String(s) => Bson::String(s.clone()),
        FieldValue::List(items) => Bson::Array(items.iter().map(to_bson).collect()),
        FieldValue::Map(fields) => Bson::Document(to_document(fields))
    }
}

fn to_document(fields: &Fields) -> Document {
    fields
        .iter()
        .map(|(name, value)| (name.clone(), to_bson(value)))
        .collect()
}

fn from_bson(value: Bson) -> Result<FieldValue, BackendError> {
    Ok(match value {
        Bson::Null | Bson::Undefined => FieldValue::Null,
        Bson::Boolean(b) => FieldValue::Bool(b),
        Bson::Int32(i) => FieldValue::Int(i.into()),
        Bson::Int64(i) => FieldValue::Int(i),
        Bson::Double(f) => FieldValue::Float(f),
        Bson::String(s) => FieldValue::String(s),
        Bson::ObjectId(oid) => FieldValue::String(oid.to_hex()),
        Bson::DateTime(ts) => FieldValue::Int(ts.timestamp_millis()),
        Bson::Array(items) => FieldValue::List(
            items
                .into_iter()
                .map(from_bson)
                .collect::<Result<_, _>>()?
        ),
        Bson::Document(document) => FieldValue::Map(from_document(document)?),
        other => {
            return Err(BackendError::Decode(format!(
                "unsupported bson type {:?}",
                other.element_type()
            )));
        }
    })
}

fn from_document(document: Document) -> Result<Fields, BackendError> {
    document
        .into_iter()
        .map(|(name, value)| Ok((name, from_bson(value)?)))
        .collect()
}

fn record_from_document(mut document: Document) -> Result<UserRecord, BackendError> {
    let key = match document.remove(MONGO_KEY) {
        Some(Bson::String(key)) => key,
        Some(other) => {
            return Err(BackendError::Decode(format!(
                "record key is not a string: {other}"
            )));
        }
        None => {
            return Err(BackendError::Decode("record has no key".to_string()));
        }
    };

    // ? older documents may carry the key twice
    document.remove(KEY_ATTRIBUTE);

    Ok(UserRecord::with_fields(key, from_document(document)?))
}

#[async_trait]
impl RecordBackend for MongoBackend {
    async fn get_item(&self, key: &str) -> Result<Option<UserRecord>, BackendError> {
        self.collection
            .find_one(key_filter(key))
            .await?
            .map(record_from_document)
            .transpose()
    }

    async fn put_item(&self, record: &UserRecord) -> Result<(), BackendError> {
        let mut replacement = to_document(record.fields());
        replacement.insert(MONGO_KEY, record.discord_id());

        self.collection
            .replace_one(key_filter(record.discord_id()), replacement)
            .upsert(true)
            .await?;

        Ok(())
    }

    async fn set_fields(&self, key: &str, fields: &Fields) -> Result<(), BackendError> {
        let mut update = Document::new();
        update.insert("$set", to_document(fields));

        self.collection
            .update_one(key_filter(key), update)
            .upsert(true)
            .await?;

        Ok(())
    }

    async fn increment(&self, key: &str, field: &str, by: i64) -> Result<(), BackendError> {
        // ? $inc on a missing field starts from 0, server side
        let mut inc = Document::new();
        inc.insert(field, by);

        let mut update = Document::new();
        update.insert("$inc", inc);

        self.collection
            .update_one(key_filter(key), update)
            .upsert(true)
            .await?;

        Ok(())
    }

    async fn scan(&self, cursor: Option<&str>, limit: usize) -> Result<Page, BackendError> {
        let filter = match cursor {
            Some(cursor) => {
                let mut after = Document::new();
                after.insert("$gt", cursor);

                let mut filter = Document::new();
                filter.insert(MONGO_KEY, after);
                filter
            }
            None => Document::new()
        };

        let mut sort = Document::new();
        sort.insert(MONGO_KEY, 1);

        let documents: Vec<Document> = self
            .collection
            .find(filter)
            .sort(sort)
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await?
            .try_collect()
            .await?;

        let items = documents
            .into_iter()
            .map(record_from_document)
            .collect::<Result<Vec<_>, _>>()?;

        // ? a full page may or may not be the last one, the next scan
        // ? will come back empty in that case
        let next = if items.len() == limit {
            items.last().map(|record| record.discord_id().to_string())
        } else {
            None
        };

        Ok(Page { items, next })
    }
}
