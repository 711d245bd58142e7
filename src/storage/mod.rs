//! Document storage
//!
//! One [`DocumentStore`] contract with two implementations, selected once at
//! startup by [`StoreContext::from_config`]:
//! - `networked`: MongoDB, via a named connection pool
//! - `embedded`: RocksDB `TransactionDB`, documents emulated over ordered keys
//!
//! Business logic only sees typed [`Table`] handles.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, IntoEnumIterator};
use tracing::{error, info};

use crate::config::DatabaseConfig;
use crate::errors::{LinkShortenerError, Result};

pub mod backend;
pub mod codec;
pub mod counter;
pub mod filter;
pub mod models;
pub mod query;
pub mod record;

pub use backend::embedded::EmbeddedStore;
pub use backend::networked::NetworkedStore;
pub use counter::MonotonicCounter;
pub use models::{ACCESS_TABLE, AccessLog, AccessLogField, LINK_TABLE, Link, LinkField};
pub use query::{
    Assignment, FieldValue, Filter, FindOptions, IndexOrder, IndexSpec, Predicate, Update,
};
pub use record::{Document, ID_FIELD, Record, RecordField};

/// 存储后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BackendKind {
    Embedded,
    Networked,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = LinkShortenerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "embedded" | "rocksdb" | "badgerdb" => Ok(Self::Embedded),
            "networked" | "mongodb" => Ok(Self::Networked),
            _ => {
                let supported: Vec<String> = BackendKind::iter().map(|k| k.as_ref().to_string()).collect();
                Err(LinkShortenerError::configuration(format!(
                    "Unsupported database backend: '{}'. Supported: {} (aliases: rocksdb, badgerdb, mongodb)",
                    s,
                    supported.join(", ")
                )))
            }
        }
    }
}

/// Contract shared by both backends, on untyped documents.
///
/// Every operation may be called concurrently from any task.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Insert a document and return its id.
    ///
    /// With `auto_key == false`, `key` is the id and must be non-empty; the
    /// document's own `_id` must be empty or equal to `key`. With
    /// `auto_key == true`, the document's `_id` must be empty, the id is
    /// generated and `key` (possibly empty) is the parent group.
    async fn insert_one(
        &self,
        table: &str,
        doc: Document,
        key: &str,
        auto_key: bool,
    ) -> Result<String>;

    async fn find_by_id(&self, table: &str, id: &str) -> Result<Document>;

    async fn find(&self, table: &str, filter: &Filter, opts: &FindOptions)
    -> Result<Vec<Document>>;

    /// First match of [`find`](Self::find), `NotFound` when there is none.
    async fn find_one(&self, table: &str, filter: &Filter, opts: &FindOptions) -> Result<Document> {
        let opts = opts.clone().limit(1);
        self.find(table, filter, &opts)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LinkShortenerError::not_found(format!("no matching record in {}", table)))
    }

    /// Partial update. Unknown fields, `_id` and empty updates are rejected.
    async fn update_by_id(&self, table: &str, id: &str, update: &Update) -> Result<()>;

    /// Number of matches, ignoring `skip` and `limit`.
    async fn count_documents(&self, table: &str, filter: &Filter, opts: &FindOptions)
    -> Result<u64>;

    async fn create_one_index(&self, table: &str, index: &IndexSpec) -> Result<()>;

    /// Release connections or shut the embedded engine down. Closing twice
    /// is a no-op.
    async fn close(&self) -> Result<()>;
}

/// Typed handle on one table. Cheap to clone.
pub struct Table<R> {
    name: Arc<str>,
    store: Arc<dyn DocumentStore>,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for Table<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            store: self.store.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: Record> Table<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn insert_one(&self, record: &R, key: &str, auto_key: bool) -> Result<String> {
        let doc = record::to_document(record)?;
        self.store.insert_one(&self.name, doc, key, auto_key).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<R> {
        let doc = self.store.find_by_id(&self.name, id).await?;
        record::from_document(doc)
    }

    pub async fn find_one(&self, filter: &Filter<R::Field>, opts: &FindOptions) -> Result<R> {
        let doc = self.store.find_one(&self.name, &filter.erase(), opts).await?;
        record::from_document(doc)
    }

    pub async fn find(&self, filter: &Filter<R::Field>, opts: &FindOptions) -> Result<Vec<R>> {
        self.store
            .find(&self.name, &filter.erase(), opts)
            .await?
            .into_iter()
            .map(record::from_document)
            .collect()
    }

    pub async fn update_by_id(&self, id: &str, update: &Update<R::Field>) -> Result<()> {
        self.store.update_by_id(&self.name, id, &update.erase()).await
    }

    pub async fn count_documents(&self, filter: &Filter<R::Field>, opts: &FindOptions) -> Result<u64> {
        self.store
            .count_documents(&self.name, &filter.erase(), opts)
            .await
    }

    pub async fn create_one_index(&self, index: &IndexSpec<R::Field>) -> Result<()> {
        self.store.create_one_index(&self.name, &index.erase()).await
    }
}

/// Process-wide storage state: the selected backend and the shared counter.
pub struct StoreContext {
    store: Arc<dyn DocumentStore>,
    counter: Arc<MonotonicCounter>,
}

impl StoreContext {
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        let kind: BackendKind = config.backend.parse().inspect_err(|e| {
            error!("{}", e);
        })?;
        let counter = Arc::new(MonotonicCounter::new());

        let store: Arc<dyn DocumentStore> = match kind {
            BackendKind::Embedded => {
                Arc::new(EmbeddedStore::open(&config.embedded, counter.clone()).await?)
            }
            BackendKind::Networked => {
                Arc::new(NetworkedStore::connect(&config.networked, counter.clone()).await?)
            }
        };

        info!("{} storage initialized", kind.as_ref().to_uppercase());
        Ok(Self { store, counter })
    }

    pub fn new(store: Arc<dyn DocumentStore>, counter: Arc<MonotonicCounter>) -> Self {
        Self { store, counter }
    }

    /// Typed handle on `name`. Fails when the name is not a valid table name.
    pub fn table<R: Record>(&self, name: &str) -> Result<Table<R>> {
        codec::validate_table(name)?;
        Ok(Table {
            name: Arc::from(name),
            store: self.store.clone(),
            _record: PhantomData,
        })
    }

    pub fn kind(&self) -> BackendKind {
        self.store.kind()
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    pub fn counter(&self) -> Arc<MonotonicCounter> {
        self.counter.clone()
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.store.close().await
    }
}
