//! MongoDB backend
//!
//! Filters and pagination map directly onto native queries. Every call runs
//! under the connection's execute timeout; a timeout or a driver panic is
//! reported as a transport error.

pub mod pool;

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{FutureExt, TryStreamExt};
use mongodb::bson::{self, Bson, Document as BsonDocument, doc};
use mongodb::options::{FindOptions as MongoFindOptions, IndexOptions};
use mongodb::{Collection, IndexModel};
use tracing::{debug, error};

use self::pool::{ConnectionPool, DatabaseHandle};
use super::{assign_id, validate_id, validate_update};
use crate::config::NetworkedConfig;
use crate::errors::{LinkShortenerError, Result};
use crate::storage::codec;
use crate::storage::counter::MonotonicCounter;
use crate::storage::query::{Filter, FindOptions, IndexSpec, Predicate, Update};
use crate::storage::record::{Document, ID_FIELD};
use crate::storage::{BackendKind, DocumentStore};

pub use self::pool::connection_uri;

pub struct NetworkedStore {
    pool: Arc<ConnectionPool>,
    connection: String,
    counter: Arc<MonotonicCounter>,
    shutdown_grace: Duration,
}

impl NetworkedStore {
    /// Build the pool for `config` and verify the server answers.
    pub async fn connect(config: &NetworkedConfig, counter: Arc<MonotonicCounter>) -> Result<Self> {
        let pool = Arc::new(ConnectionPool::new(vec![config.clone()]).await?);
        pool.ping(&config.name).await.inspect_err(|e| {
            error!("MongoDB '{}' is not reachable: {}", config.name, e);
        })?;
        Ok(Self::with_pool(pool, &config.name, counter, config.shutdown_grace_secs))
    }

    pub fn with_pool(
        pool: Arc<ConnectionPool>,
        connection: &str,
        counter: Arc<MonotonicCounter>,
        shutdown_grace_secs: u64,
    ) -> Self {
        Self {
            pool,
            connection: connection.to_string(),
            counter,
            shutdown_grace: Duration::from_secs(shutdown_grace_secs),
        }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Resolve the collection for `table` and run `f` on it within the execute timeout.
    async fn exec<T, F, Fut>(&self, op: &'static str, table: &str, f: F) -> Result<T>
    where
        F: FnOnce(Collection<BsonDocument>) -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        codec::validate_table(table)?;
        let handle: Arc<DatabaseHandle> = self.pool.get(&self.connection)?;
        let deadline = handle.execute_timeout();

        let call = async {
            let coll = handle.collection(table).await?;
            f(coll).await
        };

        let result = match tokio::time::timeout(deadline, AssertUnwindSafe(call).catch_unwind()).await
        {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(LinkShortenerError::transport(format!(
                "{} on {} panicked inside the MongoDB driver",
                op, table
            ))),
            Err(_) => Err(LinkShortenerError::transport(format!(
                "{} on {} timed out after {:?}",
                op, table, deadline
            ))),
        };

        if let Err(e) = &result
            && !matches!(
                e,
                LinkShortenerError::NotFound(_) | LinkShortenerError::Validation(_)
            )
        {
            error!("mongodb {} on {} failed: {}", op, table, e);
        }
        result
    }
}

/// JSON document to BSON.
pub fn to_bson_document(doc: &Document) -> Result<BsonDocument> {
    bson::to_document(doc).map_err(Into::into)
}

/// BSON document to JSON, using relaxed extended JSON for non-JSON types.
pub fn from_bson_document(doc: BsonDocument) -> Result<Document> {
    match Bson::Document(doc).into_relaxed_extjson() {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(LinkShortenerError::encoding(format!(
            "expected a document, got {}",
            other
        ))),
    }
}

/// `{field: value, ...}`
pub fn filter_to_bson(filter: &Filter) -> BsonDocument {
    let mut out = BsonDocument::new();
    for predicate in filter.predicates() {
        match predicate {
            Predicate::Equals(field, value) => {
                out.insert(*field, value.to_bson());
            }
        }
    }
    out
}

fn id_filter(id: &str) -> BsonDocument {
    let mut filter = BsonDocument::new();
    filter.insert(ID_FIELD, id);
    filter
}

/// Match on `_id` and require every updated field to already exist,
/// so an unknown field leaves the document untouched.
pub fn update_to_bson(id: &str, update: &Update) -> (BsonDocument, BsonDocument) {
    let mut filter = id_filter(id);
    let mut set = BsonDocument::new();
    for assignment in update.assignments() {
        filter.insert(assignment.field(), doc! { "$exists": true });
        set.insert(assignment.field(), assignment.value().to_bson());
    }
    (filter, doc! { "$set": set })
}

/// Results are ordered by `_id` so pages are stable and follow the same
/// order as an embedded prefix scan.
pub fn find_options_to_mongo(opts: &FindOptions) -> Result<MongoFindOptions> {
    let mut out = MongoFindOptions::default();
    let mut sort = BsonDocument::new();
    sort.insert(ID_FIELD, 1);
    out.sort = Some(sort);
    if opts.skip > 0 {
        out.skip = Some(opts.skip);
    }
    if opts.limit > 0 {
        out.limit = Some(i64::try_from(opts.limit).unwrap_or(i64::MAX));
    }
    out.min = opts.min.as_ref().map(to_bson_document).transpose()?;
    out.max = opts.max.as_ref().map(to_bson_document).transpose()?;
    Ok(out)
}

pub fn index_to_mongo(index: &IndexSpec) -> IndexModel {
    let mut keys = BsonDocument::new();
    for (field, order) in &index.keys {
        keys.insert(*field, order.as_i32());
    }

    let mut options = IndexOptions::default();
    options.name = index.name.clone();
    if index.unique {
        options.unique = Some(true);
    }

    let mut model = IndexModel::default();
    model.keys = keys;
    model.options = Some(options);
    model
}

#[async_trait::async_trait]
impl DocumentStore for NetworkedStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Networked
    }

    async fn insert_one(
        &self,
        table: &str,
        mut doc: Document,
        key: &str,
        auto_key: bool,
    ) -> Result<String> {
        let id = assign_id(&mut doc, key, auto_key, &self.counter)?;
        let bson_doc = to_bson_document(&doc)?;
        self.exec("insert_one", table, |coll| async move {
            coll.insert_one(bson_doc).await?;
            Ok(())
        })
        .await?;
        debug!("mongodb insert {}:{}", table, id);
        Ok(id)
    }

    async fn find_by_id(&self, table: &str, id: &str) -> Result<Document> {
        validate_id(id)?;
        let found = self
            .exec("find_by_id", table, |coll| async move {
                Ok(coll.find_one(id_filter(id)).await?)
            })
            .await?;
        match found {
            Some(doc) => from_bson_document(doc),
            None => Err(LinkShortenerError::not_found(format!(
                "{}:{} not found",
                table, id
            ))),
        }
    }

    async fn find(
        &self,
        table: &str,
        filter: &Filter,
        opts: &FindOptions,
    ) -> Result<Vec<Document>> {
        let query = filter_to_bson(filter);
        let options = find_options_to_mongo(opts)?;
        let docs: Vec<BsonDocument> = self
            .exec("find", table, |coll| async move {
                let cursor = coll.find(query).with_options(options).await?;
                Ok(cursor.try_collect().await?)
            })
            .await?;
        docs.into_iter().map(from_bson_document).collect()
    }

    async fn update_by_id(&self, table: &str, id: &str, update: &Update) -> Result<()> {
        validate_id(id)?;
        validate_update(update)?;
        let (filter, set) = update_to_bson(id, update);

        self.exec("update_by_id", table, |coll| async move {
            let result = coll.update_one(filter, set).await?;
            if result.matched_count > 0 {
                return Ok(());
            }

            // 区分记录不存在与字段不存在
            if coll.count_documents(id_filter(id)).await? > 0 {
                Err(LinkShortenerError::validation(format!(
                    "update of {}:{} names a field that does not exist",
                    table, id
                )))
            } else {
                Err(LinkShortenerError::not_found(format!(
                    "{}:{} not found",
                    table, id
                )))
            }
        })
        .await
    }

    async fn count_documents(
        &self,
        table: &str,
        filter: &Filter,
        _opts: &FindOptions,
    ) -> Result<u64> {
        let query = filter_to_bson(filter);
        self.exec("count_documents", table, |coll| async move {
            Ok(coll.count_documents(query).await?)
        })
        .await
    }

    async fn create_one_index(&self, table: &str, index: &IndexSpec) -> Result<()> {
        let model = index_to_mongo(index);
        self.exec("create_one_index", table, |coll| async move {
            coll.create_index(model).await?;
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        self.pool.close(self.shutdown_grace).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::query::{FieldValue, IndexOrder};
    use serde_json::json;

    #[test]
    fn test_filter_translation() {
        let filter = Filter::new().eq("_id", "abc").eq("delete", false).eq("expire", 0i64);
        assert_eq!(
            filter_to_bson(&filter),
            doc! { "_id": "abc", "delete": false, "expire": 0i64 }
        );
        assert!(filter_to_bson(&Filter::new()).is_empty());
    }

    #[test]
    fn test_update_translation_guards_every_field() {
        let update = Update::new().set("delete", true).set("memo", FieldValue::Null);
        let (filter, set) = update_to_bson("abc", &update);
        assert_eq!(
            filter,
            doc! { "_id": "abc", "delete": { "$exists": true }, "memo": { "$exists": true } }
        );
        assert_eq!(set, doc! { "$set": { "delete": true, "memo": Bson::Null } });
    }

    #[test]
    fn test_find_options_translation() {
        let opts = find_options_to_mongo(&FindOptions::new()).unwrap();
        assert_eq!(opts.skip, None);
        assert_eq!(opts.limit, None);
        assert_eq!(opts.sort, Some(doc! { "_id": 1 }));

        let mut min = Document::new();
        min.insert("created".into(), json!(10));
        let opts = find_options_to_mongo(&FindOptions::new().skip(5).limit(10).min(min)).unwrap();
        assert_eq!(opts.skip, Some(5));
        assert_eq!(opts.limit, Some(10));
        assert_eq!(opts.min, Some(doc! { "created": 10i64 }));
    }

    #[test]
    fn test_index_translation() {
        let spec = IndexSpec::new()
            .key("hash", IndexOrder::Asc)
            .key("created", IndexOrder::Desc)
            .name("hash_index");
        let model = index_to_mongo(&spec);
        assert_eq!(model.keys, doc! { "hash": 1, "created": -1 });
        let options = model.options.unwrap();
        assert_eq!(options.name.as_deref(), Some("hash_index"));
        assert_eq!(options.unique, None);
    }

    #[test]
    fn test_bson_json_conversion() {
        let mut doc = Document::new();
        doc.insert("_id".into(), json!("abc"));
        doc.insert("created".into(), json!(1700000000));
        doc.insert("delete".into(), json!(false));
        let bson_doc = to_bson_document(&doc).unwrap();
        assert_eq!(bson_doc.get_i64("created").unwrap(), 1700000000);
        assert_eq!(from_bson_document(bson_doc).unwrap(), doc);
    }

    #[test]
    fn test_duplicate_key_maps_to_transport_class() {
        let err = LinkShortenerError::duplicate_key("E11000 duplicate key");
        assert!(err.is_transport());
    }
}
