//! Embedded RocksDB backend
//!
//! Documents are stored as JSON under `{table}:{id}` in a single keyspace.
//! There is no secondary index: finds are either a direct point read or an
//! ordered prefix scan from `{table}:{opts.key}`, with the equality filter
//! applied to decoded values.
//!
//! RocksDB calls block, so every operation runs on tokio's blocking pool.
//! `close` detaches the engine handle; the database shuts down (and persists
//! its memtables) once the last in-flight operation releases it.

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use rocksdb::{Env, Options, TransactionDB, TransactionDBOptions};
use tracing::{debug, error, info, warn};

use super::{assign_id, validate_id, validate_update};
use crate::config::EmbeddedConfig;
use crate::errors::{LinkShortenerError, Result};
use crate::storage::codec;
use crate::storage::counter::MonotonicCounter;
use crate::storage::filter;
use crate::storage::query::{Filter, FindOptions, IndexSpec, Update};
use crate::storage::record::Document;
use crate::storage::{BackendKind, DocumentStore};

pub struct EmbeddedStore {
    db: ArcSwapOption<TransactionDB>,
    counter: Arc<MonotonicCounter>,
}

impl EmbeddedStore {
    pub async fn open(config: &EmbeddedConfig, counter: Arc<MonotonicCounter>) -> Result<Self> {
        let config = config.clone();
        let db = tokio::task::spawn_blocking(move || open_db(&config)).await??;
        Ok(Self {
            db: ArcSwapOption::from_pointee(db),
            counter,
        })
    }

    /// Run `f` against the engine on the blocking pool.
    async fn run<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&TransactionDB) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self
            .db
            .load_full()
            .ok_or_else(|| LinkShortenerError::storage(format!("embedded {}: store is closed", op)))?;
        let result = match tokio::task::spawn_blocking(move || f(&db)).await {
            Ok(result) => result,
            Err(join_err) => Err(join_err.into()),
        };

        if let Err(e) = &result
            && matches!(
                e,
                LinkShortenerError::Storage(_) | LinkShortenerError::Encoding(_)
            )
        {
            error!("embedded {} failed: {}", op, e);
        }
        result
    }
}

fn open_db(config: &EmbeddedConfig) -> Result<TransactionDB> {
    let mut opts = Options::default();
    opts.create_if_missing(true);

    let mut txn_db_opts = TransactionDBOptions::default();
    txn_db_opts.set_txn_lock_timeout(config.lock_timeout_ms.min(i64::MAX as u64) as i64);

    if config.in_memory {
        let env = Env::mem_env()?;
        opts.set_env(&env);
        warn!("Embedded storage running in memory, data is lost on exit");
    } else if let Some(parent) = Path::new(&config.path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let db: TransactionDB = TransactionDB::open(&opts, &txn_db_opts, &config.path)?;
    info!("Embedded storage opened at {}", config.path);
    Ok(db)
}

fn decode(raw: &[u8]) -> Result<Document> {
    serde_json::from_slice(raw).map_err(Into::into)
}

fn load(db: &TransactionDB, table: &str, id: &str) -> Result<Option<Document>> {
    db.get(codec::record_key(table, id))?
        .map(|raw| decode(&raw))
        .transpose()
}

fn require_key(opts: &FindOptions) -> Result<()> {
    if opts.key.is_empty() {
        return Err(LinkShortenerError::validation(
            "FindOptions.key is required by the embedded backend",
        ));
    }
    Ok(())
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

fn insert(
    db: &TransactionDB,
    counter: &MonotonicCounter,
    table: &str,
    mut doc: Document,
    key: &str,
    auto_key: bool,
) -> Result<String> {
    codec::validate_table(table)?;
    let id = assign_id(&mut doc, key, auto_key, counter)?;
    let value = serde_json::to_vec(&doc)?;

    let txn = db.transaction();
    txn.put(codec::record_key(table, &id), value)?;
    txn.commit()?;

    debug!("embedded insert {}:{}", table, id);
    Ok(id)
}

fn find(db: &TransactionDB, table: &str, filter: &Filter, opts: &FindOptions) -> Result<Vec<Document>> {
    codec::validate_table(table)?;
    require_key(opts)?;
    let skip = to_usize(opts.skip);
    let limit = opts.effective_limit();

    if !opts.prefix_scan {
        return Ok(load(db, table, &opts.key)?
            .filter(|doc| filter::matches(doc, filter))
            .into_iter()
            .skip(skip)
            .take(limit)
            .collect());
    }

    let prefix = codec::scan_prefix(table, &opts.key);
    let mut out = Vec::new();
    let mut skipped = 0usize;

    let mut iter = db.raw_iterator();
    iter.seek(&prefix);
    while iter.valid() && out.len() < limit {
        match iter.key() {
            Some(k) if k.starts_with(&prefix) => {}
            _ => break,
        }

        if filter.is_empty() {
            // 无过滤条件时跳过的条目不需要解码
            if skipped < skip {
                skipped += 1;
            } else if let Some(v) = iter.value() {
                out.push(decode(v)?);
            }
        } else if let Some(v) = iter.value() {
            let doc = decode(v)?;
            if filter::matches(&doc, filter) {
                if skipped < skip {
                    skipped += 1;
                } else {
                    out.push(doc);
                }
            }
        }

        iter.next();
    }
    iter.status()?;

    Ok(out)
}

fn count(db: &TransactionDB, table: &str, filter: &Filter, opts: &FindOptions) -> Result<u64> {
    codec::validate_table(table)?;
    require_key(opts)?;

    if !opts.prefix_scan {
        let key = codec::record_key(table, &opts.key);
        return Ok(match db.get(key)? {
            Some(_) if filter.is_empty() => 1,
            Some(raw) => u64::from(filter::matches(&decode(&raw)?, filter)),
            None => 0,
        });
    }

    let prefix = codec::scan_prefix(table, &opts.key);
    let mut total = 0u64;

    let mut iter = db.raw_iterator();
    iter.seek(&prefix);
    while iter.valid() {
        match iter.key() {
            Some(k) if k.starts_with(&prefix) => {}
            _ => break,
        }

        if filter.is_empty() {
            total += 1;
        } else if let Some(v) = iter.value()
            && filter::matches(&decode(v)?, filter)
        {
            total += 1;
        }

        iter.next();
    }
    iter.status()?;

    Ok(total)
}

fn update(db: &TransactionDB, table: &str, id: &str, update: &Update) -> Result<()> {
    codec::validate_table(table)?;
    validate_id(id)?;
    validate_update(update)?;

    let key = codec::record_key(table, id);
    let txn = db.transaction();

    // 独占锁，直到提交或事务被丢弃
    let raw = txn
        .get_for_update(&key, true)?
        .ok_or_else(|| LinkShortenerError::not_found(format!("{}:{} not found", table, id)))?;
    let mut doc = decode(&raw)?;

    if let Some(unknown) = update
        .assignments()
        .iter()
        .find(|a| !doc.contains_key(a.field()))
    {
        return Err(LinkShortenerError::validation(format!(
            "field '{}' does not exist in {}:{}",
            unknown.field(),
            table,
            id
        )));
    }

    for assignment in update.assignments() {
        doc.insert(assignment.field().to_string(), assignment.value().to_json());
    }

    txn.put(&key, serde_json::to_vec(&doc)?)?;
    txn.commit()?;

    debug!("embedded update {}:{}", table, id);
    Ok(())
}

#[async_trait::async_trait]
impl DocumentStore for EmbeddedStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Embedded
    }

    async fn insert_one(
        &self,
        table: &str,
        doc: Document,
        key: &str,
        auto_key: bool,
    ) -> Result<String> {
        let counter = self.counter.clone();
        let (table, key) = (table.to_string(), key.to_string());
        self.run("insert_one", move |db| {
            insert(db, &counter, &table, doc, &key, auto_key)
        })
        .await
    }

    async fn find_by_id(&self, table: &str, id: &str) -> Result<Document> {
        let (table, id) = (table.to_string(), id.to_string());
        self.run("find_by_id", move |db| {
            codec::validate_table(&table)?;
            validate_id(&id)?;
            load(db, &table, &id)?
                .ok_or_else(|| LinkShortenerError::not_found(format!("{}:{} not found", table, id)))
        })
        .await
    }

    async fn find(
        &self,
        table: &str,
        filter: &Filter,
        opts: &FindOptions,
    ) -> Result<Vec<Document>> {
        let (table, filter, opts) = (table.to_string(), filter.clone(), opts.clone());
        self.run("find", move |db| find(db, &table, &filter, &opts))
            .await
    }

    async fn update_by_id(&self, table: &str, id: &str, update_spec: &Update) -> Result<()> {
        let (table, id, update_spec) = (table.to_string(), id.to_string(), update_spec.clone());
        self.run("update_by_id", move |db| update(db, &table, &id, &update_spec))
            .await
    }

    async fn count_documents(
        &self,
        table: &str,
        filter: &Filter,
        opts: &FindOptions,
    ) -> Result<u64> {
        let (table, filter, opts) = (table.to_string(), filter.clone(), opts.clone());
        self.run("count_documents", move |db| count(db, &table, &filter, &opts))
            .await
    }

    async fn create_one_index(&self, table: &str, index: &IndexSpec) -> Result<()> {
        debug!(
            "embedded backend ignores index {:?} on {}",
            index.name, table
        );
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let Some(db) = self.db.swap(None) else {
            debug!("Embedded storage already closed");
            return Ok(());
        };
        // 进行中的操作仍持有引用时，由最后一个引用负责关闭
        if Arc::strong_count(&db) > 1 {
            warn!("Embedded storage closing with operations in flight");
        }
        tokio::task::spawn_blocking(move || drop(db)).await?;
        info!("Embedded storage closed");
        Ok(())
    }
}
