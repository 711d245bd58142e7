//! Conformance suite shared by the backend integration tests.
//!
//! Every function takes an opened [`StoreContext`] and asserts behavior both
//! backends must agree on. Backend-specific expectations branch on
//! [`StoreContext::kind`].

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use linkshortener::config::{DatabaseConfig, EmbeddedConfig, NetworkedConfig};
use linkshortener::errors::LinkShortenerError;
use linkshortener::storage::codec::group_key;
use linkshortener::storage::{
    BackendKind, Filter, FindOptions, IndexOrder, IndexSpec, Record, StoreContext, Table, Update,
};

pub const MONGO_HOSTS_ENV: &str = "LS_TEST_MONGO_HOSTS";

const GROUP: &str = "g";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub group: String,
    pub n: i64,
    pub tag: String,
    pub active: bool,
}

impl Record for Item {
    type Field = &'static str;
}

pub fn item(n: i64) -> Item {
    Item {
        id: String::new(),
        group: GROUP.to_string(),
        n,
        tag: if n % 3 == 0 { "fizz" } else { "plain" }.to_string(),
        active: n % 2 == 0,
    }
}

pub struct TestEnv {
    pub ctx: StoreContext,
    _dir: Option<TempDir>,
}

/// Embedded store in a fresh temporary directory.
pub async fn open_embedded() -> Option<TestEnv> {
    let dir = TempDir::new().expect("temp dir");
    let config = DatabaseConfig {
        backend: "embedded".to_string(),
        embedded: EmbeddedConfig {
            path: dir.path().join("db").to_string_lossy().into_owned(),
            in_memory: false,
            lock_timeout_ms: 5000,
        },
        ..DatabaseConfig::default()
    };
    let ctx = StoreContext::from_config(&config)
        .await
        .expect("open embedded store");
    Some(TestEnv {
        ctx,
        _dir: Some(dir),
    })
}

/// Networked store, only when a MongoDB is configured through the environment.
pub async fn open_networked() -> Option<TestEnv> {
    let hosts = std::env::var(MONGO_HOSTS_ENV).ok()?;
    let hosts: Vec<String> = hosts
        .split(',')
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .collect();
    if hosts.is_empty() {
        return None;
    }

    let config = DatabaseConfig {
        backend: "networked".to_string(),
        networked: NetworkedConfig {
            hosts,
            database: "linkshortener_test".to_string(),
            shutdown_grace_secs: 5,
            ..NetworkedConfig::default()
        },
        ..DatabaseConfig::default()
    };
    let ctx = StoreContext::from_config(&config)
        .await
        .expect("connect networked store");
    Some(TestEnv { ctx, _dir: None })
}

/// Table name unique per call, so networked runs never see earlier data.
pub fn unique_table(base: &str) -> String {
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default();
    format!("{}_{:x}", base, nanos)
}

fn items(ctx: &StoreContext, base: &str) -> Table<Item> {
    ctx.table(&unique_table(base)).expect("table")
}

fn group_scan() -> FindOptions {
    FindOptions::by_prefix(group_key(GROUP))
}

async fn seed(table: &Table<Item>, count: i64) -> Vec<String> {
    let mut ids = Vec::new();
    for n in 0..count {
        ids.push(table.insert_one(&item(n), GROUP, true).await.expect("insert"));
    }
    ids
}

// =============================================================================
// Cases
// =============================================================================

pub async fn direct_insert_round_trip(ctx: &StoreContext) {
    let table = items(ctx, "round_trip");
    for (key, n) in [("k1", 1), ("k2", 2), ("with-dash", 3)] {
        let mut record = item(n);
        record.id = key.to_string();

        let id = table.insert_one(&record, key, false).await.unwrap();
        assert_eq!(id, key);
        assert_eq!(table.find_by_id(key).await.unwrap(), record);
    }

    // `_id` left empty is filled in with the key
    let id = table.insert_one(&item(4), "k4", false).await.unwrap();
    assert_eq!(table.find_by_id(&id).await.unwrap().id, "k4");
}

pub async fn auto_key_insert(ctx: &StoreContext) {
    let table = items(ctx, "auto_key");
    for n in 0..5 {
        let record = item(n);
        let id = table.insert_one(&record, GROUP, true).await.unwrap();

        assert!(id.starts_with(&group_key(GROUP)), "{} lacks parent", id);
        for value in [&record.group, &record.tag, &record.n.to_string()] {
            assert_ne!(&id, value);
        }

        let found = table.find_by_id(&id).await.unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.n, n);
    }

    // 没有父键时 id 只由时间戳与计数器组成
    let id = table.insert_one(&item(9), "", true).await.unwrap();
    assert!(!id.starts_with(':'));
    table.find_by_id(&id).await.unwrap();
}

pub async fn insert_preconditions(ctx: &StoreContext) {
    let table = items(ctx, "preconditions");

    let mut with_id = item(1);
    with_id.id = "preset".to_string();
    let err = table.insert_one(&with_id, GROUP, true).await.unwrap_err();
    assert!(matches!(err, LinkShortenerError::Validation(_)), "{:?}", err);

    let err = table.insert_one(&item(1), "", false).await.unwrap_err();
    assert!(matches!(err, LinkShortenerError::Validation(_)), "{:?}", err);

    let err = table.insert_one(&with_id, "other", false).await.unwrap_err();
    assert!(matches!(err, LinkShortenerError::Validation(_)), "{:?}", err);

    assert!(ctx.table::<Item>("bad:name").is_err());
    assert!(ctx.table::<Item>("").is_err());
}

pub async fn missing_records(ctx: &StoreContext) {
    let table = items(ctx, "missing");
    seed(&table, 2).await;

    let err = table.find_by_id("nope").await.unwrap_err();
    assert!(err.is_not_found(), "{:?}", err);

    let err = table
        .find_one(&Filter::new().eq("tag", "absent"), &group_scan())
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "{:?}", err);

    let err = table
        .update_by_id("nope", &Update::new().set("n", 1i64))
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "{:?}", err);
}

pub async fn count_matches_unbounded_find(ctx: &StoreContext) {
    let table = items(ctx, "count");
    seed(&table, 12).await;

    let filters = [
        Filter::new(),
        Filter::new().eq("tag", "fizz"),
        Filter::new().eq("active", true),
        Filter::new().eq("tag", "fizz").eq("active", false),
        Filter::new().eq("tag", "absent"),
    ];
    for filter in &filters {
        let found = table.find(filter, &group_scan()).await.unwrap();
        let counted = table.count_documents(filter, &group_scan()).await.unwrap();
        assert_eq!(counted, found.len() as u64, "filter {:?}", filter);
    }

    // skip/limit do not change the count
    let counted = table
        .count_documents(&Filter::new(), &group_scan().skip(5).limit(2))
        .await
        .unwrap();
    assert_eq!(counted, 12);
}

pub async fn pagination_is_contiguous(ctx: &StoreContext) {
    let table = items(ctx, "pages");
    seed(&table, 10).await;

    for filter in [Filter::new(), Filter::new().eq("active", true)] {
        for skip in 0..12u64 {
            for limit in 1..5u64 {
                let page = table
                    .find(&filter, &group_scan().skip(skip).limit(limit))
                    .await
                    .unwrap();
                let prefix = table
                    .find(&filter, &group_scan().limit(skip + limit))
                    .await
                    .unwrap();
                let start = (skip as usize).min(prefix.len());
                assert_eq!(page, prefix[start..].to_vec(), "skip {} limit {}", skip, limit);
            }
        }
    }

    // limit 0 is unbounded
    let all = table.find(&Filter::new(), &group_scan()).await.unwrap();
    assert_eq!(all.len(), 10);
    let ns: Vec<i64> = all.iter().map(|i| i.n).collect();
    assert_eq!(ns, (0..10).collect::<Vec<_>>());
}

pub async fn update_semantics(ctx: &StoreContext) {
    let table = items(ctx, "update");
    let mut record = item(1);
    record.id = "u1".to_string();
    table.insert_one(&record, "u1", false).await.unwrap();

    let err = table
        .update_by_id("u1", &Update::new().set("n", 99i64).set("missing", 1i64))
        .await
        .unwrap_err();
    assert!(matches!(err, LinkShortenerError::Validation(_)), "{:?}", err);
    assert_eq!(table.find_by_id("u1").await.unwrap(), record);

    let err = table
        .update_by_id("u1", &Update::new().set("_id", "u2"))
        .await
        .unwrap_err();
    assert!(matches!(err, LinkShortenerError::Validation(_)), "{:?}", err);

    let err = table.update_by_id("u1", &Update::new()).await.unwrap_err();
    assert!(matches!(err, LinkShortenerError::Validation(_)), "{:?}", err);

    table
        .update_by_id("u1", &Update::new().set("tag", "changed").set("active", true))
        .await
        .unwrap();
    let updated = table.find_by_id("u1").await.unwrap();
    assert_eq!(
        updated,
        Item {
            tag: "changed".to_string(),
            active: true,
            ..record
        }
    );
}

pub async fn duplicate_direct_insert(ctx: &StoreContext) {
    let table = items(ctx, "links");
    let mut first = item(1);
    first.id = "A1".to_string();
    let mut second = item(2);
    second.id = "A1".to_string();

    table.insert_one(&first, "A1", false).await.unwrap();
    let result = table.insert_one(&second, "A1", false).await;

    match ctx.kind() {
        // 嵌入式后端不检查主键唯一，第二次写入覆盖第一次
        BackendKind::Embedded => {
            assert_eq!(result.unwrap(), "A1");
            assert_eq!(table.find_by_id("A1").await.unwrap(), second);
        }
        BackendKind::Networked => {
            let err = result.unwrap_err();
            assert!(matches!(err, LinkShortenerError::DuplicateKey(_)), "{:?}", err);
            assert!(err.is_transport());
            assert_eq!(table.find_by_id("A1").await.unwrap(), first);
        }
    }
}

pub async fn concurrent_auto_key_inserts(ctx: &StoreContext) {
    let table = items(ctx, "concurrent_insert");
    let handles: Vec<_> = (0..32)
        .map(|n| {
            let table = table.clone();
            tokio::spawn(async move { table.insert_one(&item(n), GROUP, true).await })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        let id = handle.await.unwrap().unwrap();
        assert!(ids.insert(id));
    }
    let counted = table
        .count_documents(&Filter::new(), &group_scan())
        .await
        .unwrap();
    assert_eq!(counted, 32);
}

pub async fn concurrent_updates(ctx: &StoreContext) {
    let table = Arc::new(items(ctx, "concurrent_update"));
    let mut record = item(0);
    record.id = "c".to_string();
    table.insert_one(&record, "c", false).await.unwrap();

    let handles: Vec<_> = (1..=16i64)
        .map(|n| {
            let table = table.clone();
            tokio::spawn(async move { table.update_by_id("c", &Update::new().set("n", n)).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = table.find_by_id("c").await.unwrap();
    assert!((1..=16).contains(&stored.n));
    assert_eq!(stored.tag, record.tag);
}

pub async fn index_creation(ctx: &StoreContext) {
    let table = items(ctx, "index");
    let spec = IndexSpec::new()
        .key("group", IndexOrder::Asc)
        .key("n", IndexOrder::Desc)
        .name("group_n");
    table.create_one_index(&spec).await.unwrap();
    // 重复创建同一个索引不是错误
    table.create_one_index(&spec).await.unwrap();
}
