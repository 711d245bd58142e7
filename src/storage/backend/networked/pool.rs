//! Named MongoDB connections
//!
//! Each connection config is parsed once when the pool is built; the client
//! itself is created on first use. Lookups read an `ArcSwap` snapshot without
//! locking, creation is serialized by a mutex so concurrent first use never
//! creates two clients for the same name.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use dashmap::DashSet;
use futures_util::future::join_all;
use mongodb::bson::{Document as BsonDocument, doc};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::NetworkedConfig;
use crate::errors::{LinkShortenerError, Result};

/// One live connection: client, default database and the collections already ensured.
pub struct DatabaseHandle {
    client: Client,
    database: Database,
    config: NetworkedConfig,
    ensured: DashSet<String>,
}

impl DatabaseHandle {
    fn new(client: Client, config: NetworkedConfig) -> Self {
        let database = client.database(&config.database);
        Self {
            client,
            database,
            config,
            ensured: DashSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn execute_timeout(&self) -> Duration {
        Duration::from_secs(self.config.execute_timeout.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.config.connect_timeout.max(1))
    }

    /// Collection handle; the collection is created on first use.
    pub async fn collection(&self, name: &str) -> Result<Collection<BsonDocument>> {
        if !self.ensured.contains(name) {
            self.ensure_collection(name).await?;
        }
        Ok(self.database.collection::<BsonDocument>(name))
    }

    async fn ensure_collection(&self, name: &str) -> Result<()> {
        let existing = self
            .database
            .list_collection_names()
            .filter(doc! { "name": name })
            .await?;

        if !existing.iter().any(|c| c == name) {
            match self.database.create_collection(name).await {
                Ok(()) => info!("Created collection {}.{}", self.config.database, name),
                // 并发创建时另一方可能已经建好（NamespaceExists = 48）
                Err(e) if is_namespace_exists(&e) => {
                    debug!("Collection {} created concurrently", name)
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.ensured.insert(name.to_string());
        Ok(())
    }
}

fn is_namespace_exists(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        mongodb::error::ErrorKind::Command(c) if c.code == 48
    )
}

pub struct ConnectionPool {
    configs: HashMap<String, (NetworkedConfig, ClientOptions)>,
    handles: ArcSwap<HashMap<String, Arc<DatabaseHandle>>>,
    create_lock: Mutex<()>,
}

impl ConnectionPool {
    /// Parse every connection config. Duplicate names are a configuration error.
    pub async fn new(configs: Vec<NetworkedConfig>) -> Result<Self> {
        let mut parsed = HashMap::with_capacity(configs.len());
        for config in configs {
            if parsed.contains_key(&config.name) {
                return Err(LinkShortenerError::configuration(format!(
                    "MongoDB connection '{}' already exists",
                    config.name
                )));
            }
            let options = client_options(&config).await?;
            parsed.insert(config.name.clone(), (config, options));
        }

        Ok(Self {
            configs: parsed,
            handles: ArcSwap::from_pointee(HashMap::new()),
            create_lock: Mutex::new(()),
        })
    }

    /// Connection named `name`, created on first call.
    pub fn get(&self, name: &str) -> Result<Arc<DatabaseHandle>> {
        if let Some(handle) = self.handles.load().get(name) {
            return Ok(handle.clone());
        }

        let _guard = self.create_lock.lock();
        let current = self.handles.load_full();
        if let Some(handle) = current.get(name) {
            return Ok(handle.clone());
        }

        let (config, options) = self.configs.get(name).ok_or_else(|| {
            LinkShortenerError::configuration(format!("unknown MongoDB connection '{}'", name))
        })?;
        let client = Client::with_options(options.clone())?;
        let handle = Arc::new(DatabaseHandle::new(client, config.clone()));

        let mut next = HashMap::clone(&current);
        next.insert(name.to_string(), handle.clone());
        self.handles.store(Arc::new(next));

        info!(
            "MongoDB connection '{}' created ({})",
            name,
            config.hosts.join(",")
        );
        Ok(handle)
    }

    /// Round-trip a `ping` command within the connect timeout.
    pub async fn ping(&self, name: &str) -> Result<()> {
        let handle = self.get(name)?;
        let timeout = handle.connect_timeout();
        match tokio::time::timeout(timeout, handle.database.run_command(doc! { "ping": 1 })).await
        {
            Ok(result) => result.map(|_| ()).map_err(Into::into),
            Err(_) => Err(LinkShortenerError::transport(format!(
                "ping '{}' timed out after {:?}",
                name, timeout
            ))),
        }
    }

    /// Disconnect every client, giving up after `grace`.
    pub async fn close(&self, grace: Duration) {
        let guard = self.create_lock.lock();
        let handles = self.handles.swap(Arc::new(HashMap::new()));
        drop(guard);

        if handles.is_empty() {
            return;
        }

        let shutdowns = handles.values().map(|h| {
            let name = h.name().to_string();
            let client = h.client.clone();
            async move {
                client.shutdown().await;
                debug!("MongoDB connection '{}' closed", name);
            }
        });

        if tokio::time::timeout(grace, join_all(shutdowns)).await.is_err() {
            warn!("MongoDB shutdown did not finish within {:?}", grace);
        } else {
            info!("All MongoDB connections closed");
        }
    }
}

/// `mongodb://[user:password@]host1,host2/database[?replicaSet=..]`
pub fn connection_uri(config: &NetworkedConfig) -> Result<String> {
    if config.hosts.is_empty() {
        return Err(LinkShortenerError::configuration(
            "database.networked.hosts cannot be empty",
        ));
    }

    let credentials = if !config.user.is_empty() && !config.password.is_empty() {
        format!(
            "{}:{}@",
            urlencoding::encode(&config.user),
            urlencoding::encode(&config.password)
        )
    } else {
        String::new()
    };

    let mut uri = format!(
        "mongodb://{}{}/{}",
        credentials,
        config.hosts.join(","),
        config.database
    );
    if let Some(rs) = config.replica_set.as_deref().filter(|rs| !rs.is_empty()) {
        uri.push_str("?replicaSet=");
        uri.push_str(&urlencoding::encode(rs));
    }
    Ok(uri)
}

async fn client_options(config: &NetworkedConfig) -> Result<ClientOptions> {
    let uri = connection_uri(config)?;
    let mut options = ClientOptions::parse(uri.as_str()).await.map_err(|e| {
        LinkShortenerError::configuration(format!(
            "invalid MongoDB connection '{}': {}",
            config.name, e
        ))
    })?;

    options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
    options.max_pool_size = Some(config.max_pool_size);
    options.min_pool_size = Some(config.min_pool_size.min(config.max_pool_size));
    options.max_idle_time = Some(Duration::from_secs(config.max_conn_idle_time * 60));
    options.connect_timeout = Some(Duration::from_secs(config.connect_timeout.max(1)));
    options.server_selection_timeout = Some(Duration::from_secs(config.connect_timeout.max(1)));
    Ok(options)
}
