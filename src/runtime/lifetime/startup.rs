use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::StaticConfig;
use crate::services::LinkService;
use crate::storage::StoreContext;

pub struct StartupContext {
    pub store: Arc<StoreContext>,
    pub link_service: Arc<LinkService>,
}

/// Open the configured backend and build the services on top of it.
pub async fn prepare_startup(config: &StaticConfig) -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    let store = StoreContext::from_config(&config.database)
        .await
        .context("Failed to create storage backend")?;
    info!("Using storage backend: {}", store.kind());

    let link_service = LinkService::new(&store, &config.shorten)
        .context("Failed to initialize link service")?;
    link_service
        .init_indexes()
        .await
        .context("Failed to create indexes")?;

    debug!(
        "Pre-startup processing completed in {} ms",
        start_time.elapsed().as_millis()
    );

    Ok(StartupContext {
        store: Arc::new(store),
        link_service: Arc::new(link_service),
    })
}
