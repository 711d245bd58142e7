use std::time::Duration;

use tokio::time::timeout;
use tracing::{error, info};

use crate::storage::StoreContext;

/// 关闭超时时间（秒），覆盖 MongoDB 的 shutdown grace
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Close the store; never blocks longer than the shutdown timeout.
pub async fn shutdown(store: &StoreContext) {
    match timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), store.shutdown()).await {
        Ok(Ok(())) => info!("Storage closed"),
        Ok(Err(e)) => error!("Failed to close storage: {}", e),
        Err(_) => error!(
            "Storage shutdown timed out after {} seconds",
            SHUTDOWN_TIMEOUT_SECS
        ),
    }
}
