use async_trait::async_trait;
use tracing::info;

/// Lifecycle signals the reconciler sends to the runtime hosting it.
#[async_trait]
pub trait WorkerHost: Send + Sync {
    /// Activate this worker now instead of waiting for older instances to
    /// release their clients. Open pages are not reloaded.
    async fn skip_waiting(&self);

    /// Start controlling every open client session immediately.
    async fn claim_clients(&self);
}

/// Host with no runtime behind it; signals are only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHost;

#[async_trait]
impl WorkerHost for LoggingHost {
    async fn skip_waiting(&self) {
        info!("skipWaiting requested");
    }

    async fn claim_clients(&self) {
        info!("Claiming clients");
    }
}
