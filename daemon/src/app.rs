//! Process wiring: opens storage and builds the shared context every
//! command runs against.

use std::sync::Arc;

use anyhow::Context;
use tokengrid_chain::{ContractRegistry, JsonRpcChainClient};
use tokengrid_queue::LmdbQueue;
use tokengrid_store_lmdb::{check_data_dir, LmdbEnvironment};
use tokengrid_sync::{
    HttpImageIngestor, HttpMetadataFetcher, LogNotifier, Notifier, OffchainContentManager,
    SyncContext, SyncEngine, WebhookNotifier,
};
use tokengrid_types::{Clock, SystemClock};
use tokengrid_worker::{WorkerLoop, WorkerMetrics};

use crate::config::DaemonConfig;

const STORE_MAX_DBS: u32 = 16;
const STORE_MAP_SIZE: usize = 1 << 30;

pub fn open_store(config: &DaemonConfig) -> anyhow::Result<LmdbEnvironment> {
    let path = config.store_dir();
    check_data_dir(&path).map_err(anyhow::Error::msg)?;
    std::fs::create_dir_all(&path)
        .with_context(|| format!("creating store directory {}", path.display()))?;
    LmdbEnvironment::open(&path, STORE_MAX_DBS, STORE_MAP_SIZE)
        .with_context(|| format!("opening store at {}", path.display()))
}

pub fn open_queue(config: &DaemonConfig, clock: Arc<dyn Clock>) -> anyhow::Result<LmdbQueue> {
    let path = config.queue_dir();
    std::fs::create_dir_all(&path)
        .with_context(|| format!("creating queue directory {}", path.display()))?;
    LmdbQueue::open(&path, config.queue.clone(), clock)
        .with_context(|| format!("opening queue at {}", path.display()))
}

pub fn load_registry(config: &DaemonConfig) -> anyhow::Result<ContractRegistry> {
    let registry = ContractRegistry::load(&config.registry_path)
        .with_context(|| format!("loading registry {}", config.registry_path.display()))?;
    for network in registry.networks() {
        if !config.networks.contains_key(network) {
            tracing::warn!(%network, "contract registered without a [networks] endpoint");
        }
    }
    Ok(registry)
}

/// Everything a running process holds: the shared context plus the storage
/// environment that must outlive it.
pub struct App {
    pub config: DaemonConfig,
    pub ctx: SyncContext,
    pub metrics: Arc<WorkerMetrics>,
    _store_env: LmdbEnvironment,
}

impl App {
    pub fn build(config: DaemonConfig) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store_env = open_store(&config)?;
        let queue = open_queue(&config, clock.clone())?;
        let registry = load_registry(&config)?;

        let notifier: Arc<dyn Notifier> = match &config.alert_webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url.clone())?),
            None => {
                tracing::info!("no alert_webhook_url configured, alerts are logged only");
                Arc::new(LogNotifier)
            }
        };

        let ctx = SyncContext {
            registry: Arc::new(registry),
            chain: Arc::new(JsonRpcChainClient::new(config.endpoints())?),
            store: Arc::new(store_env.store()),
            queue: Arc::new(queue),
            metadata: Arc::new(HttpMetadataFetcher::new(&config.sync)?),
            images: Arc::new(HttpImageIngestor::new(config.images.service_url.clone())?),
            notifier,
            clock,
        };

        Ok(Self {
            config,
            ctx,
            metrics: Arc::new(WorkerMetrics::new()),
            _store_env: store_env,
        })
    }

    pub fn engine(&self) -> Arc<SyncEngine> {
        Arc::new(SyncEngine::new(
            self.ctx.clone(),
            self.config.sync.clone(),
            self.config.images.clone(),
        ))
    }

    pub fn offchain(&self) -> Arc<OffchainContentManager> {
        Arc::new(OffchainContentManager::new(
            self.ctx.clone(),
            self.config.offchain.clone(),
        ))
    }

    pub fn worker(&self) -> WorkerLoop {
        WorkerLoop::new(
            self.ctx.queue.clone(),
            self.engine(),
            self.offchain(),
            self.ctx.notifier.clone(),
            self.metrics.clone(),
            self.config.queue.clone(),
        )
    }
}
