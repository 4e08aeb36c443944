use std::sync::Arc;

use tokengrid_chain::{ChainClient, ContractRegistry};
use tokengrid_queue::WorkQueue;
use tokengrid_store::Store;
use tokengrid_types::Clock;

use crate::{ImageIngestor, MetadataFetcher, Notifier};

/// Process-scoped collaborators, built once at startup and shared by every
/// component.
#[derive(Clone)]
pub struct SyncContext {
    pub registry: Arc<ContractRegistry>,
    pub chain: Arc<dyn ChainClient>,
    pub store: Arc<dyn Store>,
    pub queue: Arc<dyn WorkQueue>,
    pub metadata: Arc<dyn MetadataFetcher>,
    pub images: Arc<dyn ImageIngestor>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}
