//! One nullable of everything, wired into a [`SyncContext`].

use std::sync::Arc;

use tokengrid_chain::{parse_abi, ContractDescriptor, ContractRegistry, OperationBindings};
use tokengrid_sync::{
    ImagesConfig, OffchainConfig, OffchainContentManager, SyncConfig, SyncContext, SyncEngine,
};
use tokengrid_types::{Address, Network};

use crate::{NullChainClient, NullClock, NullImageIngestor, NullMetadataFetcher, NullNotifier, NullQueue, NullStore};

/// ERC-721 style ABI with the default canonical method names.
pub const TEST_ABI: &str = r#"[
    {"type":"function","name":"tokenURI","stateMutability":"view",
     "inputs":[{"name":"tokenId","type":"uint256"}],"outputs":[{"name":"","type":"string"}]},
    {"type":"function","name":"ownerOf","stateMutability":"view",
     "inputs":[{"name":"tokenId","type":"uint256"}],"outputs":[{"name":"","type":"address"}]},
    {"type":"function","name":"totalSupply","stateMutability":"view",
     "inputs":[],"outputs":[{"name":"","type":"uint256"}]},
    {"type":"function","name":"setTokenURI","stateMutability":"nonpayable",
     "inputs":[{"name":"tokenId","type":"uint256"},{"name":"uri","type":"string"}],"outputs":[]},
    {"type":"event","name":"Transfer","anonymous":false,"inputs":[
     {"name":"from","type":"address","indexed":true},
     {"name":"to","type":"address","indexed":true},
     {"name":"tokenId","type":"uint256","indexed":true}]}
]"#;

pub const TEST_CONTRACT: Address = Address::new([0x42; 20]);

pub fn test_descriptor(network: &Network, bindings: OperationBindings) -> ContractDescriptor {
    let abi = parse_abi(TEST_ABI).expect("test ABI parses");
    ContractDescriptor::new(network.clone(), TEST_CONTRACT, abi, bindings)
        .expect("test bindings resolve")
}

pub struct TestHarness {
    pub network: Network,
    pub registry: Arc<ContractRegistry>,
    pub chain: Arc<NullChainClient>,
    pub store: Arc<NullStore>,
    pub queue: Arc<NullQueue>,
    pub metadata: Arc<NullMetadataFetcher>,
    pub images: Arc<NullImageIngestor>,
    pub notifier: Arc<NullNotifier>,
    pub clock: Arc<NullClock>,
}

impl TestHarness {
    /// A `testnet` contract with the default bindings and a chain head of 100.
    pub fn new() -> Self {
        let network = Network::parse("testnet").expect("valid network");
        let bindings = OperationBindings {
            write_content_uri: Some("setTokenURI".into()),
            ..OperationBindings::default()
        };
        let mut registry = ContractRegistry::new();
        registry
            .register(test_descriptor(&network, bindings))
            .expect("fresh registry");
        Self::with_registry(network, registry)
    }

    pub fn with_registry(network: Network, registry: ContractRegistry) -> Self {
        let chain = Arc::new(NullChainClient::new());
        chain.set_head(&network, 100);
        Self {
            network,
            registry: Arc::new(registry),
            chain,
            store: Arc::new(NullStore::new()),
            queue: Arc::new(NullQueue::new()),
            metadata: Arc::new(NullMetadataFetcher::new()),
            images: Arc::new(NullImageIngestor::new()),
            notifier: Arc::new(NullNotifier::new()),
            clock: Arc::new(NullClock::default()),
        }
    }

    pub fn context(&self) -> SyncContext {
        SyncContext {
            registry: self.registry.clone(),
            chain: self.chain.clone(),
            store: self.store.clone(),
            queue: self.queue.clone(),
            metadata: self.metadata.clone(),
            images: self.images.clone(),
            notifier: self.notifier.clone(),
            clock: self.clock.clone(),
        }
    }

    pub fn images_config(&self) -> ImagesConfig {
        ImagesConfig {
            service_url: None,
            public_base_url: "https://grid.test".into(),
        }
    }

    pub fn engine(&self) -> SyncEngine {
        SyncEngine::new(self.context(), SyncConfig::default(), self.images_config())
    }

    pub fn offchain(&self) -> OffchainContentManager {
        OffchainContentManager::new(self.context(), OffchainConfig::default())
    }

    /// Script a token whose content URI serves `document`.
    pub fn mint(&self, token_id: u64, owner: Address, document: serde_json::Value) {
        let uri = format!("https://meta.test/{}/{token_id}.json", self.network);
        self.chain.set_token(&self.network, token_id, &uri, owner);
        self.metadata.set_document(&uri, document);
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
