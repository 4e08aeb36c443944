//! Network → contract descriptor lookup.
//!
//! Higher layers only speak canonical operations; the descriptor maps each
//! one onto whatever method name the deployed contract actually uses.

use ethers::abi::{Abi, Event, Function};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokengrid_types::{Address, Network};

use crate::abi::{parse_abi, AbiError};
use crate::error::ChainError;

/// Operations every contract exposes under some concrete method name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CanonicalOperation {
    ReadContentUri,
    ReadOwner,
    ReadTotalSupply,
    WriteContentUri,
    Transfer,
    Mint,
}

impl CanonicalOperation {
    pub const ALL: [CanonicalOperation; 6] = [
        Self::ReadContentUri,
        Self::ReadOwner,
        Self::ReadTotalSupply,
        Self::WriteContentUri,
        Self::Transfer,
        Self::Mint,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == raw)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadContentUri => "readContentUri",
            Self::ReadOwner => "readOwner",
            Self::ReadTotalSupply => "readTotalSupply",
            Self::WriteContentUri => "writeContentUri",
            Self::Transfer => "transfer",
            Self::Mint => "mint",
        }
    }
}

impl fmt::Display for CanonicalOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events the incremental block scan listens for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CanonicalEvent {
    Transfer,
    ContentUriUpdated,
}

/// Canonical operation → concrete ABI name.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct OperationBindings {
    #[serde(default = "default_read_content_uri")]
    pub read_content_uri: String,
    #[serde(default = "default_read_owner")]
    pub read_owner: String,
    #[serde(default = "default_read_total_supply")]
    pub read_total_supply: String,
    #[serde(default)]
    pub write_content_uri: Option<String>,
    #[serde(default)]
    pub transfer: Option<String>,
    #[serde(default)]
    pub mint: Option<String>,
    #[serde(default = "default_transfer_event")]
    pub transfer_event: String,
    #[serde(default)]
    pub content_uri_updated_event: Option<String>,
}

fn default_read_content_uri() -> String {
    "tokenURI".to_string()
}

fn default_read_owner() -> String {
    "ownerOf".to_string()
}

fn default_read_total_supply() -> String {
    "totalSupply".to_string()
}

fn default_transfer_event() -> String {
    "Transfer".to_string()
}

impl Default for OperationBindings {
    fn default() -> Self {
        Self {
            read_content_uri: default_read_content_uri(),
            read_owner: default_read_owner(),
            read_total_supply: default_read_total_supply(),
            write_content_uri: None,
            transfer: None,
            mint: None,
            transfer_event: default_transfer_event(),
            content_uri_updated_event: None,
        }
    }
}

impl OperationBindings {
    pub fn method(&self, op: CanonicalOperation) -> Option<&str> {
        match op {
            CanonicalOperation::ReadContentUri => Some(&self.read_content_uri),
            CanonicalOperation::ReadOwner => Some(&self.read_owner),
            CanonicalOperation::ReadTotalSupply => Some(&self.read_total_supply),
            CanonicalOperation::WriteContentUri => self.write_content_uri.as_deref(),
            CanonicalOperation::Transfer => self.transfer.as_deref(),
            CanonicalOperation::Mint => self.mint.as_deref(),
        }
    }

    pub fn event(&self, event: CanonicalEvent) -> Option<&str> {
        match event {
            CanonicalEvent::Transfer => Some(&self.transfer_event),
            CanonicalEvent::ContentUriUpdated => self.content_uri_updated_event.as_deref(),
        }
    }
}

/// Everything needed to talk to one network's token contract.
#[derive(Debug)]
pub struct ContractDescriptor {
    pub network: Network,
    pub address: Address,
    pub abi: Abi,
    pub bindings: OperationBindings,
}

impl ContractDescriptor {
    /// Build a descriptor, checking that every bound name exists in the ABI.
    pub fn new(
        network: Network,
        address: Address,
        abi: Abi,
        bindings: OperationBindings,
    ) -> Result<Self, ChainError> {
        for op in CanonicalOperation::ALL {
            if let Some(name) = bindings.method(op) {
                abi.function(name).map_err(|_| {
                    ChainError::Config(format!(
                        "{network}: {op} is bound to '{name}', which is not a function in the ABI"
                    ))
                })?;
            }
        }
        for event in [CanonicalEvent::Transfer, CanonicalEvent::ContentUriUpdated] {
            if let Some(name) = bindings.event(event) {
                abi.event(name).map_err(|_| {
                    ChainError::Config(format!("{network}: event '{name}' is not declared in the ABI"))
                })?;
            }
        }
        Ok(Self {
            network,
            address,
            abi,
            bindings,
        })
    }

    pub fn function(&self, op: CanonicalOperation) -> Result<&Function, ChainError> {
        let name = self
            .bindings
            .method(op)
            .ok_or_else(|| ChainError::UnboundOperation(op.to_string()))?;
        self.abi
            .function(name)
            .map_err(|e| ChainError::Abi(AbiError::from(e)))
    }

    /// `None` when the event is optional and not bound.
    pub fn event(&self, event: CanonicalEvent) -> Result<Option<&Event>, ChainError> {
        match self.bindings.event(event) {
            Some(name) => Ok(Some(
                self.abi
                    .event(name)
                    .map_err(|e| ChainError::Abi(AbiError::from(e)))?,
            )),
            None => Ok(None),
        }
    }
}

/// Immutable after construction; shared behind an `Arc`.
#[derive(Debug, Default)]
pub struct ContractRegistry {
    contracts: HashMap<Network, Arc<ContractDescriptor>>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ContractDescriptor) -> Result<(), ChainError> {
        if self.contracts.contains_key(&descriptor.network) {
            return Err(ChainError::Config(format!(
                "network '{}' registered twice",
                descriptor.network
            )));
        }
        self.contracts
            .insert(descriptor.network.clone(), Arc::new(descriptor));
        Ok(())
    }

    pub fn resolve(&self, network: &Network) -> Result<Arc<ContractDescriptor>, ChainError> {
        self.contracts
            .get(network)
            .cloned()
            .ok_or_else(|| ChainError::UnknownContract(network.to_string()))
    }

    pub fn networks(&self) -> impl Iterator<Item = &Network> {
        self.contracts.keys()
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Load a registry TOML file. `abi_path` entries resolve relative to the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self, ChainError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ChainError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&content, base_dir)
    }

    pub fn from_toml_str(content: &str, base_dir: &Path) -> Result<Self, ChainError> {
        let config: RegistryConfig = toml::from_str(content)
            .map_err(|e| ChainError::Config(format!("invalid registry file: {e}")))?;
        let mut registry = Self::new();
        for entry in config.contracts {
            let network = Network::parse(&entry.network)
                .map_err(|e| ChainError::Config(e.message().to_string()))?;
            let address = Address::parse(&entry.address)
                .map_err(|e| ChainError::Config(format!("{network}: {}", e.message())))?;
            let abi_json = match (entry.abi, entry.abi_path) {
                (Some(inline), _) => inline,
                (None, Some(rel)) => {
                    let abi_file = base_dir.join(rel);
                    std::fs::read_to_string(&abi_file).map_err(|e| {
                        ChainError::Config(format!(
                            "{network}: failed to read ABI {}: {e}",
                            abi_file.display()
                        ))
                    })?
                }
                (None, None) => {
                    return Err(ChainError::Config(format!(
                        "{network}: either `abi` or `abi_path` is required"
                    )))
                }
            };
            let abi = parse_abi(&abi_json)?;
            registry.register(ContractDescriptor::new(
                network,
                address,
                abi,
                entry.operations,
            )?)?;
        }
        Ok(registry)
    }
}

#[derive(Debug, Deserialize)]
struct RegistryConfig {
    #[serde(default)]
    contracts: Vec<ContractEntry>,
}

#[derive(Debug, Deserialize)]
struct ContractEntry {
    network: String,
    address: String,
    #[serde(default)]
    abi_path: Option<String>,
    /// Inline ABI JSON, mostly for tests.
    #[serde(default)]
    abi: Option<String>,
    #[serde(default)]
    operations: OperationBindings,
}
