//! Nullable chain client: scripted node state.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Log, H256, U64};
use tokengrid_chain::abi::{from_eth_address, to_eth_address};
use tokengrid_chain::{
    encode_call, CanonicalEvent, CanonicalOperation, ChainClient, ChainError, ContractDescriptor,
    Token, TxParams,
};
use tokengrid_crypto::{keccak256, keccak256_multi};
use tokengrid_types::{Address, BlockNumber, Network, TokenId, TxHash};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmittedTx {
    pub network: Network,
    /// Raw ABI method the canonical operation resolved to.
    pub method: String,
    pub calldata: Vec<u8>,
    pub nonce: u64,
    pub signer: Address,
}

#[derive(Default)]
struct ChainState {
    heads: HashMap<Network, BlockNumber>,
    supplies: HashMap<Network, u64>,
    tokens: HashMap<(Network, TokenId), (String, Address)>,
    logs: HashMap<(Network, CanonicalEvent), Vec<Log>>,
    failing: HashSet<(Network, TokenId)>,
    calls: Vec<String>,
    submitted: Vec<SubmittedTx>,
}

/// Answers reads from scripted per-network state and records every raw
/// method name it was asked to call.
#[derive(Default)]
pub struct NullChainClient {
    state: Mutex<ChainState>,
}

impl NullChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_head(&self, network: &Network, head: BlockNumber) {
        self.state.lock().unwrap().heads.insert(network.clone(), head);
    }

    /// Override the reported total supply; defaults to the number of
    /// scripted tokens.
    pub fn set_total_supply(&self, network: &Network, supply: u64) {
        self.state
            .lock()
            .unwrap()
            .supplies
            .insert(network.clone(), supply);
    }

    pub fn set_token(&self, network: &Network, token_id: TokenId, content_uri: &str, owner: Address) {
        self.state
            .lock()
            .unwrap()
            .tokens
            .insert((network.clone(), token_id), (content_uri.to_string(), owner));
    }

    /// Every read of this token reverts.
    pub fn fail_token(&self, network: &Network, token_id: TokenId) {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert((network.clone(), token_id));
    }

    pub fn push_log(&self, network: &Network, event: CanonicalEvent, log: Log) {
        self.state
            .lock()
            .unwrap()
            .logs
            .entry((network.clone(), event))
            .or_default()
            .push(log);
    }

    /// Raw ABI method names called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn submitted(&self) -> Vec<SubmittedTx> {
        self.state.lock().unwrap().submitted.clone()
    }

    fn record_call(
        &self,
        contract: &ContractDescriptor,
        operation: CanonicalOperation,
    ) -> Result<(), ChainError> {
        let function = contract.function(operation)?;
        self.state.lock().unwrap().calls.push(function.name.clone());
        Ok(())
    }

    fn token(&self, network: &Network, token_id: TokenId) -> Result<(String, Address), ChainError> {
        let state = self.state.lock().unwrap();
        if state.failing.contains(&(network.clone(), token_id)) {
            return Err(ChainError::Rpc("execution reverted".into()));
        }
        state
            .tokens
            .get(&(network.clone(), token_id))
            .cloned()
            .ok_or_else(|| ChainError::Rpc("execution reverted: invalid token ID".into()))
    }
}

#[async_trait]
impl ChainClient for NullChainClient {
    async fn read_total_supply(&self, contract: &ContractDescriptor) -> Result<u64, ChainError> {
        self.record_call(contract, CanonicalOperation::ReadTotalSupply)?;
        let state = self.state.lock().unwrap();
        let scripted = state
            .tokens
            .keys()
            .filter(|(n, _)| n == &contract.network)
            .count() as u64;
        Ok(state
            .supplies
            .get(&contract.network)
            .copied()
            .unwrap_or(scripted))
    }

    async fn read_content_uri(
        &self,
        contract: &ContractDescriptor,
        token_id: TokenId,
    ) -> Result<String, ChainError> {
        self.record_call(contract, CanonicalOperation::ReadContentUri)?;
        Ok(self.token(&contract.network, token_id)?.0)
    }

    async fn read_owner(
        &self,
        contract: &ContractDescriptor,
        token_id: TokenId,
    ) -> Result<Address, ChainError> {
        self.record_call(contract, CanonicalOperation::ReadOwner)?;
        Ok(self.token(&contract.network, token_id)?.1)
    }

    async fn latest_block_number(&self, network: &Network) -> Result<BlockNumber, ChainError> {
        self.state
            .lock()
            .unwrap()
            .heads
            .get(network)
            .copied()
            .ok_or_else(|| ChainError::UnknownNetwork(network.to_string()))
    }

    async fn get_logs(
        &self,
        contract: &ContractDescriptor,
        event: CanonicalEvent,
        from: BlockNumber,
        to: BlockNumber,
    ) -> Result<Vec<Log>, ChainError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .logs
            .get(&(contract.network.clone(), event))
            .map(|logs| {
                logs.iter()
                    .filter(|l| {
                        l.block_number
                            .is_some_and(|b| b.as_u64() >= from && b.as_u64() <= to)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn submit(
        &self,
        contract: &ContractDescriptor,
        operation: CanonicalOperation,
        args: &[Token],
        params: &TxParams,
        wallet: &LocalWallet,
    ) -> Result<TxHash, ChainError> {
        let function = contract.function(operation)?;
        let calldata = encode_call(function, args)?;
        let hash = keccak256_multi(&[calldata.as_slice(), &params.nonce.to_be_bytes()[..]]);
        self.state.lock().unwrap().submitted.push(SubmittedTx {
            network: contract.network.clone(),
            method: function.name.clone(),
            calldata,
            nonce: params.nonce,
            signer: from_eth_address(wallet.address()),
        });
        Ok(TxHash::new(hash))
    }
}

fn address_topic(address: Address) -> H256 {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    H256(word)
}

/// A `Transfer(address,address,uint256)` log with every field indexed.
pub fn transfer_log(block_number: BlockNumber, from: Address, to: Address, token_id: TokenId) -> Log {
    Log {
        address: to_eth_address(Address::ZERO),
        topics: vec![
            H256(keccak256(b"Transfer(address,address,uint256)")),
            address_topic(from),
            address_topic(to),
            H256::from_low_u64_be(token_id),
        ],
        block_number: Some(U64::from(block_number)),
        ..Default::default()
    }
}
