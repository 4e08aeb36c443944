//! Chain access over Ethereum JSON-RPC through `ethers` providers.

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider, ProviderError};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{BlockId, BlockNumber as EthBlockNumber, Filter, Log, TransactionRequest, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokengrid_types::{Address, BlockNumber, Network, TokenId, TxHash};

use crate::abi::{encode_call, from_eth_address, to_eth_address, AbiError, Token};
use crate::error::ChainError;
use crate::registry::{CanonicalEvent, CanonicalOperation, ContractDescriptor};
use crate::transaction::{sign_legacy, TxParams};

/// Everything the mirror needs from a chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn read_total_supply(&self, contract: &ContractDescriptor) -> Result<u64, ChainError>;

    async fn read_content_uri(
        &self,
        contract: &ContractDescriptor,
        token_id: TokenId,
    ) -> Result<String, ChainError>;

    async fn read_owner(
        &self,
        contract: &ContractDescriptor,
        token_id: TokenId,
    ) -> Result<Address, ChainError>;

    async fn latest_block_number(&self, network: &Network) -> Result<BlockNumber, ChainError>;

    /// Logs of `event` emitted by the contract in `from..=to`.
    async fn get_logs(
        &self,
        contract: &ContractDescriptor,
        event: CanonicalEvent,
        from: BlockNumber,
        to: BlockNumber,
    ) -> Result<Vec<Log>, ChainError>;

    /// Sign and submit a write. Not safe to retry on transport errors.
    async fn submit(
        &self,
        contract: &ContractDescriptor,
        operation: CanonicalOperation,
        args: &[Token],
        params: &TxParams,
        wallet: &LocalWallet,
    ) -> Result<TxHash, ChainError>;
}

/// Per-network node endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

struct Endpoint {
    provider: Provider<Http>,
    chain_id: u64,
    timeout: Duration,
}

impl Endpoint {
    /// Run one provider request under this endpoint's timeout.
    async fn request<T>(
        &self,
        method: &'static str,
        request: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, ChainError> {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                let err = ChainError::from(e);
                tracing::debug!(method, error = %err, "node request failed");
                Err(err)
            }
            Err(_) => Err(ChainError::Unreachable(format!(
                "{method} timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

/// [`ChainClient`] backed by one HTTP JSON-RPC provider per network.
pub struct JsonRpcChainClient {
    endpoints: HashMap<Network, Endpoint>,
}

impl JsonRpcChainClient {
    pub fn new(endpoints: HashMap<Network, EndpointConfig>) -> Result<Self, ChainError> {
        let endpoints = endpoints
            .into_iter()
            .map(|(network, config)| {
                let provider = Provider::<Http>::try_from(config.rpc_url.as_str()).map_err(|e| {
                    ChainError::Config(format!("{network}: invalid rpc_url '{}': {e}", config.rpc_url))
                })?;
                let endpoint = Endpoint {
                    provider,
                    chain_id: config.chain_id,
                    timeout: Duration::from_secs(config.request_timeout_secs),
                };
                Ok((network, endpoint))
            })
            .collect::<Result<HashMap<_, _>, ChainError>>()?;
        Ok(Self { endpoints })
    }

    fn endpoint(&self, network: &Network) -> Result<&Endpoint, ChainError> {
        self.endpoints
            .get(network)
            .ok_or_else(|| ChainError::UnknownNetwork(network.to_string()))
    }

    async fn call_single(
        &self,
        contract: &ContractDescriptor,
        operation: CanonicalOperation,
        args: &[Token],
    ) -> Result<Token, ChainError> {
        let endpoint = self.endpoint(&contract.network)?;
        let function = contract.function(operation)?;
        let tx: TypedTransaction = TransactionRequest::new()
            .to(to_eth_address(contract.address))
            .data(encode_call(function, args)?)
            .into();
        let latest = Some(BlockId::Number(EthBlockNumber::Latest));
        let raw = endpoint
            .request("eth_call", endpoint.provider.call(&tx, latest))
            .await?;
        function
            .decode_output(raw.as_ref())
            .map_err(AbiError::from)?
            .into_iter()
            .next()
            .ok_or_else(|| ChainError::InvalidResponse(format!("{operation}: empty return data")))
    }
}

#[async_trait]
impl ChainClient for JsonRpcChainClient {
    async fn read_total_supply(&self, contract: &ContractDescriptor) -> Result<u64, ChainError> {
        let supply = self
            .call_single(contract, CanonicalOperation::ReadTotalSupply, &[])
            .await?
            .into_uint()
            .ok_or_else(|| ChainError::InvalidResponse("totalSupply is not an integer".into()))?;
        if supply > U256::from(u64::MAX) {
            return Err(ChainError::InvalidResponse(format!("totalSupply {supply} too large")));
        }
        Ok(supply.as_u64())
    }

    async fn read_content_uri(
        &self,
        contract: &ContractDescriptor,
        token_id: TokenId,
    ) -> Result<String, ChainError> {
        self.call_single(
            contract,
            CanonicalOperation::ReadContentUri,
            &[Token::Uint(U256::from(token_id))],
        )
        .await?
        .into_string()
        .ok_or_else(|| ChainError::InvalidResponse("content URI is not a string".into()))
    }

    async fn read_owner(
        &self,
        contract: &ContractDescriptor,
        token_id: TokenId,
    ) -> Result<Address, ChainError> {
        self.call_single(
            contract,
            CanonicalOperation::ReadOwner,
            &[Token::Uint(U256::from(token_id))],
        )
        .await?
        .into_address()
        .map(from_eth_address)
        .ok_or_else(|| ChainError::InvalidResponse("owner is not an address".into()))
    }

    async fn latest_block_number(&self, network: &Network) -> Result<BlockNumber, ChainError> {
        let endpoint = self.endpoint(network)?;
        let head = endpoint
            .request("eth_blockNumber", endpoint.provider.get_block_number())
            .await?;
        Ok(head.as_u64())
    }

    async fn get_logs(
        &self,
        contract: &ContractDescriptor,
        event: CanonicalEvent,
        from: BlockNumber,
        to: BlockNumber,
    ) -> Result<Vec<Log>, ChainError> {
        let Some(abi_event) = contract.event(event)? else {
            return Ok(Vec::new());
        };
        let endpoint = self.endpoint(&contract.network)?;
        let filter = Filter::new()
            .address(to_eth_address(contract.address))
            .topic0(abi_event.signature())
            .from_block(from)
            .to_block(to);
        endpoint
            .request("eth_getLogs", endpoint.provider.get_logs(&filter))
            .await
    }

    async fn submit(
        &self,
        contract: &ContractDescriptor,
        operation: CanonicalOperation,
        args: &[Token],
        params: &TxParams,
        wallet: &LocalWallet,
    ) -> Result<TxHash, ChainError> {
        let endpoint = self.endpoint(&contract.network)?;
        let data = encode_call(contract.function(operation)?, args)?;
        let raw = sign_legacy(wallet, params, contract.address, data, endpoint.chain_id)?;

        tracing::info!(
            network = %contract.network,
            %operation,
            nonce = params.nonce,
            from = %from_eth_address(wallet.address()),
            "submitting transaction"
        );
        let pending = endpoint
            .request(
                "eth_sendRawTransaction",
                endpoint.provider.send_raw_transaction(raw),
            )
            .await?;
        Ok(TxHash::new(pending.tx_hash().0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_network_fails_before_any_request() {
        let client = JsonRpcChainClient::new(HashMap::new()).unwrap();
        let err = client
            .latest_block_number(&Network::parse("devnet").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::UnknownNetwork(_)));
    }

    #[test]
    fn malformed_rpc_url_is_a_config_error() {
        let endpoints = HashMap::from([(
            Network::parse("testnet").unwrap(),
            EndpointConfig {
                rpc_url: "not a url".into(),
                chain_id: 5,
                request_timeout_secs: 30,
            },
        )]);
        assert!(matches!(
            JsonRpcChainClient::new(endpoints),
            Err(ChainError::Config(_))
        ));
    }
}
