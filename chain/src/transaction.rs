//! Legacy (pre-EIP-2718) transactions with EIP-155 replay protection, signed
//! with a local `ethers` wallet.

use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address as EthAddress, Bytes, TransactionRequest, U256};
use tokengrid_types::{Address, PrivateKey};

use crate::abi::to_eth_address;
use crate::error::ChainError;

/// Caller-supplied transaction parameters. Gas is never estimated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxParams {
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: U256,
    pub value: U256,
}

/// Load a signing wallet from a raw secp256k1 secret.
pub fn wallet_from_key(key: &PrivateKey) -> Result<LocalWallet, ChainError> {
    Ok(LocalWallet::from_bytes(&key.0)?)
}

/// The unsigned legacy request; the chain id goes into the signing hash.
pub fn legacy_request(
    params: &TxParams,
    from: EthAddress,
    to: Address,
    data: Vec<u8>,
    chain_id: u64,
) -> TypedTransaction {
    TransactionRequest::new()
        .from(from)
        .to(to_eth_address(to))
        .nonce(params.nonce)
        .gas(params.gas_limit)
        .gas_price(params.gas_price)
        .value(params.value)
        .data(data)
        .chain_id(chain_id)
        .into()
}

/// Sign and RLP-encode a legacy transaction for `eth_sendRawTransaction`.
pub fn sign_legacy(
    wallet: &LocalWallet,
    params: &TxParams,
    to: Address,
    data: Vec<u8>,
    chain_id: u64,
) -> Result<Bytes, ChainError> {
    let tx = legacy_request(params, wallet.address(), to, data, chain_id);
    let signature = wallet.sign_transaction_sync(&tx)?;
    Ok(tx.rlp_signed(&signature))
}
