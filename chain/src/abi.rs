//! Contract ABI binding on top of `ethers::abi`.
//!
//! The registry loads the standard JSON ABI into an [`Abi`]; this module adds
//! what the mirror needs around it: command-line argument parsing, checked
//! call encoding, log decoding and token id extraction.

use ethers::abi::token::{LenientTokenizer, Tokenizer};
use ethers::abi::{Function, LogParam, ParamType, RawLog};
use ethers::types::{Address as EthAddress, Log, U256};
use thiserror::Error;
use tokengrid_types::{Address, TokenId};

pub use ethers::abi::{Abi, Event, Token};

#[derive(Debug, Error)]
pub enum AbiError {
    #[error("invalid ABI JSON: {0}")]
    InvalidJson(String),

    #[error("{function}: expected {expected} arguments, got {actual}")]
    ArgumentCount {
        function: String,
        expected: usize,
        actual: usize,
    },

    #[error("value does not match type {expected}: {detail}")]
    TypeMismatch { expected: String, detail: String },

    #[error("ABI codec error: {0}")]
    Codec(#[from] ethers::abi::Error),
}

/// Parse the standard JSON ABI array.
pub fn parse_abi(json: &str) -> Result<Abi, AbiError> {
    serde_json::from_str(json).map_err(|e| AbiError::InvalidJson(e.to_string()))
}

pub fn to_eth_address(address: Address) -> EthAddress {
    EthAddress::from(*address.as_bytes())
}

pub fn from_eth_address(address: EthAddress) -> Address {
    Address::new(address.0)
}

/// Parameter types of a function's inputs, in order.
pub fn input_kinds(function: &Function) -> Vec<ParamType> {
    function.inputs.iter().map(|p| p.kind.clone()).collect()
}

/// Parse a command-line argument as `kind`.
///
/// Integers are decimal (unit suffixes such as `gwei` allowed) or `0x` hex.
/// Addresses and byte strings take an optional `0x` prefix.
pub fn parse_token(kind: &ParamType, raw: &str) -> Result<Token, AbiError> {
    let mismatch = |detail: String| AbiError::TypeMismatch {
        expected: kind.to_string(),
        detail,
    };
    if let (ParamType::Uint(_), Some(digits)) = (kind, raw.strip_prefix("0x")) {
        return U256::from_str_radix(digits, 16)
            .map(Token::Uint)
            .map_err(|e| mismatch(format!("'{raw}': {e}")));
    }
    let value = match kind {
        ParamType::Address | ParamType::Bytes | ParamType::FixedBytes(_) => {
            raw.strip_prefix("0x").unwrap_or(raw)
        }
        _ => raw,
    };
    LenientTokenizer::tokenize(kind, value).map_err(|e| mismatch(format!("'{raw}': {e}")))
}

/// Selector followed by the encoded arguments, after checking arity and
/// argument types against the function's inputs.
pub fn encode_call(function: &Function, args: &[Token]) -> Result<Vec<u8>, AbiError> {
    let kinds = input_kinds(function);
    if kinds.len() != args.len() {
        return Err(AbiError::ArgumentCount {
            function: function.name.clone(),
            expected: kinds.len(),
            actual: args.len(),
        });
    }
    if !Token::types_check(args, &kinds) {
        return Err(AbiError::TypeMismatch {
            expected: function.signature(),
            detail: format!("{args:?}"),
        });
    }
    Ok(function.encode_input(args)?)
}

/// Decode a log against `event`. Fails when the log's `topic0` belongs to a
/// different event or the data does not fit the declared parameters.
pub fn decode_log(event: &Event, log: &Log) -> Result<Vec<LogParam>, AbiError> {
    let raw = RawLog {
        topics: log.topics.clone(),
        data: log.data.to_vec(),
    };
    Ok(event.parse_log(raw)?.params)
}

/// Extract the token id carried by a decoded log: the parameter named
/// `tokenId`/`id` (any case, leading underscores ignored), else the first
/// unsigned integer.
pub fn token_id_from_fields(fields: &[LogParam]) -> Option<TokenId> {
    let is_id_name = |name: &str| {
        let name = name.trim_start_matches('_').to_ascii_lowercase();
        name == "tokenid" || name == "id"
    };
    let as_uint = |param: &LogParam| param.value.clone().into_uint();
    let named = fields
        .iter()
        .find(|p| is_id_name(&p.name) && as_uint(p).is_some());
    let id = named
        .or_else(|| fields.iter().find(|p| as_uint(p).is_some()))
        .and_then(as_uint)?;
    if id > U256::from(u64::MAX) {
        return None;
    }
    Some(id.as_u64())
}
