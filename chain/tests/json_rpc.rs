//! `JsonRpcChainClient` against a local JSON-RPC node served by axum.

use std::collections::HashMap;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use ethers::abi::{encode, Token};
use ethers::types::U256;
use serde_json::{json, Value};

use tokengrid_chain::{
    parse_abi, wallet_from_key, ChainClient, ChainError, ContractDescriptor, EndpointConfig,
    JsonRpcChainClient, OperationBindings, TxParams,
};
use tokengrid_chain::{CanonicalEvent, CanonicalOperation};
use tokengrid_types::{Address, ErrorKind, GridError, Network, PrivateKey, TxHash};

const GRID_ABI: &str = r#"[
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

const CONTRACT: Address = Address::new([0x42; 20]);
const OWNER: [u8; 20] = [0xbb; 20];
const REVERT_TEXT: &str = "execution reverted: ERC721: invalid token ID";

fn network() -> Network {
    Network::parse("testnet").unwrap()
}

fn descriptor() -> ContractDescriptor {
    let bindings = OperationBindings {
        write_content_uri: Some("setTokenURI".into()),
        ..OperationBindings::default()
    };
    ContractDescriptor::new(network(), CONTRACT, parse_abi(GRID_ABI).unwrap(), bindings).unwrap()
}

fn abi_hex(tokens: &[Token]) -> String {
    format!("0x{}", hex::encode(encode(tokens)))
}

fn reply(id: &Value, result: Value) -> Json<Value> {
    Json(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
}

/// Token 7 exists; every other token id reverts.
async fn node(Json(request): Json<Value>) -> Json<Value> {
    let id = request["id"].clone();
    let params = &request["params"];
    match request["method"].as_str().unwrap_or_default() {
        "eth_blockNumber" => reply(&id, json!("0x1b4")),
        "eth_call" => {
            let call = &params[0];
            let data = call
                .get("data")
                .or_else(|| call.get("input"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let token_id = data
                .get(data.len().saturating_sub(16)..)
                .and_then(|tail| u64::from_str_radix(tail, 16).ok())
                .unwrap_or(0);
            match data.get(..10).unwrap_or_default() {
                "0x18160ddd" => reply(&id, json!(abi_hex(&[Token::Uint(U256::from(3))]))),
                "0xc87b56dd" if token_id == 7 => {
                    reply(&id, json!(abi_hex(&[Token::String("ipfs://grid/7".into())])))
                }
                "0x6352211e" if token_id == 7 => {
                    reply(&id, json!(abi_hex(&[Token::Address(OWNER.into())])))
                }
                _ => Json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": 3, "message": REVERT_TEXT }
                })),
            }
        }
        "eth_getLogs" => {
            let filter = &params[0];
            let topic0 = filter["topics"][0].clone();
            reply(
                &id,
                json!([{
                    "address": filter["address"],
                    "topics": [
                        topic0,
                        format!("0x{}", "00".repeat(32)),
                        format!("0x{}{}", "00".repeat(12), "bb".repeat(20)),
                        format!("0x{}07", "00".repeat(31)),
                    ],
                    "data": "0x",
                    "blockNumber": "0x1b0",
                }]),
            )
        }
        "eth_sendRawTransaction" => {
            let raw = params[0].as_str().unwrap_or_default();
            if raw.starts_with("0xf8") || raw.starts_with("0xf9") {
                reply(&id, json!(format!("0x{}", "ab".repeat(32))))
            } else {
                Json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32602, "message": "rlp: expected list" }
                }))
            }
        }
        other => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": -32601, "message": format!("method {other} not found") }
        })),
    }
}

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn client_for(rpc_url: String, request_timeout_secs: u64) -> JsonRpcChainClient {
    JsonRpcChainClient::new(HashMap::from([(
        network(),
        EndpointConfig {
            rpc_url,
            chain_id: 5,
            request_timeout_secs,
        },
    )]))
    .unwrap()
}

async fn node_client() -> JsonRpcChainClient {
    client_for(spawn(Router::new().route("/", post(node))).await, 5)
}

#[tokio::test]
async fn eth_call_results_are_decoded() {
    let client = node_client().await;
    let contract = descriptor();

    assert_eq!(client.read_total_supply(&contract).await.unwrap(), 3);
    assert_eq!(client.read_content_uri(&contract, 7).await.unwrap(), "ipfs://grid/7");
    assert_eq!(client.read_owner(&contract, 7).await.unwrap(), Address::new(OWNER));
}

#[tokio::test]
async fn node_error_becomes_bad_request_with_node_text() {
    let client = node_client().await;
    let err = client.read_content_uri(&descriptor(), 8).await.unwrap_err();
    assert!(matches!(&err, ChainError::Rpc(text) if text == REVERT_TEXT));

    let grid: GridError = err.into();
    assert_eq!(grid.kind(), ErrorKind::BadRequest);
    assert_eq!(grid.message(), REVERT_TEXT);
}

#[tokio::test]
async fn block_number_is_read_from_hex_quantity() {
    let client = node_client().await;
    assert_eq!(client.latest_block_number(&network()).await.unwrap(), 436);
}

#[tokio::test]
async fn logs_come_back_for_the_bound_event() {
    let client = node_client().await;
    let contract = descriptor();
    let logs = client
        .get_logs(&contract, CanonicalEvent::Transfer, 400, 436)
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].block_number.map(|b| b.as_u64()), Some(432));

    let event = contract.event(CanonicalEvent::Transfer).unwrap().unwrap();
    assert_eq!(logs[0].topics[0], event.signature());
    let fields = tokengrid_chain::decode_log(event, &logs[0]).unwrap();
    assert_eq!(tokengrid_chain::token_id_from_fields(&fields), Some(7));
}

#[tokio::test]
async fn unbound_event_skips_the_node() {
    let client = client_for("http://127.0.0.1:9".into(), 1);
    let logs = client
        .get_logs(&descriptor(), CanonicalEvent::ContentUriUpdated, 0, 10)
        .await
        .unwrap();
    assert!(logs.is_empty());
}

#[tokio::test]
async fn signed_write_returns_node_hash() {
    let client = node_client().await;
    let wallet = wallet_from_key(&PrivateKey([0x46; 32])).unwrap();
    let params = TxParams {
        nonce: 0,
        gas_limit: 300_000,
        gas_price: U256::from(1_000_000_000u64),
        value: U256::zero(),
    };
    let hash = client
        .submit(
            &descriptor(),
            CanonicalOperation::WriteContentUri,
            &[Token::Uint(U256::from(7)), Token::String("ipfs://grid/7b".into())],
            &params,
            &wallet,
        )
        .await
        .unwrap();
    assert_eq!(hash, TxHash::new([0xab; 32]));
}

#[tokio::test]
async fn non_success_status_is_internal() {
    let router = Router::new().route(
        "/",
        post(|| async { (StatusCode::BAD_GATEWAY, "upstream unavailable") }),
    );
    let client = client_for(spawn(router).await, 5);
    let err = client.latest_block_number(&network()).await.unwrap_err();
    assert!(!matches!(err, ChainError::Rpc(_)), "got {err:?}");
    assert_eq!(GridError::from(err).kind(), ErrorKind::InternalServerError);
}

#[tokio::test]
async fn slow_node_times_out_as_unreachable() {
    let router = Router::new().route(
        "/",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "late"
        }),
    );
    let client = client_for(spawn(router).await, 1);
    let err = client.latest_block_number(&network()).await.unwrap_err();
    assert!(matches!(err, ChainError::Unreachable(_)), "got {err:?}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn refused_connection_is_transient() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(format!("http://{addr}"), 5);
    let err = client.latest_block_number(&network()).await.unwrap_err();
    assert!(err.is_transient(), "got {err:?}");
}
