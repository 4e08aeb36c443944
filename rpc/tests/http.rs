use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokengrid_crypto::LocalSigner;
use tokengrid_nullables::TestHarness;
use tokengrid_queue::Message;
use tokengrid_rpc::server::router;
use tokengrid_rpc::AppState;
use tokengrid_store::{GridItem, Image, ImageStore, ImageVariant, NetworkUpdate, NetworkUpdateStore};
use tokengrid_sync::canonical_message;
use tokengrid_types::{Address, PrivateKey, Timestamp, TokenId};
use tokengrid_worker::WorkerMetrics;
use tower::ServiceExt;

const OWNER: Address = Address::new([0xaa; 20]);
const OTHER: Address = Address::new([0xbb; 20]);

fn app(h: &TestHarness) -> Router {
    let state = AppState::new(
        &h.context(),
        Arc::new(h.offchain()),
        Arc::new(WorkerMetrics::new()),
    );
    router(state)
}

fn item(h: &TestHarness, token_id: TokenId, owner: Address, updated: u64) -> GridItem {
    GridItem {
        grid_item_id: 0,
        network: h.network.clone(),
        token_id,
        source: Address::ZERO,
        block_number: Some(90),
        title: format!("token {token_id}"),
        description: String::new(),
        image_url: None,
        resizable_image_url: None,
        content_url: None,
        url: None,
        group_id: None,
        owner_id: owner,
        created_date: Timestamp::new(1),
        updated_date: Timestamp::new(updated),
    }
}

async fn call(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app.oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    call(app, Method::GET, uri, None).await
}

async fn post(app: Router, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    call(app, Method::POST, uri, body).await
}

#[tokio::test]
async fn status_reports_progress_and_counts() {
    let h = TestHarness::new();
    h.store.insert_grid_item(item(&h, 1, OWNER, 10));
    h.store.insert_grid_item(item(&h, 2, OWNER, 20));
    h.store
        .put_network_update(&NetworkUpdate {
            network: h.network.clone(),
            block_number: 95,
            created_date: Timestamp::new(1),
            updated_date: Timestamp::new(1),
        })
        .unwrap();

    let (status, body) = get(app(&h), "/networks/testnet/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["network"], "testnet");
    assert_eq!(body["blockNumber"], 95);
    assert_eq!(body["tokenCount"], 2);
    assert!(body["baseImageUrl"].is_null());
    assert_eq!(body["queue"]["visible"], 0);
}

#[tokio::test]
async fn unknown_network_renders_not_found_body() {
    let h = TestHarness::new();
    let (status, body) = get(app(&h), "/networks/elsewhere/status").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["exceptionType"], "NotFoundException");
    assert_eq!(body["statusCode"], 404);
    assert!(body["message"].as_str().unwrap().contains("elsewhere"));
}

#[tokio::test]
async fn listing_pages_with_opaque_cursor() {
    let h = TestHarness::new();
    for id in 1..=3 {
        h.store.insert_grid_item(item(&h, id, OWNER, id));
    }

    let (status, first) = get(app(&h), "/networks/testnet/grid-items?count=2").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<_> = first["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["tokenId"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2]);
    let cursor = first["cursor"].as_str().unwrap().to_string();

    let (_, second) = get(
        app(&h),
        &format!("/networks/testnet/grid-items?count=2&cursor={cursor}"),
    )
    .await;
    assert_eq!(second["items"].as_array().unwrap().len(), 1);
    assert_eq!(second["items"][0]["tokenId"], 3);
    assert!(second.get("cursor").is_none());
}

#[tokio::test]
async fn listing_filters_by_owner_and_orders() {
    let h = TestHarness::new();
    h.store.insert_grid_item(item(&h, 1, OWNER, 30));
    h.store.insert_grid_item(item(&h, 2, OTHER, 50));
    h.store.insert_grid_item(item(&h, 3, OWNER, 40));

    let uri = format!(
        "/networks/testnet/grid-items?ownerId={}&order=-updatedDate",
        OWNER.to_checksum()
    );
    let (status, body) = get(app(&h), &uri).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<_> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["tokenId"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![3, 1]);
}

#[tokio::test]
async fn listing_rejects_unknown_order_and_bad_owner() {
    let h = TestHarness::new();
    let (status, body) = get(app(&h), "/networks/testnet/grid-items?order=sideways").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["exceptionType"], "BadRequestException");

    let (status, _) = get(app(&h), "/networks/testnet/grid-items?ownerId=0x12").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn single_item_lookup() {
    let h = TestHarness::new();
    h.store.insert_grid_item(item(&h, 42, OWNER, 5));

    let (status, body) = get(app(&h), "/networks/testnet/grid-items/42").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "token 42");
    assert_eq!(body["ownerId"], OWNER.to_checksum());

    let (status, _) = get(app(&h), "/networks/testnet/grid-items/43").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = get(app(&h), "/networks/testnet/grid-items/forty-two").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn enqueue_endpoints_send_messages_with_delay() {
    let h = TestHarness::new();
    h.store.insert_grid_item(item(&h, 7, OWNER, 5));

    let (status, body) = post(app(&h), "/networks/testnet/update-tokens?delaySeconds=30", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["command"], "UPDATE_TOKENS");
    assert_eq!(body["delaySeconds"], 30);

    let (status, _) = post(app(&h), "/networks/testnet/grid-items/7/update", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (status, _) = post(app(&h), "/networks/testnet/grid-items/7/upload-image", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    assert_eq!(
        h.queue.pending(),
        vec![
            (Message::update_tokens(&h.network), 30),
            (Message::update_token(&h.network, 7), 0),
            (Message::upload_token_image(&h.network, 7), 0),
        ]
    );
}

#[tokio::test]
async fn upload_of_unknown_item_is_not_enqueued() {
    let h = TestHarness::new();
    let (status, _) = post(app(&h), "/networks/testnet/grid-items/9/upload-image", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(h.queue.pending().is_empty());
}

#[tokio::test]
async fn base_image_keeps_created_date_on_replace() {
    let h = TestHarness::new();
    let (status, first) = post(
        app(&h),
        "/networks/testnet/base-image",
        Some(json!({ "url": "https://cdn.test/base-1.png" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    h.clock.advance(60);
    let (_, second) = post(
        app(&h),
        "/networks/testnet/base-image",
        Some(json!({ "url": "https://cdn.test/base-2.png" })),
    )
    .await;
    assert_eq!(second["url"], "https://cdn.test/base-2.png");
    assert_eq!(second["createdDate"], first["createdDate"]);
    assert_ne!(second["updatedDate"], first["updatedDate"]);

    let (_, status_body) = get(app(&h), "/networks/testnet/status").await;
    assert_eq!(status_body["baseImageUrl"], "https://cdn.test/base-2.png");

    let (status, _) = post(
        app(&h),
        "/networks/testnet/base-image",
        Some(json!({ "url": "ftp://cdn.test/base.png" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn group_content_is_accepted_from_the_anchor_owner() {
    let h = TestHarness::new();
    let owner = LocalSigner::from_private_key(&PrivateKey([7; 32])).unwrap();
    h.mint(3, owner.address(), json!({ "title": "anchor" }));

    let urls = vec!["https://c/a.png".to_string()];
    let signature = owner
        .sign_personal_message(canonical_message(90, &urls).as_bytes())
        .unwrap()
        .to_hex();
    let body = json!({
        "groupId": 3,
        "width": 1,
        "height": 1,
        "contentUrls": urls,
        "blockNumber": 90,
        "signature": signature,
    });

    let (status, mismatched) = post(
        app(&h),
        "/networks/testnet/groups/4/content",
        Some(body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(mismatched["exceptionType"], "BadRequestException");

    let (status, pending) = post(app(&h), "/networks/testnet/groups/3/content", Some(body)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(pending["status"], "pending");
    assert_eq!(pending["blockNumber"], 90);
}

#[tokio::test]
async fn group_content_with_malformed_body_is_bad_request() {
    let h = TestHarness::new();
    let (status, body) = post(
        app(&h),
        "/networks/testnet/groups/3/content",
        Some(json!({ "groupId": "three" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["statusCode"], 400);
}

#[tokio::test]
async fn image_redirect_picks_variant_and_caches() {
    let h = TestHarness::new();
    let variant = |size: u32| ImageVariant {
        width: size,
        height: size,
        url: format!("https://cdn.test/img-1/{size}.png"),
    };
    h.store
        .put_image(&Image {
            image_id: "img-1".into(),
            original_url: "https://cdn.test/img-1/original.png".into(),
            variants: vec![variant(100), variant(200), variant(500)],
            created_date: Timestamp::new(1),
        })
        .unwrap();

    let response = app(&h)
        .oneshot(
            Request::builder()
                .uri("/images/img-1/go?w=150&h=150")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers()[header::LOCATION],
        "https://cdn.test/img-1/200.png"
    );
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, max-age=86400"
    );

    let response = app(&h)
        .oneshot(
            Request::builder()
                .uri("/images/img-1/go?w=900&h=900")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::LOCATION],
        "https://cdn.test/img-1/original.png"
    );

    let (status, _) = get(app(&h), "/images/img-404/go").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn metrics_are_exposed_as_text() {
    let h = TestHarness::new();
    let response = app(&h)
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("tokengrid_worker_messages_received_total"));
}
