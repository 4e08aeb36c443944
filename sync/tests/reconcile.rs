use serde_json::json;
use tokengrid_chain::{parse_abi, CanonicalEvent, ContractDescriptor, ContractRegistry, OperationBindings};
use tokengrid_nullables::{test_descriptor, transfer_log, TestHarness, TEST_CONTRACT};
use tokengrid_queue::Message;
use tokengrid_store::{GridItem, GridItemStore, ImageStore, NetworkUpdateStore};
use tokengrid_sync::{BlockScan, ImageOutcome, SyncConfig, SyncEngine, UpdateOutcome};
use tokengrid_types::{Address, Clock, GridError, Network, Timestamp, TokenId};

const OLD_OWNER: Address = Address::new([0xaa; 20]);
const NEW_OWNER: Address = Address::new([0xbb; 20]);

fn stored_item(
    h: &TestHarness,
    token_id: TokenId,
    title: &str,
    image_url: Option<&str>,
    resizable: Option<&str>,
    owner: Address,
) -> GridItem {
    GridItem {
        grid_item_id: 0,
        network: h.network.clone(),
        token_id,
        source: TEST_CONTRACT,
        block_number: None,
        title: title.to_string(),
        description: String::new(),
        image_url: image_url.map(str::to_string),
        resizable_image_url: resizable.map(str::to_string),
        content_url: Some(format!("https://meta.test/{}/{token_id}.json", h.network)),
        url: None,
        group_id: None,
        owner_id: owner,
        created_date: Timestamp::new(1),
        updated_date: Timestamp::new(1),
    }
}

#[tokio::test]
async fn token_42_picks_up_new_metadata_and_owner() {
    let h = TestHarness::new();
    h.store.insert_grid_item(stored_item(
        &h,
        42,
        "Old",
        Some("http://x/old.png"),
        Some("https://grid.test/images/img-0/go"),
        OLD_OWNER,
    ));
    let new_owner = Address::parse("0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359").unwrap();
    h.mint(42, new_owner, json!({ "name": "New", "image": "http://x/new.png" }));

    let outcome = h.engine().update_token(&h.network, 42).await.unwrap();
    assert_eq!(outcome, UpdateOutcome::Updated);

    let item = h.store.get_grid_item(&h.network, 42).unwrap();
    assert_eq!(item.title, "New");
    assert_eq!(item.image_url.as_deref(), Some("http://x/new.png"));
    assert_eq!(item.resizable_image_url, None);
    assert_eq!(item.owner_id, new_owner);
    assert_eq!(
        item.owner_id.to_string(),
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359"
    );
    assert_eq!(item.updated_date, h.clock.now());
    assert_eq!(
        h.queue.messages(),
        vec![Message::upload_token_image(&h.network, 42)]
    );
}

#[tokio::test]
async fn second_update_with_unchanged_chain_writes_nothing() {
    let h = TestHarness::new();
    h.mint(7, OLD_OWNER, json!({ "title": "A", "description": "d" }));
    let engine = h.engine();

    assert_eq!(
        engine.update_token(&h.network, 7).await.unwrap(),
        UpdateOutcome::Created
    );
    let writes = h.store.write_count();

    assert_eq!(
        engine.update_token(&h.network, 7).await.unwrap(),
        UpdateOutcome::Unchanged
    );
    assert_eq!(h.store.write_count(), writes);
    assert_eq!(h.store.grid_item_count(&h.network).unwrap(), 1);
    // No image, nothing to ingest.
    assert!(h.queue.messages().is_empty());
}

#[tokio::test]
async fn image_change_invalidates_resizable_url_and_queues_one_upload() {
    let h = TestHarness::new();
    h.store.insert_grid_item(stored_item(
        &h,
        3,
        "T",
        Some("http://x/a.png"),
        Some("https://grid.test/images/img-1/go"),
        OLD_OWNER,
    ));
    h.mint(3, OLD_OWNER, json!({ "title": "T", "imageUrl": "http://x/b.png" }));

    h.engine().update_token(&h.network, 3).await.unwrap();

    let item = h.store.get_grid_item(&h.network, 3).unwrap();
    assert_eq!(item.resizable_image_url, None);
    assert_eq!(
        h.queue.messages(),
        vec![Message::upload_token_image(&h.network, 3)]
    );
}

#[tokio::test]
async fn ingested_unchanged_item_queues_nothing() {
    let h = TestHarness::new();
    h.store.insert_grid_item(stored_item(
        &h,
        3,
        "T",
        Some("http://x/a.png"),
        Some("https://grid.test/images/img-1/go"),
        OLD_OWNER,
    ));
    h.mint(3, OLD_OWNER, json!({ "title": "T", "image": "http://x/a.png" }));

    let outcome = h.engine().update_token(&h.network, 3).await.unwrap();
    assert_eq!(outcome, UpdateOutcome::Unchanged);
    assert!(h.queue.messages().is_empty());
}

#[tokio::test]
async fn lost_create_race_continues_on_update_path() {
    let h = TestHarness::new();
    h.mint(9, NEW_OWNER, json!({ "title": "Fresh" }));
    h.store
        .preempt_next_create(stored_item(&h, 9, "Stale", None, None, OLD_OWNER));

    let outcome = h.engine().update_token(&h.network, 9).await.unwrap();
    assert_eq!(outcome, UpdateOutcome::Updated);
    let item = h.store.get_grid_item(&h.network, 9).unwrap();
    assert_eq!(item.title, "Fresh");
    assert_eq!(item.owner_id, NEW_OWNER);
    assert_eq!(h.store.grid_item_count(&h.network).unwrap(), 1);
}

#[tokio::test]
async fn metadata_fallbacks_fill_url_group_and_content_uri() {
    let h = TestHarness::new();
    h.mint(
        5,
        OLD_OWNER,
        json!({ "name": "N", "external_url": "https://site/5", "groupId": 4 }),
    );
    h.engine().update_token(&h.network, 5).await.unwrap();

    let item = h.store.get_grid_item(&h.network, 5).unwrap();
    assert_eq!(item.url.as_deref(), Some("https://site/5"));
    assert_eq!(item.group_id, Some(4));
    assert_eq!(
        item.content_url.as_deref(),
        Some("https://meta.test/testnet/5.json")
    );
    assert_eq!(item.source, TEST_CONTRACT);
}

#[tokio::test]
async fn batch_isolates_failing_tokens_and_withholds_checkpoint() {
    let h = TestHarness::new();
    for id in 1..=3 {
        h.mint(id, OLD_OWNER, json!({ "title": format!("t{id}") }));
    }
    h.chain.fail_token(&h.network, 2);

    let report = h.engine().update_tokens(&h.network).await.unwrap();
    assert_eq!(report.total, 3);
    assert_eq!(report.created, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, 2);
    assert!(matches!(report.failed[0].1, GridError::BadRequest(_)));
    assert_eq!(report.checkpoint, None);

    assert!(h.store.get_grid_item(&h.network, 1).is_ok());
    assert!(h.store.get_grid_item(&h.network, 3).is_ok());
    assert!(h.store.get_network_update(&h.network).unwrap_err().is_not_found());

    let alerts = h.notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].command, "UPDATE_TOKEN");
    assert_eq!(alerts[0].content["tokenId"], 2);
}

#[tokio::test]
async fn clean_batch_records_head_and_stamps_block_number() {
    let h = TestHarness::new();
    h.mint(1, OLD_OWNER, json!({ "title": "one" }));
    h.mint(2, OLD_OWNER, json!({ "title": "two" }));

    let report = h.engine().update_tokens(&h.network).await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.checkpoint, Some(100));
    assert_eq!(h.store.get_network_update(&h.network).unwrap().block_number, 100);
    assert_eq!(
        h.store.get_grid_item(&h.network, 2).unwrap().block_number,
        Some(100)
    );
}

#[tokio::test]
async fn different_raw_method_names_serve_the_same_canonical_read() {
    let testnet = Network::parse("testnet").unwrap();
    let othernet = Network::parse("othernet").unwrap();
    let other_abi = parse_abi(
        r#"[
        {"type":"function","name":"contentOf","inputs":[{"name":"id","type":"uint256"}],"outputs":[{"name":"","type":"string"}]},
        {"type":"function","name":"holderOf","inputs":[{"name":"id","type":"uint256"}],"outputs":[{"name":"","type":"address"}]},
        {"type":"function","name":"supply","inputs":[],"outputs":[{"name":"","type":"uint256"}]},
        {"type":"event","name":"Transfer","anonymous":false,"inputs":[
          {"name":"from","type":"address","indexed":true},
          {"name":"to","type":"address","indexed":true},
          {"name":"id","type":"uint256","indexed":true}]}
    ]"#,
    )
    .unwrap();
    let other_bindings = OperationBindings {
        read_content_uri: "contentOf".into(),
        read_owner: "holderOf".into(),
        read_total_supply: "supply".into(),
        ..OperationBindings::default()
    };

    let mut registry = ContractRegistry::new();
    registry
        .register(test_descriptor(&testnet, OperationBindings::default()))
        .unwrap();
    registry
        .register(
            ContractDescriptor::new(othernet.clone(), TEST_CONTRACT, other_abi, other_bindings)
                .unwrap(),
        )
        .unwrap();

    let h = TestHarness::with_registry(testnet.clone(), registry);
    for network in [&testnet, &othernet] {
        let uri = format!("https://meta.test/{network}/1.json");
        h.chain.set_token(network, 1, &uri, OLD_OWNER);
        h.metadata.set_document(&uri, json!({ "title": network.as_str() }));
    }

    let engine = h.engine();
    engine.update_token(&testnet, 1).await.unwrap();
    engine.update_token(&othernet, 1).await.unwrap();

    assert_eq!(
        h.chain.calls(),
        vec!["tokenURI", "ownerOf", "contentOf", "holderOf"]
    );
    assert_eq!(h.store.get_grid_item(&othernet, 1).unwrap().title, "othernet");
}

#[tokio::test]
async fn unknown_network_is_not_found() {
    let h = TestHarness::new();
    let err = h
        .engine()
        .update_token(&Network::parse("nowhere").unwrap(), 1)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn first_block_run_bootstraps_with_a_full_scan() {
    let h = TestHarness::new();
    let scan = h.engine().process_blocks(&h.network).await.unwrap();
    assert_eq!(scan, BlockScan::Bootstrapped { head: 100 });
    assert_eq!(h.queue.messages(), vec![Message::update_tokens(&h.network)]);
    assert_eq!(h.store.get_network_update(&h.network).unwrap().block_number, 100);
}

#[tokio::test]
async fn block_scan_queues_each_transferred_token_once() {
    let h = TestHarness::new();
    let engine = h.engine();
    engine.process_blocks(&h.network).await.unwrap();
    h.queue.clear();

    h.chain.set_head(&h.network, 110);
    for (block, token) in [(103, 5), (105, 5), (108, 11), (120, 9)] {
        h.chain.push_log(
            &h.network,
            CanonicalEvent::Transfer,
            transfer_log(block, OLD_OWNER, NEW_OWNER, token),
        );
    }

    let scan = engine.process_blocks(&h.network).await.unwrap();
    assert_eq!(
        scan,
        BlockScan::Scanned {
            from: 101,
            to: 110,
            tokens: vec![5, 11]
        }
    );
    assert_eq!(
        h.queue.messages(),
        vec![
            Message::update_token(&h.network, 5),
            Message::update_token(&h.network, 11)
        ]
    );
    assert_eq!(h.store.get_network_update(&h.network).unwrap().block_number, 110);

    assert_eq!(
        engine.process_blocks(&h.network).await.unwrap(),
        BlockScan::UpToDate { checkpoint: 110 }
    );
}

#[tokio::test]
async fn block_scan_is_bounded_by_max_range() {
    let h = TestHarness::new();
    let config = SyncConfig {
        max_block_range: 4,
        ..SyncConfig::default()
    };
    let engine = SyncEngine::new(h.context(), config, h.images_config());
    engine.process_blocks(&h.network).await.unwrap();

    h.chain.set_head(&h.network, 200);
    let scan = engine.process_blocks(&h.network).await.unwrap();
    assert_eq!(
        scan,
        BlockScan::Scanned {
            from: 101,
            to: 104,
            tokens: vec![]
        }
    );
}

#[tokio::test]
async fn upload_ingests_and_points_at_variant_redirect() {
    let h = TestHarness::new();
    h.store.insert_grid_item(stored_item(
        &h,
        8,
        "T",
        Some("ipfs://QmImage/8.png"),
        None,
        OLD_OWNER,
    ));
    let engine = h.engine();

    let outcome = engine.upload_token_image(&h.network, 8).await.unwrap();
    assert_eq!(
        outcome,
        ImageOutcome::Ingested {
            image_id: "img-1".into()
        }
    );
    assert_eq!(h.images.requests(), vec!["https://ipfs.io/ipfs/QmImage/8.png"]);

    let item = h.store.get_grid_item(&h.network, 8).unwrap();
    assert_eq!(
        item.resizable_image_url.as_deref(),
        Some("https://grid.test/images/img-1/go")
    );
    let image = h.store.get_image("img-1").unwrap();
    assert_eq!(image.select_variant(150, 150), "https://cdn.test/img-1/200.png");

    // Redelivered message: nothing left to do.
    assert_eq!(
        engine.upload_token_image(&h.network, 8).await.unwrap(),
        ImageOutcome::AlreadyIngested
    );
    assert_eq!(h.images.requests().len(), 1);
}

#[tokio::test]
async fn upload_without_image_is_a_no_op() {
    let h = TestHarness::new();
    h.store
        .insert_grid_item(stored_item(&h, 2, "T", None, None, OLD_OWNER));
    assert_eq!(
        h.engine().upload_token_image(&h.network, 2).await.unwrap(),
        ImageOutcome::NoImage
    );
    assert!(h.images.requests().is_empty());
}

#[tokio::test]
async fn upload_for_unknown_item_is_not_found() {
    let h = TestHarness::new();
    let err = h
        .engine()
        .upload_token_image(&h.network, 99)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
