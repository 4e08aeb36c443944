use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokengrid_nullables::TestHarness;
use tokengrid_queue::{Message, QueueConfig, WorkQueue};
use tokengrid_store::GridItemStore;
use tokengrid_types::{Address, GridError};
use tokengrid_worker::{PollOutcome, WorkerLoop, WorkerMetrics, WorkerState};

const OWNER: Address = Address::new([0xaa; 20]);

fn worker(h: &TestHarness) -> (WorkerLoop, Arc<WorkerMetrics>) {
    let metrics = Arc::new(WorkerMetrics::new());
    let config = QueueConfig {
        long_poll_secs: 0,
        idle_sleep_secs: 1,
        ..QueueConfig::default()
    };
    let worker = WorkerLoop::new(
        h.queue.clone(),
        Arc::new(h.engine()),
        Arc::new(h.offchain()),
        h.notifier.clone(),
        metrics.clone(),
        config,
    );
    (worker, metrics)
}

#[tokio::test]
async fn successful_message_is_acknowledged() {
    let h = TestHarness::new();
    h.mint(4, OWNER, json!({ "title": "four" }));
    h.queue
        .send(&Message::update_token(&h.network, 4), 0)
        .await
        .unwrap();
    let (worker, metrics) = worker(&h);

    let outcome = worker.poll_once().await.unwrap();
    assert!(matches!(outcome, PollOutcome::Succeeded { ref command } if command == "UPDATE_TOKEN"));
    assert_eq!(h.store.get_grid_item(&h.network, 4).unwrap().title, "four");
    assert!(h.queue.messages().is_empty());
    assert_eq!(metrics.messages_succeeded.get(), 1);
    assert_eq!(worker.state(), WorkerState::Idle);
}

#[tokio::test]
async fn failed_message_is_alerted_and_left_for_redelivery() {
    let h = TestHarness::new();
    h.mint(4, OWNER, json!({ "title": "four" }));
    h.chain.fail_token(&h.network, 4);
    h.queue
        .send(&Message::update_token(&h.network, 4), 0)
        .await
        .unwrap();
    let (worker, metrics) = worker(&h);

    let outcome = worker.poll_once().await.unwrap();
    assert!(matches!(outcome, PollOutcome::Failed { .. }));
    assert_eq!(metrics.messages_failed.get(), 1);

    let alerts = h.notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].command, "UPDATE_TOKEN");
    assert_eq!(alerts[0].content["tokenId"], 4);
    assert!(alerts[0].error.contains("execution reverted"));

    // Not acked: it comes back once the lease expires.
    assert_eq!(h.queue.messages().len(), 1);
    h.queue.expire_leases();
    let leased = h.queue.receive(1, 30, 0).await.unwrap();
    assert_eq!(leased[0].receive_count, 2);
}

#[tokio::test]
async fn unknown_command_is_an_unhandled_message() {
    let h = TestHarness::new();
    h.queue
        .send_body(r#"{"command":"REBUILD_EVERYTHING","content":{}}"#.into(), 0)
        .await
        .unwrap();
    let (worker, _) = worker(&h);

    match worker.poll_once().await.unwrap() {
        PollOutcome::Failed { command, error } => {
            assert_eq!(command, "REBUILD_EVERYTHING");
            assert!(matches!(error, GridError::BadRequest(ref m) if m.starts_with("unhandled message")));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(h.notifier.alerts()[0].command, "REBUILD_EVERYTHING");
}

#[tokio::test]
async fn every_command_reaches_its_handler() {
    let h = TestHarness::new();
    h.mint(1, OWNER, json!({ "title": "one", "image": "http://x/1.png" }));
    let (worker, metrics) = worker(&h);

    for message in [
        Message::update_tokens(&h.network),
        Message::process_blocks(&h.network),
        Message::apply_offchain_content(&h.network),
    ] {
        h.queue.send(&message, 0).await.unwrap();
    }
    for _ in 0..3 {
        let outcome = worker.poll_once().await.unwrap();
        assert!(matches!(outcome, PollOutcome::Succeeded { .. }), "{outcome:?}");
    }
    // UPDATE_TOKENS created item 1 and queued its image upload.
    let outcome = worker.poll_once().await.unwrap();
    assert!(matches!(outcome, PollOutcome::Succeeded { ref command } if command == "UPLOAD_TOKEN_IMAGE"));
    assert!(h
        .store
        .get_grid_item(&h.network, 1)
        .unwrap()
        .resizable_image_url
        .is_some());
    assert_eq!(metrics.messages_succeeded.get(), 4);
}

#[tokio::test]
async fn empty_poll_is_counted() {
    let h = TestHarness::new();
    let (worker, metrics) = worker(&h);
    assert!(matches!(worker.poll_once().await.unwrap(), PollOutcome::Empty));
    assert_eq!(metrics.empty_polls.get(), 1);
}

#[tokio::test]
async fn run_stops_on_shutdown() {
    let h = TestHarness::new();
    let (worker, _) = worker(&h);
    let worker = Arc::new(worker);
    let (tx, rx) = tokio::sync::broadcast::channel(1);

    let handle = {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move { worker.run(rx).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("worker stops promptly")
        .unwrap();
}
