use cache_warmer::config::parse_config;
use cache_warmer::queue::{
    add_urls, claim_batch, clear_pending, get_status, ClaimToken, EnqueueRequest,
};
use cache_warmer::state::ItemStatus;
use cache_warmer::storage::{QueueStore, RunStatus, SqliteStorage};
use cache_warmer::warmer::{Driver, DriverOptions, FetchExecutor, FetchSettings};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_enqueue_claim_execute_status() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let store = Mutex::new(SqliteStorage::open_in_memory().unwrap());
    {
        let mut guard = store.lock().unwrap();
        for (page, priority) in [("a", 1), ("b", 5), ("c", 1)] {
            let request = EnqueueRequest {
                priority,
                ..Default::default()
            };
            let added = add_urls(
                &mut *guard,
                [format!("{}/{}", mock_server.uri(), page)],
                &request,
            )
            .unwrap();
            assert_eq!(added, 1);
        }
    }

    let token = ClaimToken::generate();
    let items = {
        let mut guard = store.lock().unwrap();
        claim_batch(&mut *guard, &token, 2, false).unwrap()
    };
    // Highest priority first, then lowest id
    let claimed: Vec<i64> = items.iter().map(|item| item.id).collect();
    assert_eq!(claimed, vec![2, 1]);

    let executor = FetchExecutor::new(&FetchSettings::default()).unwrap();
    let summary = executor.execute_batch(&store, items).await.unwrap();
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.success, 1);
    assert_eq!(summary.failed, 1);

    let guard = store.lock().unwrap();
    let a = guard.get_item(1).unwrap();
    assert_eq!(a.status, ItemStatus::Done);
    assert_eq!(a.attempts, 1);

    let b = guard.get_item(2).unwrap();
    assert_eq!(b.status, ItemStatus::Failed);
    assert_eq!(b.response_code, Some(500));
    assert_eq!(b.last_error.as_deref(), Some("HTTP 500"));
    assert_eq!(b.attempts, 1);

    let status = get_status(&*guard, 20).unwrap();
    assert_eq!(status.count(ItemStatus::Pending), 1);
    assert_eq!(status.count(ItemStatus::Processing), 0);
    assert_eq!(status.count(ItemStatus::Done), 1);
    assert_eq!(status.count(ItemStatus::Failed), 1);
    assert_eq!(status.sample, vec![format!("{}/c", mock_server.uri())]);
}

#[tokio::test]
async fn test_every_claimed_item_reaches_a_terminal_state() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/redirect"))
        .respond_with(ResponseTemplate::new(304))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&mock_server)
        .await;

    let store = Mutex::new(SqliteStorage::open_in_memory().unwrap());
    let urls = vec![
        format!("{}/ok", mock_server.uri()),
        format!("{}/redirect", mock_server.uri()),
        format!("{}/gone", mock_server.uri()),
        format!("{}/unmatched", mock_server.uri()),
        "http://127.0.0.1:1/".to_string(),
    ];
    let items = {
        let mut guard = store.lock().unwrap();
        add_urls(&mut *guard, &urls, &EnqueueRequest::default()).unwrap();
        claim_batch(&mut *guard, &ClaimToken::generate(), 10, false).unwrap()
    };

    let settings = FetchSettings {
        concurrency: 2,
        ..Default::default()
    };
    let executor = FetchExecutor::new(&settings).unwrap();
    let summary = executor.execute_batch(&store, items).await.unwrap();

    assert_eq!(summary.processed, 5);
    assert_eq!(summary.success, 2);
    assert_eq!(summary.failed, 3);

    let guard = store.lock().unwrap();
    for id in 1..=5 {
        let item = guard.get_item(id).unwrap();
        assert!(item.status.is_terminal(), "item {} is {}", id, item.status);
        assert_eq!(item.attempts, 1);
        assert!(item.claim_token.is_none());
    }
    // Unmatched wiremock routes answer 404
    assert_eq!(guard.get_item(4).unwrap().last_error.as_deref(), Some("HTTP 404"));
}

#[tokio::test]
async fn test_clear_pending_keeps_history() {
    let store = Mutex::new(SqliteStorage::open_in_memory().unwrap());
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let mut guard = store.lock().unwrap();
    let urls: Vec<String> = (0..4)
        .map(|i| format!("{}/p/{}", mock_server.uri(), i))
        .collect();
    add_urls(&mut *guard, &urls, &EnqueueRequest::default()).unwrap();
    let items = claim_batch(&mut *guard, &ClaimToken::generate(), 1, false).unwrap();
    claim_batch(&mut *guard, &ClaimToken::generate(), 1, false).unwrap();
    drop(guard);

    let executor = FetchExecutor::new(&FetchSettings::default()).unwrap();
    executor.execute_batch(&store, items).await.unwrap();

    let mut guard = store.lock().unwrap();
    // One done, one processing, two pending
    assert_eq!(clear_pending(&mut *guard).unwrap(), 3);

    let status = get_status(&*guard, 10).unwrap();
    assert_eq!(status.count(ItemStatus::Done), 1);
    assert_eq!(status.total(), 1);
    assert!(status.sample.is_empty());
}

#[tokio::test]
async fn test_driver_from_config_file_database() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("x-cache-warmer", "1"))
        .and(header("x-warm-source", "integration"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("warm.db");
    let config = parse_config(&format!(
        r#"
[queue]
database-path = "{}"
batch-size = 2

[http]
concurrency = 2

[http.headers]
X-Warm-Source = "integration"
"#,
        db_path.display()
    ))
    .unwrap();

    {
        let mut storage = SqliteStorage::new(&db_path).unwrap();
        let urls: Vec<String> = (0..3)
            .map(|i| format!("{}/page/{}", mock_server.uri(), i))
            .collect();
        add_urls(&mut storage, &urls, &EnqueueRequest::default()).unwrap();
    }

    let driver = Driver::from_config(&config, "hash-1").unwrap();
    let summary = driver.run(CancellationToken::new()).await.unwrap();
    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.totals.success, 3);
    assert_eq!(summary.batches, 2);

    // A fresh connection sees the committed results
    let storage = SqliteStorage::new(&db_path).unwrap();
    let status = get_status(&storage, 10).unwrap();
    assert_eq!(status.count(ItemStatus::Done), 3);

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.id, summary.run_id);
    assert_eq!(run.config_hash, "hash-1");
    assert_eq!(run.status, RunStatus::Completed);
}

fn shared_file_driver(db_path: &std::path::Path) -> Driver<SqliteStorage> {
    let settings = FetchSettings {
        concurrency: 1,
        timeout: Duration::from_secs(1),
        ..Default::default()
    };
    let options = DriverOptions {
        batch_size: 4,
        stale_claim_after: Some(Duration::from_millis(1500)),
        ..Default::default()
    };
    let storage = SqliteStorage::new(db_path).unwrap();
    let executor = FetchExecutor::new(&settings).unwrap();
    Driver::new(Arc::new(Mutex::new(storage)), executor, options)
}

#[tokio::test]
async fn test_queued_items_are_not_fetched_twice_by_a_second_driver() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(700)))
        .expect(4)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("warm.db");
    {
        let mut storage = SqliteStorage::new(&db_path).unwrap();
        let urls: Vec<String> = (0..4)
            .map(|i| format!("{}/page/{}", mock_server.uri(), i))
            .collect();
        add_urls(&mut storage, &urls, &EnqueueRequest::default()).unwrap();
    }

    // The first driver claims all four and fetches them one at a time. The
    // second starts once the last queued claim is older than the threshold.
    let first = shared_file_driver(&db_path);
    let second = shared_file_driver(&db_path);
    let (first_summary, second_summary) = tokio::join!(
        first.run(CancellationToken::new()),
        async {
            tokio::time::sleep(Duration::from_millis(1700)).await;
            second.run(CancellationToken::new()).await
        }
    );
    let first_summary = first_summary.unwrap();
    let second_summary = second_summary.unwrap();

    assert_eq!(
        first_summary.totals.processed + second_summary.totals.processed,
        4
    );

    let storage = SqliteStorage::new(&db_path).unwrap();
    let status = get_status(&storage, 10).unwrap();
    assert_eq!(status.count(ItemStatus::Done), 4);
    for id in 1..=4 {
        let item = storage.get_item(id).unwrap();
        assert_eq!(item.attempts, 1);
        assert!(item.claim_token.is_none());
    }

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 4);
}
