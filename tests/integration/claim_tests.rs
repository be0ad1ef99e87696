use cache_warmer::queue::{add_urls, claim_batch, ClaimToken, EnqueueRequest};
use cache_warmer::state::ItemStatus;
use cache_warmer::storage::{QueueStore, SqliteStorage};
use std::collections::HashSet;
use std::thread;
use tempfile::TempDir;

#[test]
fn test_concurrent_claimers_never_share_an_item() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("queue.db");

    {
        let mut storage = SqliteStorage::new(&db_path).unwrap();
        let urls: Vec<String> = (0..200)
            .map(|i| format!("https://shop.example.com/p/{}", i))
            .collect();
        let added = add_urls(&mut storage, &urls, &EnqueueRequest::default()).unwrap();
        assert_eq!(added, 200);
    }

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let db_path = db_path.clone();
            thread::spawn(move || {
                let mut storage = SqliteStorage::new(&db_path).unwrap();
                let token = ClaimToken::generate();
                let mut claimed = Vec::new();
                loop {
                    let batch = claim_batch(&mut storage, &token, 7, false).unwrap();
                    if batch.is_empty() {
                        break;
                    }
                    claimed.extend(batch.into_iter().map(|item| item.id));
                }
                (token, claimed)
            })
        })
        .collect();

    let results: Vec<(ClaimToken, Vec<i64>)> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    let mut seen = HashSet::new();
    for (_, ids) in &results {
        for id in ids {
            assert!(seen.insert(*id), "item {} was claimed twice", id);
        }
    }
    assert_eq!(seen.len(), 200);

    // Every stored claim belongs to the claimer that reported it
    let storage = SqliteStorage::new(&db_path).unwrap();
    for (token, ids) in &results {
        for id in ids {
            let item = storage.get_item(*id).unwrap();
            assert_eq!(item.status, ItemStatus::Processing);
            assert_eq!(item.claim_token.as_deref(), Some(token.as_str()));
        }
    }
}

#[test]
fn test_dedupe_across_connections() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("queue.db");

    let mut first = SqliteStorage::new(&db_path).unwrap();
    let mut second = SqliteStorage::new(&db_path).unwrap();
    let url = ["https://shop.example.com/"];

    assert_eq!(add_urls(&mut first, url, &EnqueueRequest::default()).unwrap(), 1);
    assert_eq!(add_urls(&mut second, url, &EnqueueRequest::default()).unwrap(), 0);

    // Once claimed the URL is still active, so it is not re-enqueued
    claim_batch(&mut first, &ClaimToken::generate(), 1, false).unwrap();
    assert_eq!(add_urls(&mut second, url, &EnqueueRequest::default()).unwrap(), 0);
}
