//! Enqueuer: inserts URLs as pending queue items

use crate::storage::{NewItem, QueueStore, StorageResult};
use chrono::{DateTime, Utc};

/// Default number of URLs per insert transaction in [`add_urls_chunked`]
pub const DEFAULT_CHUNK_SIZE: usize = 200;

/// Parameters shared by every URL in one enqueue call
#[derive(Debug, Clone, PartialEq)]
pub struct EnqueueRequest {
    /// Logical partition (e.g. a store or tenant id)
    pub scope_id: i64,

    /// Higher priorities are claimed first
    pub priority: i64,

    /// Items are not eligible for claiming before this time
    pub not_before: Option<DateTime<Utc>>,

    /// Skip URLs that already have a pending or processing item
    pub dedupe: bool,
}

impl Default for EnqueueRequest {
    fn default() -> Self {
        Self {
            scope_id: 0,
            priority: 0,
            not_before: None,
            dedupe: true,
        }
    }
}

/// Adds URLs to the queue
///
/// URLs are trimmed; empty or whitespace-only entries are dropped silently.
/// With `dedupe`, a URL is skipped when a pending or processing item already
/// exists for it, which also collapses duplicates within `urls`. Without it
/// every non-empty URL becomes a new item.
///
/// # Returns
///
/// The number of items actually inserted
pub fn add_urls<I, U>(
    store: &mut dyn QueueStore,
    urls: I,
    request: &EnqueueRequest,
) -> StorageResult<usize>
where
    I: IntoIterator<Item = U>,
    U: AsRef<str>,
{
    let items: Vec<NewItem> = urls
        .into_iter()
        .filter_map(|url| {
            let url = url.as_ref().trim();
            if url.is_empty() {
                return None;
            }
            Some(NewItem {
                url: url.to_string(),
                scope_id: request.scope_id,
                priority: request.priority,
                not_before: request.not_before,
            })
        })
        .collect();

    if items.is_empty() {
        return Ok(0);
    }

    let inserted = store.insert_items(&items, request.dedupe)?;
    tracing::debug!(
        "Enqueued {} of {} URL(s) (scope {}, priority {})",
        inserted,
        items.len(),
        request.scope_id,
        request.priority
    );
    Ok(inserted)
}

/// Adds URLs in chunks of `chunk_size`, one transaction per chunk
///
/// Keeps each write transaction short when a producer hands over a large
/// sitemap-sized list.
pub fn add_urls_chunked<U: AsRef<str>>(
    store: &mut dyn QueueStore,
    urls: &[U],
    request: &EnqueueRequest,
    chunk_size: usize,
) -> StorageResult<usize> {
    let mut inserted = 0;
    for chunk in urls.chunks(chunk_size.max(1)) {
        inserted += add_urls(store, chunk, request)?;
    }
    tracing::info!("Enqueued {} URL(s) from {} candidates", inserted, urls.len());
    Ok(inserted)
}

/// Deletes every pending and processing item
///
/// Used to reset the queue before a fresh build. Done and failed items are kept.
pub fn clear_pending(store: &mut dyn QueueStore) -> StorageResult<u64> {
    let deleted = store.delete_active()?;
    tracing::info!("Cleared {} pending/processing item(s)", deleted);
    Ok(deleted)
}
