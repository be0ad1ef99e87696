//! Queue operations built on top of a [`QueueStore`](crate::storage::QueueStore)
//!
//! - Enqueuer: `add_urls`, `add_urls_chunked`, `clear_pending`
//! - Claimer: `claim_batch` with a run-scoped `ClaimToken`
//! - Status reporter: `get_status`
//! - Maintenance: `requeue_failed`, `release_stale_claims`

mod claimer;
mod enqueuer;
mod maintenance;
mod status;

pub use claimer::{claim_batch, ClaimToken};
pub use enqueuer::{
    add_urls, add_urls_chunked, clear_pending, EnqueueRequest, DEFAULT_CHUNK_SIZE,
};
pub use maintenance::{release_stale_claims, requeue_failed, RetryPolicy};
pub use status::{get_status, QueueStatus};
