//! Claimer: moves the next eligible batch from pending to processing

use crate::state::ItemStatus;
use crate::storage::{QueueItem, QueueStore, StorageResult};
use chrono::Utc;
use std::fmt;
use uuid::Uuid;

/// Opaque token identifying the run that owns a claim
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClaimToken(String);

impl ClaimToken {
    /// Generates a fresh random token
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ClaimToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl fmt::Display for ClaimToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Claims up to `max_items` eligible pending items for `token`
///
/// Candidates are pending items whose `not_before` has passed (or any
/// pending item when `ignore_delay` is set), taken in priority-desc, id-asc
/// order. Each candidate is then claimed with a conditional update that only
/// succeeds while the item is still pending, so when several claimers race
/// on the same rows each row has exactly one winner. Rows lost to another
/// claimer are silently left out.
///
/// # Returns
///
/// The items actually claimed, in claim order. An empty batch means no work
/// is currently available.
pub fn claim_batch(
    store: &mut dyn QueueStore,
    token: &ClaimToken,
    max_items: usize,
    ignore_delay: bool,
) -> StorageResult<Vec<QueueItem>> {
    if max_items == 0 {
        return Ok(Vec::new());
    }

    let candidates = store.select_eligible(Utc::now(), ignore_delay, max_items)?;
    let mut claimed = Vec::with_capacity(candidates.len());

    for mut item in candidates {
        if !store.claim_item(item.id, token.as_str())? {
            tracing::debug!("Item {} was claimed by another worker", item.id);
            continue;
        }

        let now = Utc::now();
        item.status = ItemStatus::Processing;
        item.claim_token = Some(token.to_string());
        item.claimed_at = Some(now);
        item.updated_at = now;
        claimed.push(item);
    }

    tracing::debug!(
        "Claimed {} item(s) for run {} (requested {})",
        claimed.len(),
        token,
        max_items
    );

    Ok(claimed)
}
