//! State module for tracking queue item lifecycle
//!
//! # Components
//!
//! - `ItemStatus`: the four statuses a queue item moves through (pending, processing, done, failed)

mod item_status;

pub use item_status::ItemStatus;
