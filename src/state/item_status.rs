/// Queue item status definitions
///
/// An item moves `Pending -> Processing -> Done | Failed`. The two terminal
/// states are never left during normal operation.
use std::fmt;

/// Represents the current status of a queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemStatus {
    /// Waiting to be claimed
    Pending,

    /// Claimed by a run and currently being fetched
    Processing,

    /// Fetched with a 2xx/3xx response
    Done,

    /// Fetch failed (non-2xx/3xx status, transport error or timeout)
    Failed,
}

impl ItemStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [ItemStatus; 4] = [
        ItemStatus::Pending,
        ItemStatus::Processing,
        ItemStatus::Done,
        ItemStatus::Failed,
    ];

    /// Returns true if no further automatic transition happens from this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true for statuses that still count as queued work (used by dedupe)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
