/// Lifecycle definitions for units of crawl work
use std::fmt;

/// Represents the current state of one unit of work in a stage
///
/// Every item moves `Pending → Fetching → Parsed → Persisted`, or ends in
/// `Failed`/`Cancelled`. Only `Persisted` items are checkpointed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemState {
    /// Not yet handed to a worker
    Pending,

    /// A worker is fetching its pages
    Fetching,

    /// Pages fetched and parsed, not yet durable
    Parsed,

    /// Data written and checkpoint recorded
    Persisted,

    /// Fetch, parse or persist failed; retried next run
    Failed,

    /// Never started because the run was interrupted
    Cancelled,
}

impl ItemState {
    /// Returns true if no further processing happens in this run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Persisted | Self::Failed | Self::Cancelled)
    }

    /// Returns true if the item will be picked up again by the next run
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Persisted)
    }

    /// Converts the state to its ledger string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Parsed => "parsed",
            Self::Persisted => "persisted",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a state from its ledger string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "fetching" => Some(Self::Fetching),
            "parsed" => Some(Self::Parsed),
            "persisted" => Some(Self::Persisted),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
