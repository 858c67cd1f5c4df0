//! Observable query execution events
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable events during plan execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Execution configuration loaded
    ConfigLoaded,

    // Query lifecycle
    /// Runner created for a plan
    QueryBegin,
    /// Plan reached EOF
    QueryComplete,
    /// Plan failed
    QueryFailed,

    // Yield protocol
    /// Plan state saved before a yield
    PlanYield,
    /// Plan state restored after a yield
    PlanUnyield,
    /// A record location is about to become invalid
    LocationInvalidated,

    // Merge sort
    /// Buffered record materialized because its location was invalidated
    ForcedFetch,
    /// Buffered record dropped because it could not be materialized
    BufferedRecordDropped,
    /// Record suppressed as a duplicate location
    DuplicateDropped,
    /// A child produced a key out of order
    SortOrderViolation,

    // Fetch
    /// Record deleted between index scan and fetch
    FetchMissingRecord,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::QueryBegin => "QUERY_BEGIN",
            Event::QueryComplete => "QUERY_COMPLETE",
            Event::QueryFailed => "QUERY_FAILED",
            Event::PlanYield => "PLAN_YIELD",
            Event::PlanUnyield => "PLAN_UNYIELD",
            Event::LocationInvalidated => "LOCATION_INVALIDATED",
            Event::ForcedFetch => "FORCED_FETCH",
            Event::BufferedRecordDropped => "BUFFERED_RECORD_DROPPED",
            Event::DuplicateDropped => "DUPLICATE_DROPPED",
            Event::SortOrderViolation => "SORT_ORDER_VIOLATION",
            Event::FetchMissingRecord => "FETCH_MISSING_RECORD",
        }
    }

    /// Returns true if this event ends the query
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::QueryFailed | Event::SortOrderViolation)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
