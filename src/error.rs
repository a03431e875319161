// Error taxonomy surfaced to the API layer
use thiserror::Error;

/// Errors produced by the telemetry core. `Clone` so a single failed
/// fetch can resolve every caller coalesced onto the same pending fetch.
///
/// An empty result set is not an error: operations return `Ok(vec![])`
/// so callers can distinguish "no data" from "fetch failed".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TelemetryError {
    /// Rejected before any backing-store call: malformed identity,
    /// zero target budget, negative window duration.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The backing store failed (timeout, connection, query error).
    /// Never cached; the next call retries fresh.
    #[error("backing store unavailable: {0}")]
    StoreUnavailable(String),
}
