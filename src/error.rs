use crate::model::BugId;

#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("vector dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("report {bg_number} has no {vector} vector")]
    MissingVector {
        bg_number: BugId,
        vector: &'static str,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum VectorCodecError {
    #[error("vector blob is empty")]
    Empty,

    #[error("unexpected vector blob tag {found:#04x}, expected {expected:#04x}")]
    UnexpectedTag { expected: u8, found: u8 },

    #[error("vector blob truncated: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("sparse index {index} out of order or outside dimension {dimension}")]
    InvalidIndex { index: u32, dimension: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store write failed during {operation} ({pending} pending rows)")]
    Persistence {
        operation: &'static str,
        pending: usize,
        #[source]
        source: rusqlite::Error,
    },

    #[error("store query failed")]
    Query(#[from] rusqlite::Error),

    #[error("report {bg_number} is invalid: {reason}")]
    InvalidRecord { bg_number: BugId, reason: String },

    #[error("report {bg_number} carries an undecodable {vector} vector")]
    Codec {
        bg_number: BugId,
        vector: &'static str,
        #[source]
        source: VectorCodecError,
    },

    #[error("failed to encode stored payload")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    /// Write failures leave the caller's data intact and may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }
}
