use thiserror::Error;

/// Result type local to riffle-mem.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("memory limit exceeded for tracker '{label}': consumed {consumed} bytes, limit {limit}")]
    LimitExceeded {
        label: String,
        consumed: i64,
        limit: i64,
    },

    #[error("tracker error: {0}")]
    Tracker(String),

    #[error("spill storage error: {0}")]
    Storage(String),

    #[error("unsupported codec: {0}")]
    CodecUnsupported(&'static str),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("checksum mismatch")]
    ChecksumMismatch,
}
