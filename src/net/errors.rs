use thiserror::Error;

#[derive(Debug, PartialEq, Error)]
pub enum ParseError {
    #[error("Truncated buffer: expected {expected} bytes, actual {actual} bytes")]
    Truncated { expected: usize, actual: usize },

    #[error("Bad checksum: {0}")]
    BadChecksum(String),

    #[error("Unsupported field: {0}")]
    Unsupported(String),
}
