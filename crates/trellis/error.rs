use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrellisError {
    #[error("index {index} out of range for length {len}")]
    OutOfRange { index: usize, len: usize },
    #[error("key not found: {0}")]
    NotFound(String),
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    #[error("collection was modified; iteration cannot continue")]
    ConcurrentModification,
    #[error("iterator was disposed")]
    IteratorDisposed,
}

impl TrellisError {
    pub(crate) fn out_of_range(index: usize, len: usize) -> Self {
        TrellisError::OutOfRange { index, len }
    }
}
