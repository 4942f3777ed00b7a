use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("checkpoint io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint is corrupt: {0}")]
    Corrupt(String),

    #[error("unsupported checkpoint version: {0}")]
    UnsupportedVersion(u16),

    #[error("serialization error: {0}")]
    Serialization(String),
}
