use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("identity error: {0}")]
    Identity(String),

    #[error("store error: {0}")]
    Store(#[from] pact_store::StoreError),

    #[error("sync error: {0}")]
    Sync(#[from] pact_sync::SyncError),

    #[error("vote error: {0}")]
    Vote(#[from] pact_vote::VoteError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
