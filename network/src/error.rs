use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("no open channel for peer {0}")]
    NotConnected(String),

    #[error("channel to peer {0} is closed")]
    ChannelClosed(String),

    #[error("channel to peer {0} is full (backpressure)")]
    Backpressure(String),
}
