//! Errors for identifier parsing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdError {
    #[error("malformed identifier: {0:?}")]
    Malformed(String),
}
