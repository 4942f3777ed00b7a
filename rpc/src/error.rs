//! RPC error type and HTTP status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pact_node::NodeError;
use pact_vote::VoteError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Node(#[from] NodeError),

    #[error("server error: {0}")]
    Server(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl RpcError {
    /// Map the error taxonomy onto HTTP status codes: validation → 400,
    /// authorization/signature → 403, not-found → 404, conflict → 409.
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Node(NodeError::Vote(e)) => match e {
                VoteError::Validation(_) | VoteError::NoCounterpart | VoteError::UnknownType(_) => {
                    StatusCode::BAD_REQUEST
                }
                VoteError::Authorization(_) | VoteError::BadSignature(_) => StatusCode::FORBIDDEN,
                VoteError::NotFound(_) => StatusCode::NOT_FOUND,
                VoteError::Conflict(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Node(NodeError::Config(_) | NodeError::Identity(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "rpc request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "rpc request rejected");
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_errors_map_to_expected_statuses() {
        let cases = [
            (VoteError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (VoteError::NoCounterpart, StatusCode::BAD_REQUEST),
            (VoteError::Authorization("x".into()), StatusCode::FORBIDDEN),
            (VoteError::BadSignature("x".into()), StatusCode::FORBIDDEN),
            (VoteError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (VoteError::Conflict("x".into()), StatusCode::CONFLICT),
        ];
        for (vote_error, expected) in cases {
            let rpc_error = RpcError::Node(NodeError::Vote(vote_error));
            assert_eq!(rpc_error.status(), expected);
        }
    }
}
