use reqwest::StatusCode;
use shared::mutation::MutationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ListStoreError {
    #[error("invalid list store url: {0}")]
    InvalidServerUrl(#[from] url::ParseError),
    #[error("list store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("list store answered {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("list store response is not a calendar list: {0}")]
    MalformedResponse(#[from] serde_json::Error),
    #[error(transparent)]
    Mutation(#[from] MutationError),
}

impl ListStoreError {
    /// Failures of the round trip itself. A malformed answer counts as one.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ListStoreError::Transport(_)
                | ListStoreError::Status { .. }
                | ListStoreError::MalformedResponse(_)
        )
    }
}
