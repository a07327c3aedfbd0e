use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid base URL: {0}")]
    InvalidUrl(String),

    #[error("Not signed in")]
    SignedOut,

    #[error("User not found")]
    NotFound,

    /// Any other non-success status, with the `error` field of the body when present
    #[error("Unexpected status {status}: {message}")]
    Status { status: StatusCode, message: String },
}
