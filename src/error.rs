use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// `success: false` from the server, carrying its message.
    #[error("{0}")]
    Api(String),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("not signed in")]
    NotSignedIn,
    #[error("task text is empty")]
    EmptyTask,
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
