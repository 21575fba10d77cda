use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("Request failed: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Malformed stream part: {0}")]
    Decode(String),
}

pub type ChatResult<T> = Result<T, ChatError>;
