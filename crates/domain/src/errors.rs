use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Invalid domain name: {0}")]
    InvalidDomainName(String),

    #[error("Invalid DNS response: {0}")]
    InvalidResponse(String),

    #[error("Name compression pointer loop")]
    CompressionLoop,

    #[error("Name compression pointer out of range: offset {0}")]
    CompressionOutOfRange(usize),

    #[error("Failed to send query to {server}: {detail}")]
    SendFailed { server: String, detail: String },

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Client is not running")]
    NotStarted,
}
