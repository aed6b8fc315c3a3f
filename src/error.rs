//! Error taxonomy for image operations
//!
//! Every store and handler operation returns `Result<_, ImageError>`; the
//! status code for each variant is decided here and nowhere else.

use hyper::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    /// Malformed or empty request
    #[error("{0}")]
    ClientError(String),

    #[error("Request body too large (max {max} bytes)")]
    PayloadTooLarge { max: u64 },

    /// Requested or required resource is absent
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("failed to build archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ImageError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::ClientError(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Io(_) | Self::Archive(_) | Self::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Unexpected failures whose detail stays server-side
    pub fn is_internal(&self) -> bool {
        self.status().is_server_error()
    }
}
