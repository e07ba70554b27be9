use datafusion::{arrow::error::ArrowError, error::DataFusionError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("DataFusion: {0}")]
    DataFusion(#[from] DataFusionError),

    #[error("Arrow: {0}")]
    Arrow(#[from] ArrowError),

    #[error("Upstream API unavailable: {0}")]
    UpstreamUnavailable(#[from] reqwest::Error),

    #[error("Upstream endpoint '{endpoint}' responded with status {status}")]
    UpstreamStatus { endpoint: String, status: u16 },

    #[error("Upstream endpoint '{endpoint}' responded with 404")]
    UpstreamNotFound { endpoint: String },

    #[error("Upstream response for {resource} is malformed: {message}")]
    UpstreamFormat { resource: String, message: String },

    #[error("Failed to parse URL: {0}")]
    UrlParsingFailed(#[from] url::ParseError),

    #[error("Invalid account data: {message}")]
    InvalidAccount { message: String },

    #[error("Platform '{platform}' not found")]
    UnknownPlatform { platform: String },

    #[error("Invalid field list: {message}")]
    InvalidFieldSpec { message: String },

    #[error("Column '{column}' is not present in the report")]
    UnknownColumn { column: String },

    #[error("CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn format(resource: &str, message: impl Into<String>) -> Self {
        Error::UpstreamFormat {
            resource: resource.to_string(),
            message: message.into(),
        }
    }

    /// Whether the failure was caused by the caller's input rather than
    /// by the upstream source or this process.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownPlatform { .. }
                | Error::InvalidAccount { .. }
                | Error::InvalidFieldSpec { .. }
        )
    }
}
