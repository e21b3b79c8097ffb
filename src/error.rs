use azure_core::error::ErrorKind;
use azure_core::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LottoError {
    #[error("Invalid draw date: '{input}'")]
    InvalidDrawDate { input: String },

    #[error("Invalid number list: '{input}'")]
    InvalidNumbers { input: String },

    #[error("Invalid filter expression: {reason}")]
    InvalidFilter { reason: String },

    #[error("Entity already exists: PartitionKey={partition_key}, RowKey={row_key}")]
    Conflict {
        partition_key: String,
        row_key: String,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Table storage error: {0}")]
    Storage(#[from] azure_core::Error),

    #[error("Lotto API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LottoError {
    /// Whether an outer layer may reasonably retry the failed call.
    /// Nothing in this crate retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            LottoError::Storage(err) => match err.kind() {
                ErrorKind::HttpResponse { status, .. } => matches!(
                    *status,
                    StatusCode::RequestTimeout
                        | StatusCode::TooManyRequests
                        | StatusCode::InternalServerError
                        | StatusCode::BadGateway
                        | StatusCode::ServiceUnavailable
                        | StatusCode::GatewayTimeout
                ),
                ErrorKind::Io => true,
                _ => false,
            },
            LottoError::Http(err) => !err.status().is_some_and(|s| s.is_client_error()),
            _ => false,
        }
    }

    /// HTTP status reported by the table service, if the fault carried one.
    pub fn storage_status(&self) -> Option<StatusCode> {
        match self {
            LottoError::Storage(err) => match err.kind() {
                ErrorKind::HttpResponse { status, .. } => Some(*status),
                _ => None,
            },
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LottoError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_error(status: StatusCode) -> LottoError {
        azure_core::Error::message(
            ErrorKind::HttpResponse {
                status,
                error_code: None,
            },
            "table service error",
        )
        .into()
    }

    #[test]
    fn test_storage_status_is_kept() {
        let err = storage_error(StatusCode::ServiceUnavailable);
        assert_eq!(err.storage_status(), Some(StatusCode::ServiceUnavailable));
        assert_eq!(LottoError::Cancelled.storage_status(), None);
    }

    #[test]
    fn test_retryable_storage_faults() {
        assert!(storage_error(StatusCode::ServiceUnavailable).is_retryable());
        assert!(storage_error(StatusCode::TooManyRequests).is_retryable());
        assert!(!storage_error(StatusCode::Forbidden).is_retryable());
        assert!(!storage_error(StatusCode::NotFound).is_retryable());
    }

    #[test]
    fn test_only_transport_faults_are_retryable() {
        assert!(!LottoError::Cancelled.is_retryable());
        assert!(!LottoError::NotFound("none".into()).is_retryable());
        assert!(!LottoError::Conflict {
            partition_key: "p".into(),
            row_key: "r".into(),
        }
        .is_retryable());
    }

    #[test]
    fn test_not_found_message_is_passed_through() {
        let err = LottoError::NotFound("Couldn't retrieve the latest draw results.".into());
        assert_eq!(err.to_string(), "Couldn't retrieve the latest draw results.");
    }
}
