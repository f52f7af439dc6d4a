//! Error types for the Veeam provider.

use thiserror::Error;

/// Errors that can occur while serving provider requests.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested object was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP request to the Veeam server could not be completed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Veeam server answered with an unclassified error status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// Resource already exists (create conflict).
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied (authentication/authorization failure).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Quota or rate limit exceeded.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Service temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Operation timed out.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Operation failed due to current state (precondition not met).
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Operation not implemented.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// Invalid request from client.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Classify a non-success HTTP status returned by a Veeam REST API.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 | 422 => Self::InvalidRequest(message),
            401 | 403 => Self::PermissionDenied(message),
            404 => Self::NotFound(message),
            409 => Self::AlreadyExists(message),
            429 => Self::ResourceExhausted(message),
            503 => Self::Unavailable(message),
            504 => Self::DeadlineExceeded(message),
            _ => Self::Api { status, message },
        }
    }

    /// Whether this error means the remote object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Get the error message as a string.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::AlreadyExists(msg)
            | Self::PermissionDenied(msg)
            | Self::ResourceExhausted(msg)
            | Self::Unavailable(msg)
            | Self::DeadlineExceeded(msg)
            | Self::FailedPrecondition(msg)
            | Self::Unimplemented(msg)
            | Self::InvalidRequest(msg) => msg,
            Self::Api { message, .. } => message,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Http(_err) => "http error (see Debug output)",
        }
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(msg) => tonic::Status::not_found(msg),
            ProviderError::Validation(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::Configuration(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::UnknownResource(msg) => tonic::Status::not_found(msg),
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            },
            ProviderError::Http(err) => {
                tonic::Status::unavailable(format!("HTTP error: {}", err))
            },
            ProviderError::Api { status, message } => {
                tonic::Status::unknown(format!("API error ({}): {}", status, message))
            },
            ProviderError::AlreadyExists(msg) => tonic::Status::already_exists(msg),
            ProviderError::PermissionDenied(msg) => tonic::Status::permission_denied(msg),
            ProviderError::ResourceExhausted(msg) => tonic::Status::resource_exhausted(msg),
            ProviderError::Unavailable(msg) => tonic::Status::unavailable(msg),
            ProviderError::DeadlineExceeded(msg) => tonic::Status::deadline_exceeded(msg),
            ProviderError::FailedPrecondition(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::Unimplemented(msg) => tonic::Status::unimplemented(msg),
            ProviderError::InvalidRequest(msg) => tonic::Status::invalid_argument(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("repository 7f1c".to_string());
        assert_eq!(format!("{}", err), "Resource not found: repository 7f1c");

        let err = ProviderError::UnknownResource("veeam_azure_vm".to_string());
        assert_eq!(format!("{}", err), "Unknown resource type: veeam_azure_vm");

        let err = ProviderError::Api {
            status: 500,
            message: "Internal failure".to_string(),
        };
        assert_eq!(format!("{}", err), "API error (500): Internal failure");
    }

    #[test]
    fn test_from_status_classification() {
        assert!(matches!(
            ProviderError::from_status(400, "bad"),
            ProviderError::InvalidRequest(_)
        ));
        assert!(matches!(
            ProviderError::from_status(422, "bad"),
            ProviderError::InvalidRequest(_)
        ));
        assert!(matches!(
            ProviderError::from_status(401, "denied"),
            ProviderError::PermissionDenied(_)
        ));
        assert!(matches!(
            ProviderError::from_status(403, "denied"),
            ProviderError::PermissionDenied(_)
        ));
        assert!(ProviderError::from_status(404, "gone").is_not_found());
        assert!(matches!(
            ProviderError::from_status(409, "dup"),
            ProviderError::AlreadyExists(_)
        ));
        assert!(matches!(
            ProviderError::from_status(429, "slow down"),
            ProviderError::ResourceExhausted(_)
        ));
        assert!(matches!(
            ProviderError::from_status(503, "maintenance"),
            ProviderError::Unavailable(_)
        ));
        assert!(matches!(
            ProviderError::from_status(504, "timeout"),
            ProviderError::DeadlineExceeded(_)
        ));
        assert!(matches!(
            ProviderError::from_status(500, "boom"),
            ProviderError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn test_error_to_status() {
        let status: tonic::Status = ProviderError::NotFound("test".to_string()).into();
        assert_eq!(status.code(), tonic::Code::NotFound);

        let status: tonic::Status = ProviderError::Validation("test".to_string()).into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status: tonic::Status = ProviderError::Configuration("test".to_string()).into();
        assert_eq!(status.code(), tonic::Code::FailedPrecondition);

        let status: tonic::Status = ProviderError::from_status(409, "test").into();
        assert_eq!(status.code(), tonic::Code::AlreadyExists);

        let status: tonic::Status = ProviderError::from_status(401, "test").into();
        assert_eq!(status.code(), tonic::Code::PermissionDenied);

        let status: tonic::Status = ProviderError::from_status(502, "test").into();
        assert_eq!(status.code(), tonic::Code::Unknown);
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::NotFound("policy-123".to_string());
        assert_eq!(err.message(), "policy-123");

        let err = ProviderError::from_status(500, "server exploded");
        assert_eq!(err.message(), "server exploded");

        let err = ProviderError::InvalidRequest("bad request".to_string());
        assert_eq!(err.message(), "bad request");
    }
}
