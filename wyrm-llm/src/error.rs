//! Provider error type.

use thiserror::Error;

/// Errors from model providers.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP or network request failed.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// Provider rate-limited the request.
    #[error("rate limited")]
    RateLimited,

    /// Authentication/authorization failed.
    #[error("auth failed: {0}")]
    AuthFailed(String),

    /// Could not parse the provider's response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A structured response did not match the requested schema.
    #[error("response does not match schema '{schema}': {message}")]
    StructuredParse {
        /// Name of the schema that failed to validate.
        schema: String,
        /// Parse or validation failure detail.
        message: String,
    },

    /// The requested provider is not supported.
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Failure driving an external agentic backend.
    #[error("agentic backend error: {0}")]
    Agentic(String),
}

impl LlmError {
    /// Whether retrying this request might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::RateLimited | LlmError::RequestFailed(_))
    }
}

/// Map a reqwest transport error into an [`LlmError`].
pub(crate) fn map_transport_error(err: reqwest::Error) -> LlmError {
    LlmError::RequestFailed(err.to_string())
}

/// Map a non-success HTTP status into an [`LlmError`].
pub(crate) fn map_http_status(status: reqwest::StatusCode, body: &str) -> LlmError {
    match status.as_u16() {
        401 | 403 => LlmError::AuthFailed(body.to_string()),
        429 => LlmError::RateLimited,
        _ => LlmError::RequestFailed(format!("HTTP {status}: {body}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(LlmError::RateLimited.is_retryable());
        assert!(LlmError::RequestFailed("timeout".into()).is_retryable());
        assert!(!LlmError::AuthFailed("bad key".into()).is_retryable());
        assert!(
            !LlmError::StructuredParse {
                schema: "Foo".into(),
                message: "x".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn structured_parse_names_the_schema() {
        let err = LlmError::StructuredParse {
            schema: "HeapReport".into(),
            message: "missing field".into(),
        };
        assert!(err.to_string().contains("HeapReport"));
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            map_http_status(reqwest::StatusCode::TOO_MANY_REQUESTS, ""),
            LlmError::RateLimited
        ));
        assert!(matches!(
            map_http_status(reqwest::StatusCode::UNAUTHORIZED, "no key"),
            LlmError::AuthFailed(_)
        ));
        assert!(matches!(
            map_http_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            LlmError::RequestFailed(_)
        ));
    }
}
