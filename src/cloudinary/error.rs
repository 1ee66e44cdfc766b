use thiserror::Error;

/// Typed API errors enabling rate-limit classification.
///
/// The `is_rate_limit()` method lets the lister distinguish a quota abort
/// (recoverable via the partial cache) from other listing failures, which
/// degrade to an empty result instead.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP {status} from {endpoint}: {detail}")]
    Status {
        status: u16,
        endpoint: String,
        detail: String,
    },

    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response from {endpoint}: {detail}")]
    Payload { endpoint: String, detail: String },
}

impl ApiError {
    pub fn http(endpoint: &str, source: reqwest::Error) -> Self {
        Self::Http {
            endpoint: endpoint.to_string(),
            source,
        }
    }

    /// Whether this error is the provider's hourly-quota rejection.
    ///
    /// Cloudinary answers admin-API quota exhaustion with HTTP 420 (legacy)
    /// or 429; some proxies rewrite the status, so the body text is checked
    /// as a fallback.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            ApiError::Status { status, detail, .. } => {
                matches!(status, 420 | 429) || detail.to_lowercase().contains("rate limit")
            }
            _ => false,
        }
    }
}
