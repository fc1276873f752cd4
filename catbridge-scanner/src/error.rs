use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Page not found: {0}")]
    PageNotFound(String),

    #[error("Title is ambiguous (disambiguation page): {0}")]
    DisambiguationAmbiguous(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("MediaWiki API error [{code}]: {info}")]
    ApiError { code: String, info: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid mode '{0}' (expected -m, -p or -l)")]
    InvalidMode(String),

    #[error("Invalid {option} '{value}' (expected {expected})")]
    InvalidOption {
        option: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Invalid node identity mode '{0}' (expected url or name)")]
    InvalidNodeIdentityMode(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Crawl of {portal} incomplete: deadline of {elapsed:?} exceeded")]
    CrawlIncomplete { portal: String, elapsed: Duration },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ScanError {
    /// True for network, HTTP, API and decoding failures.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ScanError::HttpError(_)
                | ScanError::HttpStatus { .. }
                | ScanError::ApiError { .. }
                | ScanError::ParseError(_)
        )
    }

    /// True for a page that cannot be resolved to exactly one article.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            ScanError::PageNotFound(_) | ScanError::DisambiguationAmbiguous(_)
        )
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ScanError::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ScanError::HttpStatus { status, .. } => {
                matches!(status, 408 | 429 | 502 | 503 | 504)
            }
            ScanError::ApiError { code, .. } => code == "ratelimited" || code == "maxlag",
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_errors_are_not_transport() {
        let err = ScanError::PageNotFound("Foo".to_string());
        assert!(err.is_resolution());
        assert!(!err.is_transport());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_rate_limit_status_is_retryable() {
        let err = ScanError::HttpStatus {
            status: 429,
            url: "http://wiki/api.php".to_string(),
        };
        assert!(err.is_transport());
        assert!(err.is_retryable());

        let err = ScanError::HttpStatus {
            status: 404,
            url: "http://wiki/api.php".to_string(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_invalid_option_names_the_option() {
        let err = ScanError::InvalidOption {
            option: "graph format",
            value: "svg".to_string(),
            expected: "json or dot",
        };
        assert_eq!(err.to_string(), "Invalid graph format 'svg' (expected json or dot)");
        assert!(!err.is_transport());
    }

    #[test]
    fn test_maxlag_api_error_is_retryable() {
        let err = ScanError::ApiError {
            code: "maxlag".to_string(),
            info: "Waiting for replica".to_string(),
        };
        assert!(err.is_retryable());
    }
}
