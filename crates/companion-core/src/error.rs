//! Errors raised at the adapter boundary.
//!
//! These never reach the presentation layer as errors: adapters turn them into
//! assistant-authored text via [`ProviderError::user_message`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("unsupported provider: {0}")]
    Unsupported(String),
}

impl ProviderError {
    /// Text shown in place of an answer when a backend call fails.
    pub fn user_message(&self) -> String {
        format!("Sorry, an error occurred: {self}")
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Malformed(err.to_string())
    }
}

pub type Result<T, E = ProviderError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_describes_failure() {
        let err = ProviderError::Api {
            status: 401,
            body: "invalid api key".to_string(),
        };
        assert_eq!(
            err.user_message(),
            "Sorry, an error occurred: API error 401: invalid api key"
        );
    }

    #[test]
    fn test_json_errors_are_malformed() {
        let err: ProviderError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }
}
