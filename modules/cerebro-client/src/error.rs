use thiserror::Error;

pub type Result<T> = std::result::Result<T, CerebroError>;

#[derive(Debug, Error)]
pub enum CerebroError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    /// Cerebro answered 2xx but put an error in the envelope.
    #[error("Cerebro rejected the request ({code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("Cerebro returned neither a summary nor an error")]
    EmptyEnvelope,
}

impl From<crate::types::ErrorData> for CerebroError {
    fn from(err: crate::types::ErrorData) -> Self {
        CerebroError::Rejected {
            code: err.code,
            message: err.message,
        }
    }
}

impl From<reqwest::Error> for CerebroError {
    fn from(err: reqwest::Error) -> Self {
        CerebroError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for CerebroError {
    fn from(err: serde_json::Error) -> Self {
        CerebroError::Parse(err.to_string())
    }
}
