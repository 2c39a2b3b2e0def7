use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A documented expectation on a wire field does not hold
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Error::Validation {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
