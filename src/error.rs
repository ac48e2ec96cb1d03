//! Error types for filter compilation.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The filter document does not have a shape the compiler understands.
    #[error("invalid filter expression at {path}: {reason}")]
    InvalidFilterExpression { path: String, reason: String },

    #[error("filter nesting exceeds maximum depth of {max}")]
    DepthExceeded { max: usize },
}

impl Error {
    pub fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidFilterExpression {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
