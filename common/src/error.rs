use thiserror::Error;

/// Errors produced while classifying and normalizing scope targets.
///
/// Every variant is an input-validation failure discovered at construction
/// time; there are no transient conditions and nothing here is retryable.
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("invalid target {input:?}: {reason}")]
    Validation { input: String, reason: String },

    #[error("invalid blacklist regex {pattern:?}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl ScopeError {
    pub fn validation(input: impl Into<String>, reason: impl Into<String>) -> Self {
        ScopeError::Validation {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScopeError>;
