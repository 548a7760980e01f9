//! Error types shared across GreenSub crates.

/// Top-level error type for GreenSub operations.
///
/// Variants follow the job lifecycle: `Validation` errors are raised before
/// any engine process exists, `Configuration`, `Runtime`, `Cancelled` and
/// `Stalled` come from the process runner, and `Busy` from the media facade.
#[derive(Debug, thiserror::Error)]
pub enum GreensubError {
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Engine configuration error: {message}")]
    Configuration { message: String },

    #[error("Engine failed with {}: {excerpt}", describe_exit(*.code))]
    Runtime { code: Option<i32>, excerpt: String },

    #[error("Job cancelled")]
    Cancelled,

    #[error("Engine made no progress for {idle_secs}s")]
    Stalled { idle_secs: u64 },

    #[error("A render is already in progress")]
    Busy,

    #[error("Invalid job state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using GreensubError.
pub type GreensubResult<T> = Result<T, GreensubError>;

impl GreensubError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    pub fn runtime(code: Option<i32>, excerpt: impl Into<String>) -> Self {
        Self::Runtime {
            code,
            excerpt: excerpt.into(),
        }
    }

    /// Whether this error should be reported to the user as a failed job.
    ///
    /// Cancellation is an explicit user decision and is not a failure.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    /// Whether the error was raised before any engine process was started.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no exit status".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_field() {
        let err = GreensubError::validation("style.font_size", "must be between 1 and 512");
        assert_eq!(
            err.to_string(),
            "Invalid style.font_size: must be between 1 and 512"
        );
        assert!(err.is_validation());
    }

    #[test]
    fn test_runtime_message_carries_excerpt() {
        let err = GreensubError::runtime(Some(1), "Unknown encoder 'foo'");
        assert_eq!(
            err.to_string(),
            "Engine failed with status 1: Unknown encoder 'foo'"
        );

        let unknown = GreensubError::runtime(None, "reading engine progress failed");
        assert_eq!(
            unknown.to_string(),
            "Engine failed with no exit status: reading engine progress failed"
        );
        assert!(!unknown.to_string().contains("signal"));
    }

    #[test]
    fn test_cancelled_is_not_a_failure() {
        assert!(!GreensubError::Cancelled.is_failure());
        assert!(GreensubError::Busy.is_failure());
        assert!(GreensubError::Stalled { idle_secs: 30 }.is_failure());
    }
}
