//! Error types for the capture viewer

use std::time::Duration;
use thiserror::Error;

/// Result type alias using ViewerError
pub type Result<T> = std::result::Result<T, ViewerError>;

pub const STREAM_FAILURE_MESSAGE: &str =
    "Camera access denied. Please allow camera access or use a local server.";

/// Main error type for viewer operations
#[derive(Debug, Error)]
pub enum ViewerError {
    /// The permission prompt was denied or could not be shown
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// No real device label was observed within the enumeration budget
    #[error("Device enumeration incomplete after {attempts} attempts ({elapsed:?})")]
    EnumerationIncomplete { attempts: u32, elapsed: Duration },

    /// A capture stream could not be acquired
    #[error("Stream acquisition failed for {}: {reason}", device_label(.device_id))]
    StreamAcquisitionFailed {
        device_id: Option<String>,
        #[source]
        reason: PlatformError,
    },

    /// Native fullscreen was rejected or is missing
    #[error("Fullscreen unavailable: {0}")]
    FullscreenUnavailable(String),

    /// A loading plan violated its ordering rules
    #[error("Invalid loading plan: {0}")]
    InvalidPlan(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ViewerError {
    /// Only an unresolved enumeration ends the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::EnumerationIncomplete { .. })
    }

    /// Text shown in the overlay for this error
    pub fn user_message(&self) -> String {
        match self {
            Self::StreamAcquisitionFailed { .. } => STREAM_FAILURE_MESSAGE.to_string(),
            Self::EnumerationIncomplete { .. } => {
                "No capture device could be detected. Reload the page to try again.".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_plan(msg: impl Into<String>) -> Self {
        Self::InvalidPlan(msg.into())
    }
}

fn device_label(device_id: &Option<String>) -> &str {
    device_id.as_deref().unwrap_or("default device")
}

/// Rejections reported by the media platform
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("access not allowed")]
    NotAllowed,

    #[error("device not found")]
    NotFound,

    #[error("device busy or unreadable")]
    NotReadable,

    #[error("constraints cannot be satisfied: {0}")]
    OverConstrained(String),

    #[error("capability not supported")]
    Unsupported,

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::{PlatformError, STREAM_FAILURE_MESSAGE, ViewerError};
    use std::time::Duration;

    #[test]
    fn only_enumeration_incomplete_is_fatal() {
        let fatal = ViewerError::EnumerationIncomplete {
            attempts: 5,
            elapsed: Duration::from_secs(2),
        };
        assert!(fatal.is_fatal());

        let others = [
            ViewerError::PermissionDenied("denied".to_string()),
            ViewerError::StreamAcquisitionFailed {
                device_id: Some("cam-a".to_string()),
                reason: PlatformError::NotReadable,
            },
            ViewerError::FullscreenUnavailable("rejected".to_string()),
            ViewerError::config("bad"),
        ];
        assert!(others.iter().all(|err| !err.is_fatal()));
    }

    #[test]
    fn stream_failures_use_the_overlay_message() {
        let err = ViewerError::StreamAcquisitionFailed {
            device_id: None,
            reason: PlatformError::NotAllowed,
        };
        assert_eq!(err.user_message(), STREAM_FAILURE_MESSAGE);
        assert!(err.to_string().contains("default device"));
        assert!(err.to_string().contains("access not allowed"));
    }
}
