//! Error types for the telemetry, capture and lighting pipeline.
//!
//! All errors implement `std::error::Error` and carry enough context to decide
//! whether the failing operation should simply be retried on the next tick.
//!
//! ## Error Categories
//!
//! - **Session Errors**: shared memory segments that are absent or not yet opened
//! - **Decode Errors**: segment contents shorter than the declared struct layout
//! - **State Errors**: display/zone misuse by the caller
//! - **Capture Errors**: failures raised by the capture backend
//! - **Network Errors**: failures raised by the lighting network collaborator
//! - **Configuration Errors**: unreadable or invalid configuration files
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use racelight::SyncError;
//!
//! let error = SyncError::not_connected("Local\\acpmf_physics");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[cfg(windows)]
use windows_core as core;

/// Result type alias for pipeline operations.
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

/// Main error type for pipeline operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SyncError {
    #[error("Shared memory segment {segment} is not connected")]
    NotConnected { segment: &'static str },

    #[error("Failed to open shared memory segment {segment}")]
    SegmentUnavailable {
        segment: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{structure} needs {expected} bytes but only {actual} were available")]
    SizeMismatch { structure: &'static str, expected: usize, actual: usize },

    #[error("Invalid state: {reason}")]
    InvalidState { reason: String },

    #[error("Capture failed: {reason}")]
    Capture {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Lighting network error: {reason}")]
    Network {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Invalid configuration in {context}: {details}")]
    Config { context: String, details: String },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{feature} is only available on {required_platform}")]
    UnsupportedPlatform { feature: String, required_platform: String },

    #[error("Windows API error: {operation}")]
    #[cfg(windows)]
    WindowsApi {
        operation: String,
        #[source]
        source: core::Error,
    },
}

impl SyncError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::NotConnected { .. } => true,
            SyncError::SegmentUnavailable { .. } => true,
            SyncError::SizeMismatch { .. } => true,
            SyncError::Timeout { .. } => true,
            SyncError::Network { .. } => true,
            SyncError::Capture { .. } => false,
            SyncError::InvalidState { .. } => false,
            SyncError::Config { .. } => false,
            SyncError::File { .. } => false,
            SyncError::UnsupportedPlatform { .. } => false,
            #[cfg(windows)]
            SyncError::WindowsApi { .. } => true,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            SyncError::NotConnected { .. } | SyncError::SegmentUnavailable { .. } => vec![
                "Ensure the simulator is running and a session is loaded",
                "Wait for the retry timer to reopen the segments",
                "Check that the session manager has been started",
            ],
            SyncError::SizeMismatch { .. } => vec![
                "Check the simulator version matches the expected memory layout",
                "Wait for the next poll to read a complete snapshot",
            ],
            SyncError::InvalidState { .. } => vec![
                "Select a display before creating a capture zone",
                "Create a capture zone before capturing frames",
                "Keep the capture zone inside the display bounds",
            ],
            SyncError::Capture { .. } => vec![
                "Check the selected display is still attached",
                "Reselect the display to recreate the capture session",
                "Close applications holding exclusive fullscreen",
            ],
            SyncError::Network { .. } => vec![
                "Check the lighting server is reachable",
                "Verify the target room identifiers",
            ],
            SyncError::Timeout { .. } => vec![
                "Increase the send timeout",
                "Check network latency to the lighting server",
            ],
            SyncError::Config { .. } => vec![
                "Check the configuration file against the documented keys",
                "Remove the offending key to fall back to its default",
            ],
            SyncError::File { .. } => vec![
                "Check the file exists and is readable",
                "Check file permissions",
            ],
            SyncError::UnsupportedPlatform { .. } => vec![
                "Use platform-appropriate features",
                "Check documentation for platform requirements",
            ],
            #[cfg(windows)]
            SyncError::WindowsApi { .. } => vec![
                "Check Windows API permissions",
                "Verify system resources availability",
            ],
        }
    }

    /// Helper constructor for reads against a segment that is not open.
    pub fn not_connected(segment: &'static str) -> Self {
        SyncError::NotConnected { segment }
    }

    /// Helper constructor for segment open failures.
    pub fn segment_unavailable(segment: impl Into<String>) -> Self {
        SyncError::SegmentUnavailable { segment: segment.into(), source: None }
    }

    /// Helper constructor for segment open failures with source.
    pub fn segment_unavailable_with_source(
        segment: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        SyncError::SegmentUnavailable { segment: segment.into(), source: Some(source) }
    }

    /// Helper constructor for display/zone misuse.
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        SyncError::InvalidState { reason: reason.into() }
    }

    /// Helper constructor for capture backend failures.
    pub fn capture_failed(reason: impl Into<String>) -> Self {
        SyncError::Capture { reason: reason.into(), source: None }
    }

    /// Helper constructor for network failures.
    pub fn network_failed(reason: impl Into<String>) -> Self {
        SyncError::Network { reason: reason.into(), source: None }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        SyncError::Config { context: context.into(), details: details.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        SyncError::File { path, source }
    }

    /// Helper constructor for Windows API errors.
    #[cfg(windows)]
    pub fn windows_api_error(operation: impl Into<String>, source: core::Error) -> Self {
        SyncError::WindowsApi { operation: operation.into(), source }
    }

    /// Helper constructor for unsupported platform errors.
    pub fn unsupported_platform(
        feature: impl Into<String>,
        required_platform: impl Into<String>,
    ) -> Self {
        SyncError::UnsupportedPlatform {
            feature: feature.into(),
            required_platform: required_platform.into(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Network {
            reason: "Failed to encode lighting payload".to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(windows)]
impl From<core::Error> for SyncError {
    fn from(err: core::Error) -> Self {
        SyncError::WindowsApi { operation: "Unknown Windows operation".to_string(), source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn error_messages_carry_their_context(
            reason in ".*",
            expected in 1usize..4096usize,
            actual in 0usize..4096usize,
        ) {
            let state = SyncError::invalid_state(reason.clone());
            prop_assert!(state.to_string().contains(&reason));

            let capture = SyncError::capture_failed(reason.clone());
            prop_assert!(capture.to_string().contains(&reason));

            let mismatch = SyncError::SizeMismatch { structure: "Physics", expected, actual };
            let msg = mismatch.to_string();
            prop_assert!(msg.contains(&expected.to_string()));
            prop_assert!(msg.contains(&actual.to_string()));
            prop_assert!(msg.contains("Physics"));
        }
    }

    #[test]
    fn retry_classification_matches_taxonomy() {
        assert!(SyncError::not_connected("Local\\acpmf_physics").is_retryable());
        assert!(SyncError::segment_unavailable("Local\\acpmf_static").is_retryable());
        assert!(
            SyncError::SizeMismatch { structure: "Graphics", expected: 296, actual: 12 }
                .is_retryable()
        );
        assert!(!SyncError::invalid_state("no display").is_retryable());
        assert!(!SyncError::config_error("lighting", "bad threshold").is_retryable());
    }

    #[test]
    fn every_variant_has_suggestions() {
        let errors = [
            SyncError::not_connected("Local\\acpmf_graphics"),
            SyncError::invalid_state("no zone"),
            SyncError::capture_failed("lost device"),
            SyncError::network_failed("refused"),
            SyncError::Timeout { duration: Duration::from_millis(250) },
            SyncError::config_error("network", "missing url"),
            SyncError::unsupported_platform("Live telemetry", "Windows"),
        ];

        for error in &errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty(), "no suggestions for {error}");
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<SyncError>();

        let error = SyncError::segment_unavailable_with_source(
            "Local\\acpmf_physics",
            Box::new(std::io::Error::new(std::io::ErrorKind::NotFound, "missing mapping")),
        );
        let source = std::error::Error::source(&error).expect("source is preserved");
        assert_eq!(source.to_string(), "missing mapping");
    }

    #[test]
    fn file_error_keeps_the_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        match SyncError::file_error(PathBuf::from("racelight.yaml"), io_err) {
            SyncError::File { path, source } => {
                assert_eq!(path, PathBuf::from("racelight.yaml"));
                assert_eq!(source.to_string(), "no such file");
            }
            other => panic!("Expected File error, got {other:?}"),
        }
    }
}
