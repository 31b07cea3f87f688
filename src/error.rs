//! Central error types for the incision annotation pipeline.
//!
//! This module provides typed errors for better error handling across the
//! codebase. All errors implement `Serialize` so host shells can forward
//! them to a UI layer as plain strings.

use serde::Serialize;
use thiserror::Error;

/// Main error type for pipeline operations.
#[derive(Error, Debug)]
pub enum IncisionError {
    /// Clip failed to load or decode
    #[error("Media error: {0}")]
    MediaError(String),

    /// No valid frame could be captured
    #[error("Capture failed: {0}")]
    CaptureError(String),

    /// Raster read denied (cross-origin source without CORS)
    #[error("Frame read denied: {0}")]
    SecurityError(String),

    /// Submission preconditions not met (never sent to the network)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The outbound request failed (network, DNS, timeout)
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The submission endpoint returned a non-2xx status
    #[error("Submission endpoint returned HTTP {status}")]
    HttpStatus { status: u16 },

    /// PNG encoding of the frozen frame failed
    #[error("Encoding error: {0}")]
    EncodingError(String),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

/// Serialize as the display string so errors cross any host boundary as
/// plain text.
impl Serialize for IncisionError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<image::ImageError> for IncisionError {
    fn from(err: image::ImageError) -> Self {
        IncisionError::EncodingError(err.to_string())
    }
}

impl From<String> for IncisionError {
    fn from(msg: String) -> Self {
        IncisionError::Other(msg)
    }
}

impl From<&str> for IncisionError {
    fn from(msg: &str) -> Self {
        IncisionError::Other(msg.to_string())
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error, converting it to IncisionError::Other.
    fn context(self, msg: &str) -> IncisionResult<T>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F: FnOnce() -> String>(self, f: F) -> IncisionResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn context(self, msg: &str) -> IncisionResult<T> {
        self.map_err(|e| IncisionError::Other(format!("{}: {}", msg, e)))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> IncisionResult<T> {
        self.map_err(|e| IncisionError::Other(format!("{}: {}", f(), e)))
    }
}

/// Extension trait for adding context to Option types.
pub trait OptionExt<T> {
    /// Convert None to IncisionError::Other with the given message.
    fn context(self, msg: &str) -> IncisionResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn context(self, msg: &str) -> IncisionResult<T> {
        self.ok_or_else(|| IncisionError::Other(msg.to_string()))
    }
}

/// Type alias for Results using IncisionError.
pub type IncisionResult<T> = Result<T, IncisionError>;
