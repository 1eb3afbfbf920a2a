//! Error types for the pixelforge utilities.

use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An error that occurred in a pixelforge utility
#[derive(pretty_error_debug::Debug, Error)]
pub enum PixelforgeUtilsError {
    /// An error that occurred when validating a path
    #[error("path validation error: {0}")]
    PathValidation(String),
}

/// A specialized `Result` type for pixelforge utility operations
pub type PixelforgeUtilsResult<T> = Result<T, PixelforgeUtilsError>;
