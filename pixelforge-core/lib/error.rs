//! Error types for pixelforge-core.

use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An error that occurred in the pixelforge pipeline.
///
/// All variants are local and recoverable; none should crash the host
/// process. The taxonomy distinguishes problems the caller can fix
/// (`Configuration`, `InsufficientCredits`), problems the upstream provider
/// caused (`ExternalService`, `GenerationParse`), and problems with the
/// candidate code itself (`Validation`, `Execution`, `ResultParse`).
#[derive(pretty_error_debug::Debug, Error)]
pub enum PixelforgeError {
    /// A required credential or tool is missing. Fatal, never auto-retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The upstream text-generation provider returned a non-success status.
    /// The message is surfaced for manual resubmission; no automatic retry.
    #[error("text-generation provider returned status {status}: {message}")]
    ExternalService {
        /// HTTP status returned by the provider
        status: u16,
        /// Upstream error message
        message: String,
    },

    /// The provider answered, but with a payload that does not conform to the
    /// structural contract (no JSON span, or required keys absent).
    #[error("could not parse provider response: {0}")]
    GenerationParse(String),

    /// The static scan rejected the code; it was never executed.
    #[error("code validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// The sandboxed subprocess failed to spawn, exited abnormally, or timed
    /// out. The scratch directory is always cleaned up regardless.
    #[error("sandbox execution failed: {message}")]
    Execution {
        /// What went wrong
        message: String,
        /// Captured stderr of the subprocess, if any
        stderr: String,
    },

    /// The sandboxed subprocess exited cleanly but produced no parsable
    /// result marker.
    #[error("sandbox produced no parsable result: {0}")]
    ResultParse(String),

    /// The accept-time balance rule was violated. No partial charge occurs.
    #[error("insufficient credits: {required} required, {available} available")]
    InsufficientCredits {
        /// Credits the operation would have charged
        required: i64,
        /// Credits currently on the balance
        available: i64,
    },

    /// An illegal state transition was attempted, rejected before any side
    /// effect.
    #[error("invalid state transition for {entity}: cannot {attempted} while '{current}'")]
    InvalidState {
        /// The entity whose transition was attempted
        entity: String,
        /// Its current state
        current: String,
        /// The attempted transition
        attempted: String,
    },

    /// A referenced record does not exist
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Kind of record looked up
        entity: String,
        /// Id that was looked up
        id: String,
    },

    /// The acting user does not own the target project
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// An error that occurred during an IO operation
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An error that occurred in the database layer
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// An error that occurred applying database migrations
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// An error that occurred serializing or deserializing JSON
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// A specialized `Result` type for pixelforge operations
pub type PixelforgeResult<T> = Result<T, PixelforgeError>;

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl PixelforgeError {
    /// Creates an execution error without captured stderr.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            stderr: String::new(),
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns true if this error indicates an illegal state transition.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }

    /// Returns true if this error indicates an insufficient credit balance.
    pub fn is_insufficient_credits(&self) -> bool {
        matches!(self, Self::InsufficientCredits { .. })
    }
}
