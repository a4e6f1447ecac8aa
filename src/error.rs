//! Error handling for the dyndat library
//!
//! Every fallible operation returns [`Result`], whose error side is
//! [`DatError`]. Invariant violations inside the allocator are not errors:
//! they are programming mistakes and trip `debug_assert!` instead.

use thiserror::Error;

/// Main error type for the dyndat library
#[derive(Error, Debug)]
pub enum DatError {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted or adopted node array is structurally invalid
    #[error("Corrupted node array: {message}")]
    Corruption {
        /// Error message describing the damage
        message: String,
    },

    /// Mutation attempted on a view that does not own its nodes
    #[error("Read-only trie: cannot {operation}")]
    ReadOnly {
        /// The rejected operation
        operation: String,
    },

    /// A key that can never be stored
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Why the key was rejected
        message: String,
    },
}

impl DatError {
    /// Create a corruption error
    pub fn corruption<S: Into<String>>(message: S) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Create a read-only violation error
    pub fn read_only<S: Into<String>>(operation: S) -> Self {
        Self::ReadOnly {
            operation: operation.into(),
        }
    }

    /// Create an invalid key error
    pub fn invalid_key<S: Into<String>>(message: S) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Check if this is a recoverable error
    ///
    /// Only I/O failures may succeed on a later attempt; everything else is
    /// a property of the data or of the call itself.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Corruption { .. } => false,
            Self::ReadOnly { .. } => false,
            Self::InvalidKey { .. } => false,
        }
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Corruption { .. } => "corruption",
            Self::ReadOnly { .. } => "read_only",
            Self::InvalidKey { .. } => "key",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, DatError>;
