//! Error types for the IR runtime core

use thiserror::Error;

/// Failures reported by the foreign boundary protocol
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ForeignError {
    /// The foreign object does not understand the message
    ///
    /// **Triggered by:** Sending `read` or `execute` to an object that does not support it
    #[error("unsupported message: {message}")]
    UnsupportedMessage {
        /// Name of the message that was rejected
        message: String,
    },

    /// A value could not cross the boundary with the requested type
    ///
    /// **Triggered by:** Escaping a virtual allocation, converting a string to an integer
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// The callee declares a different number of parameters
    #[error("arity mismatch: expected {expected} arguments, got {actual}")]
    Arity {
        /// Arity declared by the foreign side
        expected: usize,
        /// Number of arguments supplied
        actual: usize,
    },
}

impl ForeignError {
    /// Create an unsupported-message error for the named message
    pub fn unsupported_message(message: impl Into<String>) -> Self {
        ForeignError::UnsupportedMessage {
            message: message.into(),
        }
    }

    /// Create an unsupported-type error with a description
    pub fn unsupported_type(description: impl Into<String>) -> Self {
        ForeignError::UnsupportedType(description.into())
    }
}

/// Runtime core errors
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Address variant and operation have no defined semantics
    ///
    /// **Triggered by:** Loading an 80-bit float through a foreign reference, treating a
    /// displaced foreign reference as the object itself
    /// **Recovery:** None. The current execution unit is aborted.
    #[error("illegal operand for {operation}: {message}")]
    FatalOperand {
        /// Operation that rejected the operand
        operation: String,
        /// Description of the violation
        message: String,
    },

    /// The foreign boundary reported a protocol failure
    #[error("foreign call failed: {0}")]
    ForeignCallFailed(#[from] ForeignError),

    /// The call target does not denote a callable foreign reference
    #[error("invalid arguments to call: {type_name} is not a foreign reference")]
    InvalidCallOperand {
        /// Kind of the rejected operand
        type_name: String,
    },

    /// Raw access outside the mapped native memory
    #[error("memory fault: {size} bytes at 0x{address:x}")]
    MemoryFault {
        /// First byte of the access
        address: u64,
        /// Access width in bytes
        size: usize,
    },

    /// A global has no native storage yet
    ///
    /// **Triggered by:** Accessing a global before its module was finalised
    #[error("global {name} has no native location")]
    UnresolvedGlobal {
        /// Symbol name of the global
        name: String,
    },

    /// A global entry was driven through its lifecycle out of order
    #[error("global {name}: {message}")]
    GlobalLifecycle {
        /// Symbol name of the global
        name: String,
        /// Description of the violation
        message: String,
    },

    /// Invalid runtime configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Aborts the current execution unit
    Fatal,
    /// Reported to the embedder, who may fix the input and retry
    Recoverable,
}

impl Error {
    /// Create a fatal operand error
    pub fn fatal(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::FatalOperand {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// The unmodified-pointee violation raised for displaced foreign references
    pub fn modified_pointee(operation: impl Into<String>, offset: i64) -> Self {
        Error::FatalOperand {
            operation: operation.into(),
            message: format!("Pointee must be unmodified (offset {})", offset),
        }
    }

    /// Classify error severity
    pub fn classify(&self) -> ErrorSeverity {
        match self {
            Error::FatalOperand { .. } => ErrorSeverity::Fatal,
            Error::ForeignCallFailed(_) => ErrorSeverity::Fatal,
            Error::InvalidCallOperand { .. } => ErrorSeverity::Fatal,
            Error::MemoryFault { .. } => ErrorSeverity::Fatal,
            Error::UnresolvedGlobal { .. } => ErrorSeverity::Fatal,

            Error::GlobalLifecycle { .. } => ErrorSeverity::Recoverable,
            Error::Config(_) => ErrorSeverity::Recoverable,
        }
    }

    /// True for faults that terminate the current execution unit
    pub fn is_fatal(&self) -> bool {
        self.classify() == ErrorSeverity::Fatal
    }
}

/// Result type for runtime core operations
pub type Result<T> = std::result::Result<T, Error>;
