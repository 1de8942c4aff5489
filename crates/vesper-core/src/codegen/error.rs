//! Errors that can occur during code generation

use thiserror::Error;

/// Result type for code generation operations
pub type CodegenResult<T> = Result<T, CodegenError>;

/// Errors surfaced by the Cranelift backend and the output writers
#[derive(Debug, Error)]
pub enum CodegenError {
    /// Cranelift compilation error
    #[error("Cranelift compilation error: {0}")]
    Cranelift(String),

    /// IR verification failed after lowering; a compiler bug
    #[error("generated invalid IR for function '{function}': {details}")]
    InvalidIr { function: String, details: String },

    /// The requested output format is not provided by this backend
    #[error("output format '{0}' is not supported by this backend")]
    UnsupportedFormat(String),

    /// Target triple could not be resolved
    #[error("unsupported target: {0}")]
    UnsupportedTarget(String),

    /// Linking error
    #[error("Link error: {0}")]
    Link(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Build error
    #[error("Build error: {0}")]
    Build(String),
}
