//! Error types for loading, describing and invoking UDFs

use crate::config::ConfigError;
use crate::namespace::NamespaceId;
use std::path::PathBuf;
use thiserror::Error;
use udf_bytecode::{ClassError, VerifyError};

/// Result type used throughout the runtime
pub type UdfResult<T> = Result<T, UdfError>;

/// Errors surfaced to callers of the runtime
#[derive(Debug, Error)]
pub enum UdfError {
    /// No class file exists for the requested type
    #[error("Type not found: {name} (looked in {})", .path.display())]
    TypeNotFound {
        /// Logical type name
        name: String,
        /// Path that was probed
        path: PathBuf,
    },

    /// The class file exists but could not be read
    #[error("Failed to read type {name}: {source}")]
    TypeLoadIo {
        /// Logical type name
        name: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The bytes were rejected by the type definer
    #[error("Invalid definition for type {name}: {reason}")]
    TypeDefinitionInvalid {
        /// Logical type name
        name: String,
        /// Why the definer rejected it
        #[source]
        reason: DefineError,
    },

    /// The owning type declares no matching method
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// The method body failed while processing a row
    #[error("Invocation of {method} failed{}: {source}", .row.map(|r| format!(" at row {}", r)).unwrap_or_default())]
    TargetInvocationFailed {
        /// Qualified method name
        method: String,
        /// Row being processed, for batched calls
        row: Option<usize>,
        /// Interpreter or native error
        #[source]
        source: VmError,
    },

    /// The method is not public and access was not granted
    #[error("Access denied to non-public method {0}")]
    AccessDenied(String),

    /// A boxed result does not hold the requested primitive
    #[error("Cannot unbox element {index}: expected {expected}, found {found}")]
    UnboxTypeMismatch {
        /// Position in the result column
        index: usize,
        /// Requested primitive
        expected: &'static str,
        /// Kind actually stored
        found: &'static str,
    },

    /// Columns (or the output slice) disagree on the row count
    #[error("Batch length mismatch in {what}: expected {expected} rows, found {found}")]
    BatchLengthMismatch {
        /// Which column or buffer is short
        what: String,
        /// Row count of the batch
        expected: usize,
        /// Length actually supplied
        found: usize,
    },

    /// Column count differs from the method's parameter count
    #[error("Method {method} takes {expected} arguments, batch has {found} columns")]
    ArityMismatch {
        /// Qualified method name
        method: String,
        /// Formal parameter count
        expected: usize,
        /// Supplied column count
        found: usize,
    },

    /// A handle from one namespace was given to another namespace's invoker
    #[error("Handle belongs to namespace {found}, invoker serves {expected}")]
    ForeignHandle {
        /// Invoker's namespace
        expected: NamespaceId,
        /// Handle's namespace
        found: NamespaceId,
    },

    /// A type with this name is already registered
    #[error("Type already registered: {0}")]
    DuplicateType(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Reasons a type definer rejects a blob
#[derive(Debug, Error)]
pub enum DefineError {
    /// Malformed class file
    #[error(transparent)]
    Class(#[from] ClassError),

    /// Class file failed verification
    #[error(transparent)]
    Verify(#[from] VerifyError),

    /// The class file declares a different name than was requested
    #[error("class file declares '{found}', expected '{expected}'")]
    NameMismatch {
        /// Requested name
        expected: String,
        /// Name recorded in the class file
        found: String,
    },

    /// Signature type name cannot be described
    #[error("invalid type name '{0}'")]
    InvalidTypeName(String),

    /// Rejected by a custom definer
    #[error("{0}")]
    Rejected(String),
}

/// Errors raised while executing a method body
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VmError {
    /// Call depth limit reached
    #[error("Stack overflow (call depth {0})")]
    StackOverflow(usize),

    /// Value stack underflow
    #[error("Stack underflow")]
    StackUnderflow,

    /// Invalid opcode
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// Operand runs past the end of the method body
    #[error("Unexpected end of bytecode at offset {0}")]
    UnexpectedEnd(usize),

    /// Jump outside the method body
    #[error("Jump target {0} out of bounds")]
    InvalidJump(i64),

    /// Local slot out of range
    #[error("Invalid local variable {0}")]
    InvalidLocal(usize),

    /// Frame would need more local slots than any verified method may declare
    #[error("Method needs {0} local slots")]
    TooManyLocals(usize),

        /// Constant pool index out of range
    #[error("Invalid constant {0}")]
    InvalidConstant(u32),

    /// Call to a missing method
    #[error("Invalid call target {0}")]
    InvalidCallTarget(u32),

    /// Operand of the wrong kind
    #[error("Type error in {opcode}: expected {expected}, found {found}")]
    TypeError {
        /// Instruction name
        opcode: &'static str,
        /// Expected kind
        expected: &'static str,
        /// Actual kind
        found: &'static str,
    },

    /// Integer division or remainder by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Array index out of range
    #[error("Index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// Requested index
        index: i32,
        /// Array length
        len: usize,
    },

    /// Value thrown by the method body
    #[error("Exception: {0}")]
    Thrown(String),

    /// Trap raised by the method body
    #[error("Trap {0}")]
    Trap(u16),

    /// Error returned by a native UDF
    #[error("{0}")]
    Native(String),
}
