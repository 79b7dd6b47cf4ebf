//! Error types for the document runtime
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! # Categories
//!
//! | Category | Variants | Handling |
//! |----------|----------|----------|
//! | Tree | `ReadOnlyViolation`, `NodeNotFound`, `StaleNode` | Programming error, never retried |
//! | Binding | `UndefinedLabel`, `NotRemovable`, `ReservedLabel`, `ScopeMismatch` | Fatal to the current operation |
//! | Path | `TooMany`, `TooFew`, `PathSyntax`, `PathNotCreatable` | Cardinality errors are recoverable by callers |
//! | Store | `RowLockTimeout`, `TooFewRows`, `TooManyRows`, `Storage` | Caller retries the transaction or propagates |
//! | System | `InvalidState`, `CommandSyntax`, `Serialization`, `Config`, `Io` | Fatal |
//!
//! Application-level thrown codes are *not* errors: they travel as
//! control-flow signals through the command runner.

use crate::path::PathParseError;
use std::io;
use thiserror::Error;

/// Result type alias for document runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the document runtime
#[derive(Debug, Error)]
pub enum Error {
    // ==================== Tree ====================
    /// Mutation attempted on a frozen tree
    #[error("read-only violation: cannot {operation} on read-only document {document}")]
    ReadOnlyViolation {
        /// Document the mutation targeted
        document: String,
        /// Name of the attempted mutation
        operation: &'static str,
    },

    /// Node id does not exist (or was removed) in the given tree
    #[error("node not found: {node} in document {document}")]
    NodeNotFound {
        /// Document searched
        document: String,
        /// Offending node id or ref
        node: String,
    },

    /// Handle refers to a tree generation that has since been replaced
    #[error("stale node handle: expected document {expected}, current is {actual}")]
    StaleNode {
        /// Document the handle was issued for
        expected: String,
        /// Document currently held
        actual: String,
    },

    // ==================== Binding ====================
    /// Label is not defined in the binding table
    #[error("undefined context label: {label}")]
    UndefinedLabel {
        /// Missing label
        label: String,
    },

    /// Label is a protected built-in and cannot be removed
    #[error("context label '{label}' cannot be removed")]
    NotRemovable {
        /// Protected label
        label: String,
    },

    /// Label name is reserved for a built-in document label
    #[error("context label '{label}' is reserved and cannot be set")]
    ReservedLabel {
        /// Reserved label
        label: String,
    },

    /// Localisation pop did not match the current push
    #[error("scope mismatch: delocalise '{requested}' but current scope is {current}")]
    ScopeMismatch {
        /// Tag passed to delocalise
        requested: String,
        /// Tag on top of the scope stack (or "<none>")
        current: String,
    },

    // ==================== Path ====================
    /// Path query matched more nodes than allowed
    #[error("too many nodes: '{path}' matched {count}, expected at most {expected}")]
    TooMany {
        /// Query text
        path: String,
        /// Number of nodes matched
        count: usize,
        /// Maximum allowed
        expected: usize,
    },

    /// Path query matched no node where one was required
    #[error("too few nodes: '{path}' matched nothing")]
    TooFew {
        /// Query text
        path: String,
    },

    /// Path query could not be parsed
    #[error("invalid path '{path}': {source}")]
    PathSyntax {
        /// Query text
        path: String,
        /// Parse failure
        #[source]
        source: PathParseError,
    },

    /// Path query step cannot be synthesized in create mode
    #[error("cannot create nodes for step '{step}' of '{path}'")]
    PathNotCreatable {
        /// Query text
        path: String,
        /// Step that could not be created
        step: String,
    },

    // ==================== Store ====================
    /// Backing row is locked elsewhere and the lock wait expired (or was no-wait)
    #[error("row lock timeout on {key}")]
    RowLockTimeout {
        /// Backing key of the contended row
        key: String,
    },

    /// Select returned no row where one was required
    #[error("too few rows: no row found for {key}")]
    TooFewRows {
        /// Backing key
        key: String,
    },

    /// Select returned more than one row
    #[error("too many rows: {count} rows found for {key}")]
    TooManyRows {
        /// Backing key
        key: String,
        /// Number of rows returned
        count: usize,
    },

    /// Storage layer error
    #[error("storage error: {0}")]
    Storage(String),

    // ==================== System ====================
    /// Operation not valid in the current lifecycle state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Script markup failed validation
    #[error("command syntax error in '{command}': {reason}")]
    CommandSyntax {
        /// Command element name
        command: String,
        /// What was wrong
        reason: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create a `ReadOnlyViolation`
    pub fn read_only(document: impl Into<String>, operation: &'static str) -> Self {
        Error::ReadOnlyViolation {
            document: document.into(),
            operation,
        }
    }

    /// Create an `UndefinedLabel`
    pub fn undefined_label(label: impl Into<String>) -> Self {
        Error::UndefinedLabel {
            label: label.into(),
        }
    }

    /// Create an `InvalidState`
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Create a `CommandSyntax`
    pub fn command_syntax(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::CommandSyntax {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// True for the path cardinality errors (`TooMany` / `TooFew`)
    pub fn is_cardinality(&self) -> bool {
        matches!(self, Error::TooMany { .. } | Error::TooFew { .. })
    }

    /// True for backing-store contention
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Error::RowLockTimeout { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
