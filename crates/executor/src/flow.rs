//! Control-flow signals
//!
//! Every command returns a [`ControlFlow`]. Only `Continue` lets a command
//! sequence proceed; every other signal stops it and travels outward until
//! something consumes it (`for-each` consumes `Break`, `try` consumes
//! matching `Thrown` codes). Fatal failures are not signals: they are
//! `Err(Error)` and end the request.

use std::fmt;

/// Request to replace the running module on the call stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStackTransformation {
    /// Module to transfer to
    pub module: String,
    /// How the call stack changes
    pub kind: TransformationKind,
}

/// Kind of call-stack change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformationKind {
    /// Push the module on top of the current one
    Call,
    /// Replace the current module
    Replace,
}

impl CallStackTransformation {
    /// Push `module` onto the call stack
    pub fn call(module: impl Into<String>) -> Self {
        CallStackTransformation {
            module: module.into(),
            kind: TransformationKind::Call,
        }
    }

    /// Replace the current module with `module`
    pub fn replace(module: impl Into<String>) -> Self {
        CallStackTransformation {
            module: module.into(),
            kind: TransformationKind::Replace,
        }
    }
}

/// Outcome of running a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlFlow {
    /// Proceed with the next command
    Continue,
    /// Leave the innermost loop
    Break,
    /// Stop and transfer to another module
    CallStackTransformation(CallStackTransformation),
    /// A script-level exception with a code and optional message
    Thrown {
        /// Exception code, matched verbatim by catch blocks
        code: String,
        /// Human-readable message
        message: Option<String>,
    },
}

impl ControlFlow {
    /// Build a thrown signal
    pub fn thrown(code: impl Into<String>, message: Option<String>) -> Self {
        ControlFlow::Thrown {
            code: code.into(),
            message,
        }
    }

    /// Whether the enclosing sequence may carry on
    pub fn can_continue(&self) -> bool {
        matches!(self, ControlFlow::Continue)
    }

    /// Whether this is a call-stack transformation
    pub fn is_call_stack_transformation(&self) -> bool {
        matches!(self, ControlFlow::CallStackTransformation(_))
    }

    /// Thrown code, if this is a thrown signal
    pub fn thrown_code(&self) -> Option<&str> {
        match self {
            ControlFlow::Thrown { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl fmt::Display for ControlFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlFlow::Continue => write!(f, "continue"),
            ControlFlow::Break => write!(f, "break"),
            ControlFlow::CallStackTransformation(cst) => write!(f, "cst({})", cst.module),
            ControlFlow::Thrown { code, .. } => write!(f, "thrown({})", code),
        }
    }
}
