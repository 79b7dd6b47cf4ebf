//! Command execution for WorkDoc
//!
//! Scripts are lists of [`Command`]s run by a [`CommandRunner`] against a
//! [`RequestContext`]. Commands report how execution should proceed with a
//! [`ControlFlow`] signal; fatal failures are ordinary `Err` values.
//!
//! - flow: control-flow signals and call-stack transformations
//! - runner: sequential execution with thrown-code tracking
//! - try_command: try / catch / finally
//! - builtins: the other built-in commands
//! - parser: markup → command factory
//! - request: request context and close/abort lifecycle

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builtins;
pub mod command;
pub mod flow;
pub mod parser;
pub mod request;
pub mod runner;
pub mod try_command;

pub use builtins::{
    AssignCommand, BreakCommand, CallModuleCommand, ContextClearCommand, ContextLocaliseCommand,
    ContextSetCommand, DoCommand, ForEachCommand, RemoveCommand, ThrowCommand,
};
pub use command::{Command, CommandList};
pub use flow::{CallStackTransformation, ControlFlow, TransformationKind};
pub use parser::{local_name, CommandFactory, CommandParser, FnFactory};
pub use request::{Request, RequestContext};
pub use runner::CommandRunner;
pub use try_command::{CatchBlock, TryCommand, CURRENT_CODE_PATH, CURRENT_MESSAGE_PATH, OTHERS};
